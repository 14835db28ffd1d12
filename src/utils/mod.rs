pub mod error;
pub mod logging;
pub mod signal;
pub mod text;

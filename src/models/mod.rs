pub mod config;
pub mod filter;
pub mod interface;
pub mod packet;
pub mod state;
pub mod stats;

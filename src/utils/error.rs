use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from pcap library
    #[error("PCAP error: {0}")]
    Pcap(#[from] pcap::Error),

    /// Error from I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A capture handle could not be opened or activated
    #[error("Failed to open capture on {interface}: {reason}")]
    CaptureOpen { interface: String, reason: String },

    /// A capture expression was rejected by an open handle
    #[error("Failed to apply filter '{expression}' on {interface}: {reason}")]
    FilterApply {
        interface: String,
        expression: String,
        reason: String,
    },

    /// The system reported no network interfaces at all
    #[error("No network interfaces found (need capture permission?)")]
    NoInterfaces,

    /// Interfaces exist but none could be opened for capture
    #[error("No usable interfaces: every capture handle failed to open. Run as root or grant capture capabilities")]
    NoUsableInterfaces,

    /// Unknown filter label or index
    #[error("Unknown filter: {0}")]
    InvalidFilter(String),

    /// Invalid runtime configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error from a running capture
    #[error("Capture error: {0}")]
    Capture(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;

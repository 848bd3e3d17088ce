/// Error types for the serial transport and configuration loading
use std::io;

/// Transport-level failures. These are the only errors that affect
/// connection health; they are recorded in the status and retried.
#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("Failed to connect: {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial read error: {0}")]
    Read(#[from] io::Error),

    #[error("Serial port closed")]
    Closed,

    #[error("Failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

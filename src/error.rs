//! # Error Types
//!
//! Custom error types for the OpenLRS receiver using `thiserror`.

use thiserror::Error;

/// Main error type for the OpenLRS receiver
#[derive(Debug, Error)]
pub enum LinkError {
    /// The transceiver did not identify itself as an RFM22B
    #[error("Unexpected transceiver device type 0x{0:02X} (expected 0x08)")]
    DeviceNotFound(u8),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bind store encoding errors
    #[error("Bind store error: {0}")]
    Store(#[from] serde_json::Error),

    /// A channel consumer is already attached to this receiver
    #[error("Channel consumer already registered")]
    ConsumerAlreadyRegistered,

    /// Session parameters failed validation
    #[error("Invalid session parameters: {0}")]
    InvalidSession(String),

    /// No usable session: binding timed out and nothing valid is stored
    #[error("Receiver is not bound")]
    NotBound,
}

/// Result type alias for the OpenLRS receiver
pub type Result<T> = std::result::Result<T, LinkError>;

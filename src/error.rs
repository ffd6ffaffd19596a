//! Error types for mail ingestion

use thiserror::Error;

/// Errors that can occur while ingesting or serving mail
///
/// Decoding problems never show up here: malformed content degrades to a
/// lossier decode instead of failing the message.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The key-value store rejected a read, write or delete
    #[error("Storage operation failed for {key}: {details}")]
    Storage { key: String, details: String },

    /// A stored value could not be (de)serialized
    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or unreadable configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to read a message source
    #[error("Failed to read message: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn storage(key: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            details: details.to_string(),
        }
    }
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

use thiserror::Error;

/// Session storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A stored record could not be decoded.
    #[error("corrupt session record at {key}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// A session could not be encoded.
    #[error("failed to encode session for {contact}")]
    Encode {
        contact: String,
        #[source]
        source: serde_json::Error,
    },
    /// Refused to persist a session whose end precedes its start.
    #[error("refusing to persist session for {contact}: end {end_time} precedes start {start_time}")]
    InvertedRange {
        contact: String,
        start_time: i64,
        end_time: i64,
    },
}

/// Session delivery errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The configured endpoint is not a usable URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    /// The request could not be sent.
    #[error("delivery failed: {0}")]
    Transport(String),
}

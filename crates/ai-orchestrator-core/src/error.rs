//! Error type for the key-value abstraction.

use thiserror::Error;

/// Errors returned by a [`crate::kv::KeyValueStore`] implementation.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("key-value backend unavailable: {0}")]
    Unavailable(String),

    #[error("key-value operation timed out")]
    Timeout,

    #[error("value for key {key:?} failed to (de)serialize: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_includes_reason() {
        let err = KvError::Unavailable("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}

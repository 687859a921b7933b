use thiserror::Error;

/// Errors returned by a [`crate::registry::CircuitRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CircuitBreakerError {
    /// The circuit for this provider is open; the call was not attempted.
    #[error("circuit '{circuit_id}' is open; call not permitted")]
    Open { circuit_id: String },
}

impl CircuitBreakerError {
    pub fn circuit_id(&self) -> &str {
        match self {
            CircuitBreakerError::Open { circuit_id } => circuit_id,
        }
    }
}

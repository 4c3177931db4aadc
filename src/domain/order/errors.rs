use uuid::Uuid;

// ============================================================================
// Order Errors
// ============================================================================
//
// Every layer returns the same variant it received and only adds log context,
// so a store failure reaches the caller as `Persistence`, never as something
// else.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// Missing required field, empty item list, or a malformed line item.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Bus payload that could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish error: {0}")]
    Publish(String),
}

impl OrderError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        OrderError::InvalidInput(msg.into())
    }

    /// Short, stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::InvalidInput(_) => "invalid_input",
            OrderError::NotFound(_) => "not_found",
            OrderError::Persistence(_) => "persistence",
            OrderError::Serialization(_) => "serialization",
            OrderError::Publish(_) => "publish",
        }
    }
}

use thiserror::Error;
use uuid::Uuid;

pub type OrderResult<T> = Result<T, OrderError>;

/// Failures from mutating an [`crate::aggregate::Order`]. Validation and
/// authorization failures never reach the outbox — the aggregate refuses the
/// mutation before any event is constructed.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("invalid paid-status transition: {from} -> {to}")]
    InvalidPaidStatusTransition { from: String, to: String },

    #[error("mutation '{operation}' is only permitted while status is pending, order is {status}")]
    NotPending { operation: &'static str, status: String },

    #[error("stock override requires role manager or admin, got '{0}'")]
    UnauthorizedStockOverride(String),

    #[error("stock override references unknown product_id '{0}'")]
    UnknownOverrideProduct(String),

    #[error("stock override for product_id '{0}' is missing a reason")]
    MissingOverrideReason(String),

    #[error("item quantity must be > 0, got {0}")]
    InvalidQuantity(i64),

    #[error("monetary field '{field}' must be >= 0, got {value}")]
    NegativeMonetaryField { field: &'static str, value: String },

    #[error("order must contain at least one item")]
    EmptyOrder,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("outbox error: {0}")]
    Outbox(#[from] transactional_outbox::OutboxError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrderError {
    /// True for errors that are the caller's fault (bad request body,
    /// illegal transition) as opposed to infrastructure failures. HTTP
    /// adapters use this to pick 4xx vs 5xx.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, OrderError::Database(_) | OrderError::Outbox(_) | OrderError::Serialization(_))
    }
}

use thiserror::Error;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("broker publish failed: {0}")]
    PublishFailed(String),

    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("consumer handler failed: {0}")]
    HandlerFailed(String),

    #[error("poison message on subject {subject} skipped after {attempts} attempts: {reason}")]
    Poison {
        subject: String,
        attempts: u32,
        reason: String,
    },
}

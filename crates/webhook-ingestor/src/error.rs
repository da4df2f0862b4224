use thiserror::Error;

pub type WebhookResult<T> = Result<T, WebhookError>;

/// Stage 1-2 failures are synchronous and never enter the outbox or
/// dead-letter table; stage 3-5 failures are classified separately by the
/// caller and routed to the dead-letter store.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("signature verification failed for source '{0}'")]
    BadSignature(&'static str),

    #[error("missing signature header '{0}'")]
    MissingSignatureHeader(&'static str),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("unrecognized payload shape for source '{0}'")]
    UnrecognizedPayload(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WebhookError {
    /// Stage 1 (parse & verify) failures are never retried and never
    /// recorded; everything else is a stage 3-5 candidate for dead-lettering.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            WebhookError::BadSignature(_) | WebhookError::MissingSignatureHeader(_)
        )
    }
}

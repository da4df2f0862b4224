use thiserror::Error;
use uuid::Uuid;

pub type OutboxResult<T> = Result<T, OutboxError>;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("event {0} not found, or lease no longer held")]
    EventNotFound(Uuid),

    #[error("event {0} already present in the outbox")]
    DuplicateEvent(Uuid),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl OutboxError {
    /// Postgres unique-violation (23505) on the `event_id` primary key means
    /// a second producer tried to append an event that is already present.
    /// Per I-spec this is a `DuplicateEvent`, not a transient failure.
    pub fn from_insert_error(err: sqlx::Error, event_id: Uuid) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return OutboxError::DuplicateEvent(event_id);
            }
        }
        OutboxError::DatabaseError(err)
    }
}

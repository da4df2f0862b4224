use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub event loop has shut down")]
    HubClosed,

    #[error("subscriber {0} not registered")]
    UnknownSubscriber(uuid::Uuid),
}

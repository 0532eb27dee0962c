//! Error types for the scheduling engine.

use thiserror::Error;

/// Infrastructure failures: configuration, I/O, collaborators.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Transaction-level rejections of a scheduling POST.
///
/// These abort the request before any attendee is processed.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Malformed scheduling request: {0}")]
    MalformedRequest(String),

    #[error("Unsupported iTIP method: {0}")]
    UnsupportedMethod(String),

    #[error("No VFREEBUSY component found in the scheduling request")]
    UnsupportedComponent,

    #[error("The organizer in the request did not match the current user")]
    OrganizerMismatch,

    #[error("Only the owner of a scheduling outbox may post to it")]
    NotOutboxOwner,

    #[error("Could not resolve the requesting principal: {0}")]
    Backend(#[from] ScheduleError),
}

impl RequestError {
    /// HTTP status code the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            RequestError::MalformedRequest(_) => 400,
            RequestError::UnsupportedMethod(_) | RequestError::UnsupportedComponent => 501,
            RequestError::OrganizerMismatch | RequestError::NotOutboxOwner => 403,
            RequestError::Backend(_) => 500,
        }
    }
}

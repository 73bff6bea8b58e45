use dashscope_realtime_types::events::ErrorDetails;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect: {0}")]
    Connect(String),
    /// Read/write failure on an established transport. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(String),
    /// Malformed or unexpected message. Never fatal to a session.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("session is not ready: started acknowledgment not yet received")]
    NotReady,
    #[error("session is stopping")]
    Stopping,
    #[error("session is closed")]
    Closed,
    #[error("session already started")]
    AlreadyStarted,
    /// The service refused to create the task.
    #[error("task submission failed: {0}")]
    TaskSubmit(ErrorDetails),
    /// The service reported the task as failed.
    #[error("task failed: {0}")]
    TaskFailed(ErrorDetails),
    /// Non-success response to a status or cancel request.
    #[error("request rejected: {0}")]
    Api(ErrorDetails),
    /// `Error` event sent by the service on a live session.
    #[error("server error: {0}")]
    Server(ErrorDetails),
    #[error("operation cancelled")]
    Cancelled,
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error ended the session that reported it.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Protocol(_) | Error::NotReady | Error::Stopping | Error::AlreadyStarted
        )
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Error::TaskSubmit(details)
            | Error::TaskFailed(details)
            | Error::Api(details)
            | Error::Server(details) => Some(details),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

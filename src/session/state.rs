use crate::error::{Error, Result};
use dashscope_realtime_types::events::ErrorDetails;

/// Lifecycle of a duplex session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Started,
    Closed,
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// The task ran to completion.
    Finished,
    ClosedByClient,
    ClosedByServer(u16),
    /// The service reported an error or a failed task.
    Failed,
    TransportError,
    /// A stop did not complete within its deadline and was forced.
    Timeout,
    Cancelled,
}

impl CloseCode {
    /// Close-frame code sent to (or received from) the peer.
    pub fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Finished | CloseCode::ClosedByClient => 1000,
            CloseCode::ClosedByServer(code) => *code,
            CloseCode::Failed => 4000,
            CloseCode::TransportError => 1006,
            CloseCode::Timeout => 4008,
            CloseCode::Cancelled => 4009,
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseCode::Finished => write!(f, "finished"),
            CloseCode::ClosedByClient => write!(f, "closed by client"),
            CloseCode::ClosedByServer(code) => write!(f, "closed by server ({})", code),
            CloseCode::Failed => write!(f, "failed"),
            CloseCode::TransportError => write!(f, "transport error"),
            CloseCode::Timeout => write!(f, "timed out"),
            CloseCode::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEnd {
    code: CloseCode,
    reason: String,
    failure: Option<ErrorDetails>,
}

impl SessionEnd {
    pub fn new(code: CloseCode, reason: &str) -> Self {
        Self {
            code,
            reason: reason.to_string(),
            failure: None,
        }
    }

    pub fn failed(details: ErrorDetails) -> Self {
        Self {
            code: CloseCode::Failed,
            reason: details.to_string(),
            failure: Some(details),
        }
    }

    pub fn code(&self) -> CloseCode {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn failure(&self) -> Option<&ErrorDetails> {
        self.failure.as_ref()
    }

    /// Whether the close frame should be initiated by us with our own code.
    pub(crate) fn is_local(&self) -> bool {
        !matches!(self.code, CloseCode::ClosedByServer(_) | CloseCode::TransportError)
    }

    /// Maps the end of a one-shot task onto the caller's result.
    pub fn into_result(self) -> Result<()> {
        if let Some(details) = self.failure {
            return Err(Error::TaskFailed(details));
        }
        match self.code {
            CloseCode::Finished => Ok(()),
            CloseCode::TransportError => Err(Error::Transport(self.reason)),
            CloseCode::Timeout => Err(Error::Timeout(self.reason)),
            CloseCode::Cancelled => Err(Error::Cancelled),
            _ => Err(Error::Closed),
        }
    }
}

/// Everything a session shares between its reader task and its callers.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) state: SessionState,
    pub(crate) stopping: bool,
    /// The task-initiating message went out.
    pub(crate) start_sent: bool,
    pub(crate) dialog_id: Option<String>,
    pub(crate) end: Option<SessionEnd>,
    /// Set after `on_close` returned and the transport was released.
    pub(crate) released: bool,
}

impl Snapshot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_connect(&mut self) -> bool {
        if self.state != SessionState::Disconnected {
            return false;
        }
        self.state = SessionState::Connecting;
        true
    }

    pub(crate) fn connect_failed(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.state = SessionState::Disconnected;
        true
    }

    pub(crate) fn opened(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.state = SessionState::Open;
        true
    }

    /// The inbound acknowledgment is the only way into `Started`.
    pub(crate) fn started(&mut self, dialog_id: Option<String>) -> bool {
        match self.state {
            SessionState::Open | SessionState::Started => {
                self.state = SessionState::Started;
                if dialog_id.is_some() {
                    self.dialog_id = dialog_id;
                }
                true
            }
            _ => false,
        }
    }

    /// Returns `false` when the session was already stopping or is closed.
    pub(crate) fn begin_stopping(&mut self) -> bool {
        if self.stopping || self.state == SessionState::Closed {
            return false;
        }
        self.stopping = true;
        true
    }

    /// Audio and turn directives require an acknowledged, non-stopping session.
    pub(crate) fn check_sendable(&self) -> Result<()> {
        match self.state {
            SessionState::Closed => Err(Error::Closed),
            _ if self.stopping => Err(Error::Stopping),
            SessionState::Started => Ok(()),
            _ => Err(Error::NotReady),
        }
    }

    /// Control messages may go out as soon as the transport is open.
    pub(crate) fn check_writable(&self) -> Result<()> {
        match self.state {
            SessionState::Open | SessionState::Started => Ok(()),
            SessionState::Closed => Err(Error::Closed),
            _ => Err(Error::NotReady),
        }
    }

    /// Claims the single task-initiating message of the session.
    pub(crate) fn begin_start(&mut self) -> Result<()> {
        self.check_writable()?;
        if self.start_sent {
            return Err(Error::AlreadyStarted);
        }
        self.start_sent = true;
        Ok(())
    }

    /// Moves to `Closed`; returns `true` only for the first caller.
    pub(crate) fn close(&mut self, end: SessionEnd) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        self.state = SessionState::Closed;
        self.end = Some(end);
        true
    }

    pub(crate) fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        true
    }
}

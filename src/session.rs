mod state;

pub use state::{CloseCode, SessionEnd, SessionState};
pub(crate) use state::Snapshot;

use crate::callback::SessionCallback;
use crate::cancel::CancellationToken;
use crate::client::config::Config;
use crate::client::stats::Stats;
use crate::error::{Error, Result};
use crate::transport::{Connector, WireMessage, WireSink, WireStream};
use dashscope_realtime_types::events::{ClientMessage, ErrorDetails, EventPayload, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Upper bound on flushing and closing the transport once a session ends.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Synthesis,
    Recognition,
    Dialog,
}

impl SessionKind {
    /// One-shot tasks close the session on `task-finished`.
    fn ends_with_task(&self) -> bool {
        matches!(self, SessionKind::Synthesis | SessionKind::Recognition)
    }
}

/// Result of a graceful stop.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// The service confirmed the end of the task within the deadline.
    Finished,
    /// The session had already ended before the stop was requested.
    AlreadyFinished(CloseCode),
    Failed(ErrorDetails),
    /// The connection ended some other way while draining.
    Closed(CloseCode),
    /// No confirmation arrived in time; the transport was forcibly closed.
    TimedOut,
}

impl StopOutcome {
    fn from_end(end: SessionEnd) -> Self {
        match (end.code(), end.failure()) {
            (_, Some(details)) => StopOutcome::Failed(details.clone()),
            (CloseCode::Finished, None) => StopOutcome::Finished,
            (CloseCode::Timeout, None) => StopOutcome::TimedOut,
            (code, None) => StopOutcome::Closed(code),
        }
    }
}

pub(crate) enum Drained {
    Ended(SessionEnd),
    TimedOut,
}

impl Drained {
    pub(crate) fn into_outcome(self) -> StopOutcome {
        match self {
            Drained::Ended(end) => StopOutcome::from_end(end),
            Drained::TimedOut => StopOutcome::TimedOut,
        }
    }
}

struct Shutdown {
    end: SessionEnd,
    error: Option<Error>,
}

impl Shutdown {
    fn new(end: SessionEnd) -> Self {
        Self { end, error: None }
    }

    fn transport(error: Error) -> Self {
        Self {
            end: SessionEnd::new(CloseCode::TransportError, &error.to_string()),
            error: Some(error),
        }
    }
}

struct Shared {
    state: watch::Sender<Snapshot>,
    writer: tokio::sync::Mutex<Option<WireSink>>,
    stats: Mutex<Stats>,
}

impl Shared {
    fn update_stats(&self, update: impl FnOnce(&mut Stats)) {
        match self.stats.lock() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => tracing::error!("failed to update stats"),
        }
    }
}

/// One task over one duplex connection: a single reader task drains the
/// transport and dispatches to the callback, all writes go through one
/// mutex-guarded sink.
pub(crate) struct DuplexSession {
    task_id: String,
    shared: Arc<Shared>,
    shutdown: mpsc::UnboundedSender<Shutdown>,
}

impl DuplexSession {
    pub(crate) async fn open<C: SessionCallback>(
        config: &Config,
        connector: &dyn Connector,
        kind: SessionKind,
        callback: C,
    ) -> Result<Self> {
        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let (state, _) = watch::channel(Snapshot::new());
        state.send_if_modified(Snapshot::begin_connect);

        let (sink, stream) = match connector.connect(config).await {
            Ok(halves) => halves,
            Err(e) => {
                state.send_if_modified(Snapshot::connect_failed);
                tracing::error!("failed to connect: {}", e);
                return Err(e);
            }
        };
        state.send_if_modified(Snapshot::opened);

        let shared = Arc::new(Shared {
            state,
            writer: tokio::sync::Mutex::new(Some(sink)),
            stats: Mutex::new(Stats::new()),
        });
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let reader = Reader {
            task_id: task_id.clone(),
            kind,
            shared: shared.clone(),
            callback,
        };
        tokio::spawn(reader.run(stream, shutdown_rx));
        tracing::debug!("opened {:?} session for task {}", kind, task_id);

        Ok(Self {
            task_id,
            shared,
            shutdown: shutdown_tx,
        })
    }

    pub(crate) fn task_id(&self) -> &str {
        &self.task_id
    }

    pub(crate) fn state(&self) -> SessionState {
        self.shared.state.borrow().state
    }

    pub(crate) fn dialog_id(&self) -> Option<String> {
        self.shared.state.borrow().dialog_id.clone()
    }

    pub(crate) fn end(&self) -> Option<SessionEnd> {
        self.shared.state.borrow().end.clone()
    }

    pub(crate) fn stats(&self) -> Stats {
        self.shared
            .stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Returns `false` if a stop was already in progress.
    pub(crate) fn begin_stopping(&self) -> bool {
        self.shared.state.send_if_modified(Snapshot::begin_stopping)
    }

    /// Sends the message that initiates the task. Only one is allowed per
    /// session.
    pub(crate) async fn send_start(&self, message: &ClientMessage) -> Result<()> {
        let mut claimed = Ok(());
        self.shared.state.send_if_modified(|s| {
            claimed = s.begin_start();
            claimed.is_ok()
        });
        claimed?;
        self.send_text(message).await
    }

    /// Sends a control message. Allowed once the transport is open, even
    /// while stopping.
    pub(crate) async fn send_message(&self, message: &ClientMessage) -> Result<()> {
        self.shared.state.borrow().check_writable()?;
        self.send_text(message).await
    }

    /// Sends a turn-level control message; requires an acknowledged session.
    pub(crate) async fn send_directive(&self, message: &ClientMessage) -> Result<()> {
        self.shared.state.borrow().check_sendable()?;
        self.send_text(message).await
    }

    /// Forwards one audio frame verbatim.
    pub(crate) async fn send_audio(&self, frame: &[u8]) -> Result<()> {
        self.shared.state.borrow().check_sendable()?;
        self.write(WireMessage::Binary(frame.to_vec())).await
    }

    async fn send_text(&self, message: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        tracing::debug!("sending {} for task {}", message.header().action(), self.task_id);
        self.write(WireMessage::Text(text)).await
    }

    async fn write(&self, message: WireMessage) -> Result<()> {
        let len = message.len();
        let is_audio = matches!(message, WireMessage::Binary(_));

        let mut writer = self.shared.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(Error::Closed);
        };
        if let Err(e) = sink.send(message).await {
            tracing::error!("failed to send message: {}", e);
            writer.take();
            drop(writer);
            // the reader reports the failure and closes the session
            let _ = self
                .shutdown
                .send(Shutdown::transport(Error::Transport(e.to_string())));
            return Err(e);
        }
        if is_audio {
            self.shared.update_stats(|stats| stats.record_sent(len));
        }
        Ok(())
    }

    /// Waits until the service acknowledged the task.
    pub(crate) async fn wait_started(&self, limit: Duration) -> Result<()> {
        let mut rx = self.shared.state.subscribe();
        let waited = tokio::time::timeout(limit, async move {
            rx.wait_for(|s| matches!(s.state, SessionState::Started | SessionState::Closed))
                .await
                .map(|s| (s.state, s.end.clone()))
        })
        .await;
        match waited {
            Err(_) => Err(Error::Timeout(format!(
                "task {} was not started within {:?}",
                self.task_id, limit
            ))),
            Ok(Err(_)) => Err(Error::Closed),
            Ok(Ok((SessionState::Started, _))) => Ok(()),
            Ok(Ok((_, end))) => Err(end
                .and_then(|end| end.into_result().err())
                .unwrap_or(Error::Closed)),
        }
    }

    /// Waits for the session to end on its own, forcing it closed when
    /// `limit` elapses or `cancel` fires first.
    pub(crate) async fn drain(
        &self,
        limit: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Drained> {
        let released = self.wait_closed();
        let deadline = async {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            end = released => end.map(Drained::Ended).ok_or(Error::Closed),
            _ = deadline => {
                tracing::warn!("task {} did not finish in time, closing", self.task_id);
                match self.shutdown_and_wait(SessionEnd::new(CloseCode::Timeout, "stop timed out")).await {
                    Some(end) if end.code() != CloseCode::Timeout => Ok(Drained::Ended(end)),
                    _ => Ok(Drained::TimedOut),
                }
            }
            _ = cancelled => {
                match self.shutdown_and_wait(SessionEnd::new(CloseCode::Cancelled, "cancelled")).await {
                    Some(end) if end.code() != CloseCode::Cancelled => Ok(Drained::Ended(end)),
                    _ => Err(Error::Cancelled),
                }
            }
        }
    }

    /// Closes the session and waits until `on_close` has run.
    pub(crate) async fn close(&self) -> Option<SessionEnd> {
        self.shutdown_and_wait(SessionEnd::new(CloseCode::ClosedByClient, "closed by client"))
            .await
    }

    async fn shutdown_and_wait(&self, end: SessionEnd) -> Option<SessionEnd> {
        // a gone reader means the session is already closing
        let _ = self.shutdown.send(Shutdown::new(end));
        self.wait_closed().await
    }

    /// Resolves once the session is closed and `on_close` has returned.
    pub(crate) async fn wait_closed(&self) -> Option<SessionEnd> {
        let mut rx = self.shared.state.subscribe();
        rx.wait_for(|s| s.released)
            .await
            .map(|s| s.end.clone())
            .ok()
            .flatten()
    }
}

struct Reader<C> {
    task_id: String,
    kind: SessionKind,
    shared: Arc<Shared>,
    callback: C,
}

/// Marks the session released if the reader unwinds without finishing.
struct ReleaseGuard(Arc<Shared>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.state.send_if_modified(|s| {
            if s.released {
                return false;
            }
            s.close(SessionEnd::new(CloseCode::Failed, "reader terminated"));
            s.release()
        });
    }
}

impl<C: SessionCallback> Reader<C> {
    async fn run(mut self, mut stream: WireStream, mut commands: mpsc::UnboundedReceiver<Shutdown>) {
        let _guard = ReleaseGuard(self.shared.clone());
        self.callback.on_connected();

        let shutdown = loop {
            tokio::select! {
                biased;
                command = commands.recv() => {
                    break command.unwrap_or_else(|| {
                        Shutdown::new(SessionEnd::new(CloseCode::ClosedByClient, "session dropped"))
                    });
                }
                message = stream.next() => {
                    if let Some(shutdown) = self.handle(message) {
                        break shutdown;
                    }
                }
            }
        };

        if let Some(error) = &shutdown.error {
            self.callback.on_error(error);
        }
        self.finish(shutdown.end).await;
    }

    fn handle(&mut self, message: Option<Result<WireMessage>>) -> Option<Shutdown> {
        match message {
            Some(Ok(WireMessage::Binary(bytes))) => {
                self.shared.update_stats(|stats| stats.record_received(bytes.len()));
                self.callback.on_audio_data(&bytes);
                None
            }
            Some(Ok(WireMessage::Text(text))) => self.dispatch(&text).map(Shutdown::new),
            Some(Ok(WireMessage::Close(frame))) => {
                let (code, reason) = frame.unwrap_or((1005, String::new()));
                tracing::info!("connection closed by server: {} {}", code, reason);
                Some(Shutdown::new(SessionEnd::new(
                    CloseCode::ClosedByServer(code),
                    &reason,
                )))
            }
            Some(Err(e)) => {
                tracing::error!("failed to read message: {}", e);
                Some(Shutdown::transport(e))
            }
            None => {
                tracing::error!("connection for task {} ended unexpectedly", self.task_id);
                Some(Shutdown::transport(Error::Transport(
                    "connection ended unexpectedly".to_string(),
                )))
            }
        }
    }

    /// Decodes one control message and dispatches it. Returns the session
    /// end when the event is terminal.
    fn dispatch(&mut self, text: &str) -> Option<SessionEnd> {
        let event = match ServerEvent::from_json(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("failed to deserialize event: {}, text=> {:?}", e, text);
                self.callback
                    .on_error(&Error::Protocol(format!("undecodable message: {}", e)));
                return None;
            }
        };
        tracing::debug!("received {} for task {}", event.name(), self.task_id);
        self.shared.update_stats(Stats::record_event);
        self.callback.on_event(&event);

        match event {
            ServerEvent::Started { task_id, dialog_id } => {
                if let Some(task_id) = task_id.filter(|id| *id != self.task_id) {
                    tracing::warn!("started event for foreign task {}", task_id);
                }
                self.shared
                    .state
                    .send_if_modified(|s| s.started(dialog_id.clone()));
                self.callback.on_started(dialog_id.as_deref());
            }
            ServerEvent::Stopped => {
                self.callback.on_stopped();
                if self.kind == SessionKind::Dialog && self.shared.state.borrow().stopping {
                    return Some(SessionEnd::new(CloseCode::Finished, "dialog stopped"));
                }
            }
            ServerEvent::StateChanged(state) => self.callback.on_state_changed(&state),
            ServerEvent::RequestAccepted | ServerEvent::HeartBeat => {}
            ServerEvent::SpeechStarted => self.callback.on_speech_started(),
            ServerEvent::SpeechEnded => self.callback.on_speech_ended(),
            ServerEvent::SpeechContent(text) => self.callback.on_speech_content(&text),
            ServerEvent::RespondingStarted => self.callback.on_responding_started(),
            ServerEvent::RespondingContent(text) => self.callback.on_responding_content(&text),
            ServerEvent::RespondingEnded => self.callback.on_responding_ended(),
            ServerEvent::ResultGenerated(payload) => {
                self.record_usage(&payload);
                self.callback.on_result(&payload);
            }
            ServerEvent::TaskFinished(payload) => {
                self.record_usage(&payload);
                self.callback.on_complete();
                if self.kind.ends_with_task() {
                    return Some(SessionEnd::new(CloseCode::Finished, "task finished"));
                }
            }
            ServerEvent::TaskFailed(details) => {
                tracing::error!("task {} failed: {}", self.task_id, details);
                self.callback.on_error(&Error::TaskFailed(details.clone()));
                return Some(SessionEnd::failed(details));
            }
            ServerEvent::Error(details) => {
                tracing::error!("server error on task {}: {}", self.task_id, details);
                self.callback.on_error(&Error::Server(details.clone()));
                return Some(SessionEnd::failed(details));
            }
            ServerEvent::Unknown { name, .. } => {
                tracing::warn!("unhandled event {:?} for task {}", name, self.task_id);
            }
        }
        None
    }

    fn record_usage(&self, payload: &EventPayload) {
        if let Some(usage) = payload.usage() {
            self.shared.update_stats(|stats| stats.update_usage(usage));
        }
    }

    async fn finish(&mut self, end: SessionEnd) {
        if !self.shared.state.send_if_modified(|s| s.close(end.clone())) {
            return;
        }
        release_transport(&self.shared, &self.task_id, &end).await;
        tracing::info!("session for task {} closed: {} ({})", self.task_id, end.code(), end.reason());
        self.callback.on_close(end.code(), end.reason());
        self.shared.state.send_if_modified(Snapshot::release);
    }
}

async fn release_transport(shared: &Shared, task_id: &str, end: &SessionEnd) {
    let release = async {
        let mut writer = shared.writer.lock().await;
        let Some(mut sink) = writer.take() else {
            return;
        };
        if end.is_local() {
            let frame = WireMessage::Close(Some((end.code().as_u16(), end.code().to_string())));
            if let Err(e) = sink.send(frame).await {
                tracing::debug!("failed to send close frame: {}", e);
            }
        }
        if let Err(e) = sink.close().await {
            tracing::debug!("failed to close transport: {}", e);
        }
    };
    if tokio::time::timeout(RELEASE_TIMEOUT, release).await.is_err() {
        tracing::warn!("releasing transport for task {} timed out", task_id);
    }
}

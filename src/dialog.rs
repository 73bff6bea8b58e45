use crate::callback::SessionCallback;
use crate::cancel::CancellationToken;
use crate::client::config::Config;
use crate::client::stats::Stats;
use crate::error::{Error, Result};
use crate::session::{DuplexSession, SessionEnd, SessionKind, SessionState, StopOutcome};
use crate::transport::Connector;
use dashscope_realtime_types::dialog::{DialogInput, DialogParameters};
use dashscope_realtime_types::events::{Action, ClientMessage, Streaming};
use std::sync::Arc;
use std::time::Duration;

const TASK_GROUP: &str = "aigc";
const TASK: &str = "multimodal-generation";
const FUNCTION: &str = "generation";

/// Long-lived voice conversation with a multimodal application.
pub struct MultiModalDialog {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    model: String,
    app_id: String,
    workspace_id: Option<String>,
    dialog_id: Option<String>,
    parameters: DialogParameters,
}

impl MultiModalDialog {
    pub(crate) fn new(
        config: Arc<Config>,
        connector: Arc<dyn Connector>,
        model: &str,
        app_id: &str,
    ) -> Self {
        let workspace_id = config.workspace().map(str::to_string);
        Self {
            config,
            connector,
            model: model.to_string(),
            app_id: app_id.to_string(),
            workspace_id,
            dialog_id: None,
            parameters: DialogParameters::default(),
        }
    }

    pub fn with_workspace_id(mut self, workspace_id: &str) -> Self {
        self.workspace_id = Some(workspace_id.to_string());
        self
    }

    /// Continues an earlier conversation instead of starting a new one.
    pub fn with_dialog_id(mut self, dialog_id: &str) -> Self {
        self.dialog_id = Some(dialog_id.to_string());
        self
    }

    pub fn with_parameters(mut self, parameters: DialogParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameters(&self) -> &DialogParameters {
        &self.parameters
    }

    pub async fn start<C: SessionCallback>(&self, callback: C) -> Result<DialogSession> {
        let session = DuplexSession::open(
            &self.config,
            self.connector.as_ref(),
            SessionKind::Dialog,
            callback,
        )
        .await?;
        let dialog = DialogSession {
            session,
            model: self.model.clone(),
            app_id: self.app_id.clone(),
            workspace_id: self.workspace_id.clone(),
            start_timeout: self.config.connect_timeout(),
            stop_timeout: self.config.stop_timeout(),
        };

        let sent = dialog
            .send_start(self.dialog_id.as_deref(), &self.parameters)
            .await;
        if let Err(e) = sent {
            dialog.close().await;
            return Err(e);
        }
        Ok(dialog)
    }
}

/// An open dialog. Turns repeat on the same connection until `stop` or
/// `close`.
pub struct DialogSession {
    session: DuplexSession,
    model: String,
    app_id: String,
    workspace_id: Option<String>,
    start_timeout: Duration,
    stop_timeout: Duration,
}

impl DialogSession {
    pub fn task_id(&self) -> &str {
        self.session.task_id()
    }

    /// Assigned by the service in its `Started` directive.
    pub fn dialog_id(&self) -> Option<String> {
        self.session.dialog_id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn stats(&self) -> Stats {
        self.session.stats()
    }

    pub async fn wait_started(&self, limit: Option<Duration>) -> Result<()> {
        self.session
            .wait_started(limit.unwrap_or(self.start_timeout))
            .await
    }

    fn directive(&self, action: Action, dialog_id: Option<&str>) -> Result<ClientMessage> {
        let input = DialogInput::new(&self.app_id, action.as_str())
            .with_workspace_id(self.workspace_id.as_deref())
            .with_dialog_id(dialog_id);
        Ok(ClientMessage::new(action, self.session.task_id())
            .with_streaming(Streaming::Duplex)
            .with_model(&self.model)
            .with_task(TASK_GROUP, TASK, FUNCTION)
            .with_input(serde_json::to_value(input)?))
    }

    async fn send_start(&self, dialog_id: Option<&str>, parameters: &DialogParameters) -> Result<()> {
        let message = self
            .directive(Action::Start, dialog_id)?
            .with_parameters(serde_json::to_value(parameters)?);
        self.session.send_start(&message).await
    }

    async fn send_directive(&self, action: Action) -> Result<()> {
        let dialog_id = self.session.dialog_id();
        let message = self.directive(action, dialog_id.as_deref())?;
        self.session.send_directive(&message).await
    }

    /// Forwards one frame of captured audio.
    pub async fn send_audio(&self, frame: &[u8]) -> Result<()> {
        self.session.send_audio(frame).await
    }

    /// Opens a user turn.
    pub async fn start_speech(&self) -> Result<()> {
        self.send_directive(Action::SendSpeech).await
    }

    /// Ends the current user turn; the dialog stays open.
    pub async fn stop_speech(&self) -> Result<()> {
        self.send_directive(Action::StopSpeech).await
    }

    /// Cuts the assistant off mid-response so the user can speak.
    pub async fn interrupt(&self) -> Result<()> {
        self.send_directive(Action::RequestToSpeak).await
    }

    /// Asks the assistant to answer `text` directly, e.g. `kind = "prompt"`.
    pub async fn request_to_respond(&self, kind: &str, text: &str) -> Result<()> {
        let dialog_id = self.session.dialog_id();
        let input = DialogInput::new(&self.app_id, Action::RequestToRespond.as_str())
            .with_workspace_id(self.workspace_id.as_deref())
            .with_dialog_id(dialog_id.as_deref())
            .with_request(kind, text);
        let message = self
            .directive(Action::RequestToRespond, dialog_id.as_deref())?
            .with_input(serde_json::to_value(input)?);
        self.session.send_directive(&message).await
    }

    /// Keeps an idle dialog from being closed by the service.
    pub async fn send_heartbeat(&self) -> Result<()> {
        self.send_directive(Action::HeartBeat).await
    }

    /// Ends the dialog: sends `Stop`, waits for `Stopped` up to the stop
    /// timeout, then closes the connection.
    pub async fn stop(&self) -> Result<StopOutcome> {
        self.stop_inner(None).await
    }

    pub async fn stop_with_cancel(&self, cancel: &CancellationToken) -> Result<StopOutcome> {
        self.stop_inner(Some(cancel)).await
    }

    async fn stop_inner(&self, cancel: Option<&CancellationToken>) -> Result<StopOutcome> {
        if let Some(end) = self.session.end() {
            return Ok(StopOutcome::AlreadyFinished(end.code()));
        }
        if self.session.begin_stopping() {
            let dialog_id = self.session.dialog_id();
            let message = self.directive(Action::Stop, dialog_id.as_deref())?;
            match self.session.send_message(&message).await {
                Ok(()) => {}
                Err(Error::Closed) => {
                    return match self.session.end() {
                        Some(end) => Ok(StopOutcome::AlreadyFinished(end.code())),
                        None => Err(Error::Closed),
                    };
                }
                Err(e) => return Err(e),
            }
        }
        let drained = self.session.drain(Some(self.stop_timeout), cancel).await?;
        Ok(drained.into_outcome())
    }

    /// Closes immediately without waiting for the service.
    pub async fn close(&self) {
        self.session.close().await;
    }

    /// Waits until the session ended, however that happened.
    pub async fn wait_closed(&self) -> Option<SessionEnd> {
        self.session.wait_closed().await
    }
}

use crate::callback::{NoopCallback, SessionCallback, Tee};
use crate::cancel::CancellationToken;
use crate::client::config::Config;
use crate::client::stats::Stats;
use crate::error::{Error, Result};
use crate::session::{DuplexSession, SessionEnd, SessionKind, SessionState, StopOutcome};
use crate::transport::Connector;
use dashscope_realtime_types::audio::AudioFormat;
use dashscope_realtime_types::events::{Action, ClientMessage, EventPayload, ServerEvent, Streaming};
use dashscope_realtime_types::recognition::{RecognitionSentence, RecognitionUsage};
use dashscope_realtime_utils::audio::{frame_len, pcm16_duration, split_for_frames, DEFAULT_FRAME_MS};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TASK_GROUP: &str = "audio";
const TASK: &str = "asr";
const FUNCTION: &str = "recognition";

/// Streams client audio to a recognition model and receives text back.
pub struct Recognition {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    model: String,
    format: AudioFormat,
    sample_rate: u32,
    parameters: Map<String, Value>,
    frame_ms: u32,
}

impl Recognition {
    pub(crate) fn new(
        config: Arc<Config>,
        connector: Arc<dyn Connector>,
        model: &str,
        format: AudioFormat,
        sample_rate: u32,
    ) -> Self {
        Self {
            config,
            connector,
            model: model.to_string(),
            format,
            sample_rate,
            parameters: Map::new(),
            frame_ms: DEFAULT_FRAME_MS,
        }
    }

    /// Extra model parameter such as `vocabulary_id` or `disfluency_removal_enabled`.
    pub fn with_parameter(mut self, key: &str, value: Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    /// Audio length of each frame sent by [`Recognition::call`].
    pub fn with_frame_interval(mut self, frame_ms: u32) -> Self {
        self.frame_ms = frame_ms;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn run_task(&self, task_id: &str) -> ClientMessage {
        let mut parameters = self.parameters.clone();
        parameters.insert("format".to_string(), json!(self.format));
        parameters.insert("sample_rate".to_string(), json!(self.sample_rate));
        ClientMessage::new(Action::RunTask, task_id)
            .with_streaming(Streaming::Duplex)
            .with_model(&self.model)
            .with_task(TASK_GROUP, TASK, FUNCTION)
            .with_parameters(Value::Object(parameters))
    }

    /// Opens the connection and requests the task. Audio may be sent once
    /// the service acknowledged it, see [`RecognitionSession::wait_started`].
    pub async fn start<C: SessionCallback>(&self, callback: C) -> Result<RecognitionSession> {
        let session = DuplexSession::open(
            &self.config,
            self.connector.as_ref(),
            SessionKind::Recognition,
            callback,
        )
        .await?;
        if let Err(e) = session.send_start(&self.run_task(session.task_id())).await {
            session.close().await;
            return Err(e);
        }
        Ok(RecognitionSession {
            session,
            stop_timeout: self.config.stop_timeout(),
            start_timeout: self.config.connect_timeout(),
        })
    }

    /// Recognizes a complete recording, sent as consecutive frames at the
    /// pace of real audio.
    pub async fn call(&self, audio: &[u8]) -> Result<RecognitionResult> {
        self.call_with_callback(audio, NoopCallback).await
    }

    pub async fn call_with_callback<C: SessionCallback>(
        &self,
        audio: &[u8],
        callback: C,
    ) -> Result<RecognitionResult> {
        let frame_len = frame_len(self.sample_rate, self.frame_ms)
            .map_err(|e| Error::Config(e.to_string()))?;
        let result = Arc::new(Mutex::new(RecognitionResult::default()));
        let collector = Collector {
            result: result.clone(),
        };
        let session = self.start(Tee(collector, callback)).await?;

        let streamed = async {
            session.wait_started(None).await?;
            for frame in split_for_frames(audio, frame_len) {
                session.send_audio_frame(frame).await?;
                tokio::time::sleep(pcm16_duration(frame.len(), self.sample_rate)).await;
            }
            Ok::<_, Error>(())
        };
        if let Err(e) = streamed.await {
            session.close().await;
            return Err(e);
        }

        match session.stop().await? {
            StopOutcome::Finished | StopOutcome::AlreadyFinished(_) => {}
            StopOutcome::Failed(details) => return Err(Error::TaskFailed(details)),
            StopOutcome::Closed(code) => {
                return Err(Error::Transport(format!("connection ended: {}", code)))
            }
            StopOutcome::TimedOut => {
                return Err(Error::Timeout("recognition did not finish".to_string()))
            }
        }
        result
            .lock()
            .map(|result| result.clone())
            .map_err(|_| Error::Protocol("recognition result is unavailable".to_string()))
    }
}

/// Final sentences and usage of one recognition task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionResult {
    sentences: Vec<RecognitionSentence>,
    usage: Option<RecognitionUsage>,
}

impl RecognitionResult {
    pub fn sentences(&self) -> &[RecognitionSentence] {
        &self.sentences
    }

    pub fn usage(&self) -> Option<RecognitionUsage> {
        self.usage
    }

    /// All final sentences joined in order.
    pub fn text(&self) -> String {
        self.sentences
            .iter()
            .map(RecognitionSentence::text)
            .collect::<Vec<_>>()
            .join("")
    }

    fn record(&mut self, payload: &EventPayload) {
        match payload.output_field_as::<RecognitionSentence>("sentence") {
            Ok(Some(sentence)) if sentence.is_sentence_end() => self.sentences.push(sentence),
            Ok(_) => {}
            Err(e) => tracing::warn!("failed to decode sentence: {}", e),
        }
        match payload.usage_as::<RecognitionUsage>() {
            Ok(Some(usage)) => self.usage = Some(usage),
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to decode usage: {}", e),
        }
    }
}

struct Collector {
    result: Arc<Mutex<RecognitionResult>>,
}

impl SessionCallback for Collector {
    fn on_event(&mut self, event: &ServerEvent) {
        if let ServerEvent::ResultGenerated(payload) | ServerEvent::TaskFinished(payload) = event {
            match self.result.lock() {
                Ok(mut result) => result.record(payload),
                Err(_) => tracing::error!("failed to update recognition result"),
            }
        }
    }
}

/// A running recognition task.
pub struct RecognitionSession {
    session: DuplexSession,
    stop_timeout: Duration,
    start_timeout: Duration,
}

impl RecognitionSession {
    pub fn task_id(&self) -> &str {
        self.session.task_id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn stats(&self) -> Stats {
        self.session.stats()
    }

    /// Waits for the acknowledgment, by default up to the connect timeout.
    pub async fn wait_started(&self, limit: Option<Duration>) -> Result<()> {
        self.session
            .wait_started(limit.unwrap_or(self.start_timeout))
            .await
    }

    /// Forwards one frame of audio. Fails with [`Error::NotReady`] before the
    /// acknowledgment and with [`Error::Stopping`] once `stop` was called.
    pub async fn send_audio_frame(&self, frame: &[u8]) -> Result<()> {
        self.session.send_audio(frame).await
    }

    /// Requests the end of the task and waits for the final results, closing
    /// the connection if they do not arrive within the stop timeout.
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
            let message = ClientMessage::new(Action::FinishTask, self.task_id())
                .with_streaming(Streaming::Duplex);
            match self.session.send_message(&message).await {
                Ok(()) => {}
                Err(Error::Closed) => {
                    let code = self.session.end().map(|end| end.code());
                    if let Some(code) = code {
                        return Ok(StopOutcome::AlreadyFinished(code));
                    }
                    return Err(Error::Closed);
                }
                Err(e) => return Err(e),
            }
        }
        let drained = self.session.drain(Some(self.stop_timeout), cancel).await?;
        Ok(drained.into_outcome())
    }

    pub async fn close(&self) {
        self.session.close().await;
    }

    /// Waits until the session ended, however that happened.
    pub async fn wait_closed(&self) -> Option<SessionEnd> {
        self.session.wait_closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_final_sentences_are_collected() {
        let mut result = RecognitionResult::default();
        let partial: EventPayload = serde_json::from_value(json!({
            "output": {"sentence": {"begin_time": 0, "end_time": null, "text": "hel"}}
        }))
        .unwrap();
        let last: EventPayload = serde_json::from_value(json!({
            "output": {"sentence": {"begin_time": 0, "end_time": 800, "text": "hello.", "sentence_end": true}},
            "usage": {"duration": 2}
        }))
        .unwrap();
        result.record(&partial);
        result.record(&last);

        assert_eq!(result.sentences().len(), 1);
        assert_eq!(result.text(), "hello.");
        assert_eq!(result.usage().map(|usage| usage.duration()), Some(2));
    }
}

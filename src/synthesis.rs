use crate::callback::{SessionCallback, Tee};
use crate::cancel::CancellationToken;
use crate::client::config::Config;
use crate::client::stats::Stats;
use crate::error::{Error, Result};
use crate::session::{DuplexSession, Drained, SessionKind};
use crate::transport::Connector;
use dashscope_realtime_types::audio::{AudioFormat, SAMPLE_RATE_16K};
use dashscope_realtime_types::events::{Action, ClientMessage, EventPayload, ServerEvent, Streaming};
use dashscope_realtime_types::synthesis::{SynthesisSentence, SynthesisUsage};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

const TASK_GROUP: &str = "audio";
const TASK: &str = "tts";
const FUNCTION: &str = "SpeechSynthesizer";

/// Audio and timing collected over one synthesis task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisResult {
    audio: Vec<u8>,
    sentences: Vec<SynthesisSentence>,
    usage: Option<SynthesisUsage>,
    stats: Stats,
}

impl SynthesisResult {
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn into_audio(self) -> Vec<u8> {
        self.audio
    }

    /// Sentences ordered by index; a re-sent index replaces the earlier entry.
    pub fn sentences(&self) -> &[SynthesisSentence] {
        &self.sentences
    }

    pub fn usage(&self) -> Option<SynthesisUsage> {
        self.usage
    }

    /// Traffic counters of the session that produced this result.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Writes the raw audio, exactly as received, to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        tokio::fs::write(path, &self.audio).await?;
        Ok(())
    }

    fn push_sentence(&mut self, sentence: SynthesisSentence) {
        match self
            .sentences
            .binary_search_by_key(&sentence.index(), SynthesisSentence::index)
        {
            Ok(position) => self.sentences[position] = sentence,
            Err(position) => self.sentences.insert(position, sentence),
        }
    }

    fn record(&mut self, payload: &EventPayload) {
        match payload.output_field_as::<SynthesisSentence>("sentence") {
            Ok(Some(sentence)) => self.push_sentence(sentence),
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to decode sentence: {}", e),
        }
        match payload.usage_as::<SynthesisUsage>() {
            Ok(Some(usage)) => self.usage = Some(usage),
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to decode usage: {}", e),
        }
    }
}

struct Collector {
    result: Arc<Mutex<SynthesisResult>>,
}

impl Collector {
    fn update(&self, update: impl FnOnce(&mut SynthesisResult)) {
        match self.result.lock() {
            Ok(mut result) => update(&mut result),
            Err(_) => tracing::error!("failed to update synthesis result"),
        }
    }
}

impl SessionCallback for Collector {
    fn on_audio_data(&mut self, data: &[u8]) {
        self.update(|result| result.audio.extend_from_slice(data));
    }

    fn on_event(&mut self, event: &ServerEvent) {
        if let ServerEvent::ResultGenerated(payload) | ServerEvent::TaskFinished(payload) = event {
            self.update(|result| result.record(payload));
        }
    }
}

/// Turns text into audio over a one-shot, server-streaming task.
pub struct SpeechSynthesizer {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    model: String,
    format: AudioFormat,
    sample_rate: u32,
    parameters: Map<String, Value>,
}

impl SpeechSynthesizer {
    pub(crate) fn new(config: Arc<Config>, connector: Arc<dyn Connector>, model: &str) -> Self {
        Self {
            config,
            connector,
            model: model.to_string(),
            format: AudioFormat::Pcm,
            sample_rate: SAMPLE_RATE_16K,
            parameters: Map::new(),
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Extra model parameter such as `volume`, `rate` or `word_timestamp_enabled`.
    pub fn with_parameter(mut self, key: &str, value: Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn call<C: SessionCallback>(&self, text: &str, callback: C) -> Result<SynthesisResult> {
        self.run(text, callback, None).await
    }

    /// Like [`SpeechSynthesizer::call`]; cancelling closes the connection and
    /// returns [`Error::Cancelled`].
    pub async fn call_with_cancel<C: SessionCallback>(
        &self,
        text: &str,
        callback: C,
        cancel: &CancellationToken,
    ) -> Result<SynthesisResult> {
        self.run(text, callback, Some(cancel)).await
    }

    fn parameters(&self) -> Value {
        let mut parameters = self.parameters.clone();
        parameters.insert("format".to_string(), json!(self.format));
        parameters.insert("sample_rate".to_string(), json!(self.sample_rate));
        Value::Object(parameters)
    }

    async fn run<C: SessionCallback>(
        &self,
        text: &str,
        callback: C,
        cancel: Option<&CancellationToken>,
    ) -> Result<SynthesisResult> {
        let result = Arc::new(Mutex::new(SynthesisResult::default()));
        let collector = Collector {
            result: result.clone(),
        };
        let session = DuplexSession::open(
            &self.config,
            self.connector.as_ref(),
            SessionKind::Synthesis,
            Tee(collector, callback),
        )
        .await?;

        let message = ClientMessage::new(Action::RunTask, session.task_id())
            .with_streaming(Streaming::Out)
            .with_model(&self.model)
            .with_task(TASK_GROUP, TASK, FUNCTION)
            .with_parameters(self.parameters())
            .with_input(json!({ "text": text }));
        if let Err(e) = session.send_start(&message).await {
            session.close().await;
            return Err(e);
        }

        match session.drain(None, cancel).await? {
            Drained::Ended(end) => end.into_result()?,
            Drained::TimedOut => return Err(Error::Timeout("synthesis".to_string())),
        }
        let mut result = result
            .lock()
            .map(|result| result.clone())
            .map_err(|_| Error::Protocol("synthesis result is unavailable".to_string()))?;
        result.stats = session.stats();
        tracing::debug!(
            "synthesized {} bytes in {} sentences",
            result.audio.len(),
            result.sentences.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> EventPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn resent_sentence_replaces_earlier_entry() {
        let mut result = SynthesisResult::default();
        result.record(&payload(json!({"output": {"sentence": {"index": 1, "words": []}}})));
        result.record(&payload(json!({"output": {"sentence": {"index": 0, "words": []}}})));
        result.record(&payload(json!({"output": {"sentence": {"index": 1, "words": [
            {"text": "hi", "begin_time": 0, "end_time": 300}
        ]}}})));

        let indexes: Vec<u32> = result.sentences().iter().map(SynthesisSentence::index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(result.sentences()[1].end_time(), Some(300));
    }

    #[test]
    fn usage_is_taken_from_payload() {
        let mut result = SynthesisResult::default();
        result.record(&payload(json!({"output": {}, "usage": {"characters": 7}})));
        assert_eq!(result.usage(), Some(SynthesisUsage::new(7)));
    }

    #[tokio::test]
    async fn save_writes_raw_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pcm");
        let result = SynthesisResult {
            audio: vec![1, 2, 3, 4],
            ..Default::default()
        };
        result.save(&path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
    }
}

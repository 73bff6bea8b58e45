#![allow(dead_code)]

use dashscope_realtime::transport::memory::{memory_transport, MemoryListener, MemoryPeer};
use dashscope_realtime::types::dialog::DialogState;
use dashscope_realtime::types::events::EventPayload;
use dashscope_realtime::{Client, CloseCode, Config, Error, SessionCallback};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn memory_client(stop_timeout: Duration) -> (Client, MemoryListener) {
    init_tracing();
    let (connector, listener) = memory_transport();
    let config = Config::builder()
        .with_api_key("sk-test")
        .with_stop_timeout(stop_timeout)
        .build();
    let client = Client::with_connector(config, Arc::new(connector)).unwrap();
    (client, listener)
}

/// Everything a session reported, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Connected,
    Started(Option<String>),
    Stopped,
    SpeechStarted,
    SpeechEnded,
    SpeechContent(String),
    RespondingStarted,
    RespondingContent(String),
    RespondingEnded,
    Audio(Vec<u8>),
    Result,
    Complete,
    StateChanged(DialogState),
    Error(String),
    Close(CloseCode),
}

#[derive(Clone, Default)]
pub struct Recorder {
    records: Arc<Mutex<Vec<Record>>>,
}

impl Recorder {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Record) -> bool) -> usize {
        self.records().iter().filter(|record| matches(record)).count()
    }

    fn push(&self, record: Record) {
        self.records.lock().unwrap().push(record);
    }
}

impl SessionCallback for Recorder {
    fn on_connected(&mut self) {
        self.push(Record::Connected);
    }

    fn on_started(&mut self, dialog_id: Option<&str>) {
        self.push(Record::Started(dialog_id.map(str::to_string)));
    }

    fn on_stopped(&mut self) {
        self.push(Record::Stopped);
    }

    fn on_speech_started(&mut self) {
        self.push(Record::SpeechStarted);
    }

    fn on_speech_ended(&mut self) {
        self.push(Record::SpeechEnded);
    }

    fn on_speech_content(&mut self, text: &str) {
        self.push(Record::SpeechContent(text.to_string()));
    }

    fn on_responding_started(&mut self) {
        self.push(Record::RespondingStarted);
    }

    fn on_responding_content(&mut self, text: &str) {
        self.push(Record::RespondingContent(text.to_string()));
    }

    fn on_responding_ended(&mut self) {
        self.push(Record::RespondingEnded);
    }

    fn on_audio_data(&mut self, data: &[u8]) {
        self.push(Record::Audio(data.to_vec()));
    }

    fn on_result(&mut self, _payload: &EventPayload) {
        self.push(Record::Result);
    }

    fn on_complete(&mut self) {
        self.push(Record::Complete);
    }

    fn on_state_changed(&mut self, state: &DialogState) {
        self.push(Record::StateChanged(state.clone()));
    }

    fn on_error(&mut self, error: &Error) {
        let code = error
            .details()
            .map(|details| format!("{}/{}", details.code(), details.message()))
            .unwrap_or_else(|| error.to_string());
        self.push(Record::Error(code));
    }

    fn on_close(&mut self, code: CloseCode, _reason: &str) {
        self.push(Record::Close(code));
    }
}

/// Reads the initiating control message and returns its task id.
pub async fn accept_task(peer: &mut MemoryPeer) -> (String, Value) {
    let message = peer.recv_json().await.expect("initiating message");
    let task_id = message["header"]["task_id"].as_str().unwrap().to_string();
    (task_id, message)
}

pub fn event(name: &str, task_id: &str, payload: Value) -> Value {
    json!({"header": {"event": name, "task_id": task_id}, "payload": payload})
}

pub fn directive(name: &str, task_id: &str, output: Value) -> Value {
    let mut output = output;
    output["directive"] = json!(name);
    json!({"header": {"task_id": task_id}, "payload": {"output": output}})
}

/// Polls `condition` until it holds, for at most a second.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

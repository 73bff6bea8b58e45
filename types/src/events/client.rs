use crate::macros::open_enum;
use serde_json::Value;

open_enum! {
    /// `header.action` of an outbound control message.
    pub enum Action {
        RunTask => "run-task",
        FinishTask => "finish-task",
        Start => "Start",
        Stop => "Stop",
        SendSpeech => "SendSpeech",
        StopSpeech => "StopSpeech",
        /// Interrupts the assistant mid-response so the user can speak.
        RequestToSpeak => "RequestToSpeak",
        RequestToRespond => "RequestToRespond",
        HeartBeat => "HeartBeat",
        _ => Unknown,
    }
}

/// Direction(s) in which the task streams data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Streaming {
    /// Server streams, client sends nothing after the initiating message.
    Out,
    /// Client streams, server answers once.
    In,
    Duplex,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestHeader {
    action: Action,
    task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    streaming: Option<Streaming>,
}

impl RequestHeader {
    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn streaming(&self) -> Option<Streaming> {
        self.streaming
    }
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct RequestPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
    /// Always present; the service rejects messages without an `input` object.
    input: Value,
}

impl RequestPayload {
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn task_group(&self) -> Option<&str> {
        self.task_group.as_deref()
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn parameters(&self) -> Option<&Value> {
        self.parameters.as_ref()
    }

    pub fn input(&self) -> &Value {
        &self.input
    }
}

/// Outbound control message: `{header:{action, task_id, streaming}, payload:{...}}`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClientMessage {
    header: RequestHeader,
    payload: RequestPayload,
}

impl ClientMessage {
    pub fn new(action: Action, task_id: &str) -> Self {
        Self {
            header: RequestHeader {
                action,
                task_id: task_id.to_string(),
                streaming: None,
            },
            payload: RequestPayload {
                input: Value::Object(Default::default()),
                ..Default::default()
            },
        }
    }

    pub fn with_streaming(mut self, streaming: Streaming) -> Self {
        self.header.streaming = Some(streaming);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.payload.model = Some(model.to_string());
        self
    }

    /// Sets the `task_group`/`task`/`function` triple that routes the message.
    pub fn with_task(mut self, task_group: &str, task: &str, function: &str) -> Self {
        self.payload.task_group = Some(task_group.to_string());
        self.payload.task = Some(task.to_string());
        self.payload.function = Some(function.to_string());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.payload.parameters = Some(parameters);
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.payload.input = input;
        self
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finish_task_carries_only_an_empty_input() {
        let message = ClientMessage::new(Action::FinishTask, "abc").with_streaming(Streaming::Duplex);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "header": {"action": "finish-task", "task_id": "abc", "streaming": "duplex"},
                "payload": {"input": {}}
            })
        );
    }

    #[test]
    fn run_task_serializes_full_payload() {
        let message = ClientMessage::new(Action::RunTask, "t1")
            .with_streaming(Streaming::Out)
            .with_model("sambert-zhichu-v1")
            .with_task("audio", "tts", "SpeechSynthesizer")
            .with_parameters(json!({"format": "pcm", "sample_rate": 16000}))
            .with_input(json!({"text": "hello"}));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["header"]["action"], "run-task");
        assert_eq!(value["header"]["streaming"], "out");
        assert_eq!(value["payload"]["task_group"], "audio");
        assert_eq!(value["payload"]["function"], "SpeechSynthesizer");
        assert_eq!(value["payload"]["parameters"]["sample_rate"], 16000);
        assert_eq!(value["payload"]["input"]["text"], "hello");
    }

    #[test]
    fn unknown_action_round_trips_by_name() {
        let action: Action = serde_json::from_str(r#""Execute""#).unwrap();
        assert_eq!(action, Action::Unknown("Execute".to_string()));
        assert_eq!(serde_json::to_string(&action).unwrap(), r#""Execute""#);
    }
}

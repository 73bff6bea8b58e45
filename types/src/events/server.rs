mod error;

pub use error::ErrorDetails;

use crate::dialog::DialogState;
use crate::macros::open_enum;
use serde::de::DeserializeOwned;
use serde_json::Value;

open_enum! {
    /// Discriminator of an inbound control message. One-shot tasks name it in
    /// `header.event`, the dialog service in `payload.output.directive`.
    pub enum EventName {
        TaskStarted => "task-started",
        ResultGenerated => "result-generated",
        TaskFinished => "task-finished",
        TaskFailed => "task-failed",
        Started => "Started",
        Stopped => "Stopped",
        DialogStateChanged => "DialogStateChanged",
        RequestAccepted => "RequestAccepted",
        SpeechStarted => "SpeechStarted",
        SpeechEnded => "SpeechEnded",
        SpeechContent => "SpeechContent",
        RespondingStarted => "RespondingStarted",
        RespondingContent => "RespondingContent",
        RespondingEnded => "RespondingEnded",
        Error => "Error",
        HeartBeat => "HeartBeat",
        _ => Unknown,
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl EventHeader {
    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn directive(&self) -> Option<&str> {
        self.directive.as_deref()
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// `output`/`usage` are kept as raw JSON; each capability decodes the shape it
/// owns with [`EventPayload::output_as`] or [`EventPayload::usage_as`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<Value>,
}

impl EventPayload {
    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn usage(&self) -> Option<&Value> {
        self.usage.as_ref()
    }

    pub fn output_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        decode_opt(self.output.as_ref())
    }

    /// Decodes a single field of `output`, e.g. `sentence`.
    pub fn output_field_as<T: DeserializeOwned>(
        &self,
        field: &str,
    ) -> Result<Option<T>, serde_json::Error> {
        decode_opt(self.output.as_ref().and_then(|output| output.get(field)))
    }

    pub fn usage_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        decode_opt(self.usage.as_ref())
    }

    fn output_str(&self, field: &str) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|output| output.get(field))
            .and_then(Value::as_str)
    }
}

fn decode_opt<T: DeserializeOwned>(value: Option<&Value>) -> Result<Option<T>, serde_json::Error> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value).map(Some),
    }
}

/// Inbound control message as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    header: EventHeader,
    #[serde(default)]
    payload: EventPayload,
}

impl ServerMessage {
    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// `header.event`, then `header.directive`, then `payload.output.directive`.
    pub fn name(&self) -> EventName {
        let name = self
            .header
            .event()
            .or(self.header.directive())
            .or(self.payload.output_str("directive"))
            .unwrap_or_default();
        EventName::from_name(name)
    }

    fn error_details(&self) -> ErrorDetails {
        let code = self.header.error_code().unwrap_or_default();
        let message = self
            .header
            .error_message()
            .or(self.payload.output_str("text"))
            .unwrap_or_default();
        ErrorDetails::new(code, message)
    }
}

/// Decoded inbound control message. Decoding is total: anything the client
/// does not recognize becomes [`ServerEvent::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// `task-started` or the dialog `Started` directive.
    Started {
        task_id: Option<String>,
        dialog_id: Option<String>,
    },
    Stopped,
    StateChanged(DialogState),
    RequestAccepted,
    HeartBeat,
    SpeechStarted,
    SpeechEnded,
    SpeechContent(String),
    RespondingStarted,
    RespondingContent(String),
    RespondingEnded,
    ResultGenerated(EventPayload),
    TaskFinished(EventPayload),
    TaskFailed(ErrorDetails),
    Error(ErrorDetails),
    Unknown { name: String, message: ServerMessage },
}

impl ServerEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let message: ServerMessage = serde_json::from_str(text)?;
        Ok(Self::from_message(message))
    }

    pub fn from_message(message: ServerMessage) -> Self {
        let text = |payload: &EventPayload| payload.output_str("text").unwrap_or_default().to_string();
        match message.name() {
            EventName::TaskStarted | EventName::Started => ServerEvent::Started {
                task_id: message.header.task_id.clone(),
                dialog_id: message.payload.output_str("dialog_id").map(str::to_string),
            },
            EventName::Stopped => ServerEvent::Stopped,
            EventName::DialogStateChanged => ServerEvent::StateChanged(DialogState::from_name(
                message.payload.output_str("state").unwrap_or_default(),
            )),
            EventName::RequestAccepted => ServerEvent::RequestAccepted,
            EventName::HeartBeat => ServerEvent::HeartBeat,
            EventName::SpeechStarted => ServerEvent::SpeechStarted,
            EventName::SpeechEnded => ServerEvent::SpeechEnded,
            EventName::SpeechContent => ServerEvent::SpeechContent(text(&message.payload)),
            EventName::RespondingStarted => ServerEvent::RespondingStarted,
            EventName::RespondingContent => ServerEvent::RespondingContent(text(&message.payload)),
            EventName::RespondingEnded => ServerEvent::RespondingEnded,
            EventName::ResultGenerated => ServerEvent::ResultGenerated(message.payload),
            EventName::TaskFinished => ServerEvent::TaskFinished(message.payload),
            EventName::TaskFailed => ServerEvent::TaskFailed(message.error_details()),
            EventName::Error => ServerEvent::Error(message.error_details()),
            EventName::Unknown(name) => ServerEvent::Unknown { name, message },
        }
    }

    pub fn name(&self) -> EventName {
        match self {
            ServerEvent::Started { .. } => EventName::Started,
            ServerEvent::Stopped => EventName::Stopped,
            ServerEvent::StateChanged(_) => EventName::DialogStateChanged,
            ServerEvent::RequestAccepted => EventName::RequestAccepted,
            ServerEvent::HeartBeat => EventName::HeartBeat,
            ServerEvent::SpeechStarted => EventName::SpeechStarted,
            ServerEvent::SpeechEnded => EventName::SpeechEnded,
            ServerEvent::SpeechContent(_) => EventName::SpeechContent,
            ServerEvent::RespondingStarted => EventName::RespondingStarted,
            ServerEvent::RespondingContent(_) => EventName::RespondingContent,
            ServerEvent::RespondingEnded => EventName::RespondingEnded,
            ServerEvent::ResultGenerated(_) => EventName::ResultGenerated,
            ServerEvent::TaskFinished(_) => EventName::TaskFinished,
            ServerEvent::TaskFailed(_) => EventName::TaskFailed,
            ServerEvent::Error(_) => EventName::Error,
            ServerEvent::Unknown { name, .. } => EventName::Unknown(name.clone()),
        }
    }
}

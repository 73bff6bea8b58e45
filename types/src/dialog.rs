use crate::audio::{AudioFormat, SAMPLE_RATE_16K};
use crate::macros::open_enum;

open_enum! {
    /// Server-side turn state announced by `DialogStateChanged`.
    pub enum DialogState {
        Idle => "Idle",
        Listening => "Listening",
        Thinking => "Thinking",
        Responding => "Responding",
        _ => Other,
    }
}

open_enum! {
    /// How the client signals turn boundaries upstream.
    pub enum DialogMode {
        PushToTalk => "push2talk",
        TapToTalk => "tap2talk",
        Duplex => "duplex",
        _ => Custom,
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Upstream {
    #[serde(rename = "type")]
    kind: String,
    mode: DialogMode,
    audio_format: AudioFormat,
    sample_rate: u32,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            kind: "AudioOnly".to_string(),
            mode: DialogMode::TapToTalk,
            audio_format: AudioFormat::Pcm,
            sample_rate: SAMPLE_RATE_16K,
        }
    }
}

impl Upstream {
    pub fn with_mode(mut self, mode: DialogMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_audio_format(mut self, format: AudioFormat) -> Self {
        self.audio_format = format;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn mode(&self) -> &DialogMode {
        &self.mode
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Downstream {
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    intermediate_text: String,
    audio_format: AudioFormat,
    volume: u32,
    speech_rate: u32,
    pitch_rate: u32,
}

impl Default for Downstream {
    fn default() -> Self {
        Self {
            voice: None,
            sample_rate: None,
            intermediate_text: "transcript".to_string(),
            audio_format: AudioFormat::Pcm,
            volume: 50,
            speech_rate: 100,
            pitch_rate: 100,
        }
    }
}

impl Downstream {
    pub fn with_voice(mut self, voice: &str) -> Self {
        self.voice = Some(voice.to_string());
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_audio_format(mut self, format: AudioFormat) -> Self {
        self.audio_format = format;
        self
    }

    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = volume;
        self
    }
}

/// `payload.parameters` of the dialog `Start` message.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DialogParameters {
    upstream: Upstream,
    downstream: Downstream,
}

impl DialogParameters {
    pub fn new(upstream: Upstream, downstream: Downstream) -> Self {
        Self { upstream, downstream }
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub fn downstream(&self) -> &Downstream {
        &self.downstream
    }
}

/// `payload.input` of every dialog directive.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DialogInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace_id: Option<String>,
    app_id: String,
    directive: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dialog_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl DialogInput {
    pub fn new(app_id: &str, directive: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            directive: directive.to_string(),
            ..Default::default()
        }
    }

    pub fn with_workspace_id(mut self, workspace_id: Option<&str>) -> Self {
        self.workspace_id = workspace_id.map(str::to_string);
        self
    }

    pub fn with_dialog_id(mut self, dialog_id: Option<&str>) -> Self {
        self.dialog_id = dialog_id.map(str::to_string);
        self
    }

    /// `type`/`text` of a `RequestToRespond` directive.
    pub fn with_request(mut self, kind: &str, text: &str) -> Self {
        self.kind = Some(kind.to_string());
        self.text = Some(text.to_string());
        self
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn dialog_id(&self) -> Option<&str> {
        self.dialog_id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DialogUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl DialogUsage {
    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}

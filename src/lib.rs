mod callback;
mod cancel;
mod client;
mod dialog;
mod error;
mod recognition;
mod session;
mod synthesis;
mod task;
pub mod transport;

pub use dashscope_realtime_types as types;
pub use dashscope_realtime_utils as utils;

pub use callback::{NoopCallback, SessionCallback};
pub use cancel::CancellationToken;
pub use client::config::{Config, ConfigBuilder, PollConfig};
pub use client::stats::Stats;
pub use client::{connect, Client};
pub use dialog::{DialogSession, MultiModalDialog};
pub use error::{Error, Result};
pub use recognition::{Recognition, RecognitionResult, RecognitionSession};
pub use session::{CloseCode, SessionEnd, SessionState, StopOutcome};
pub use synthesis::{SpeechSynthesizer, SynthesisResult};
pub use task::{Backoff, HttpTaskApi, TaskApi, TaskPoller, TaskSnapshot};

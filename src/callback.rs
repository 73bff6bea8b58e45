use crate::error::Error;
use crate::session::CloseCode;
use dashscope_realtime_types::dialog::DialogState;
use dashscope_realtime_types::events::{EventPayload, ServerEvent};

/// Receives everything a session observes. Methods run on the session's
/// reader task, one at a time and in arrival order, so implementations must
/// not block and need no internal locking.
#[allow(unused_variables)]
pub trait SessionCallback: Send + 'static {
    fn on_connected(&mut self) {}

    fn on_started(&mut self, dialog_id: Option<&str>) {}

    fn on_stopped(&mut self) {}

    fn on_speech_started(&mut self) {}

    fn on_speech_ended(&mut self) {}

    /// Transcript of the user's speech so far.
    fn on_speech_content(&mut self, text: &str) {}

    fn on_responding_started(&mut self) {}

    fn on_responding_content(&mut self, text: &str) {}

    fn on_responding_ended(&mut self) {}

    /// One inbound binary message, unmodified.
    fn on_audio_data(&mut self, data: &[u8]) {}

    fn on_result(&mut self, payload: &EventPayload) {}

    fn on_complete(&mut self) {}

    fn on_state_changed(&mut self, state: &DialogState) {}

    /// Every decoded control event, before its dedicated method.
    fn on_event(&mut self, event: &ServerEvent) {}

    fn on_error(&mut self, error: &Error) {}

    /// Invoked exactly once per opened session.
    fn on_close(&mut self, code: CloseCode, reason: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallback;

impl SessionCallback for NoopCallback {}

/// Feeds every notification to `first`, then to `second`.
pub(crate) struct Tee<A, B>(pub(crate) A, pub(crate) B);

impl<A: SessionCallback, B: SessionCallback> SessionCallback for Tee<A, B> {
    fn on_connected(&mut self) {
        self.0.on_connected();
        self.1.on_connected();
    }

    fn on_started(&mut self, dialog_id: Option<&str>) {
        self.0.on_started(dialog_id);
        self.1.on_started(dialog_id);
    }

    fn on_stopped(&mut self) {
        self.0.on_stopped();
        self.1.on_stopped();
    }

    fn on_speech_started(&mut self) {
        self.0.on_speech_started();
        self.1.on_speech_started();
    }

    fn on_speech_ended(&mut self) {
        self.0.on_speech_ended();
        self.1.on_speech_ended();
    }

    fn on_speech_content(&mut self, text: &str) {
        self.0.on_speech_content(text);
        self.1.on_speech_content(text);
    }

    fn on_responding_started(&mut self) {
        self.0.on_responding_started();
        self.1.on_responding_started();
    }

    fn on_responding_content(&mut self, text: &str) {
        self.0.on_responding_content(text);
        self.1.on_responding_content(text);
    }

    fn on_responding_ended(&mut self) {
        self.0.on_responding_ended();
        self.1.on_responding_ended();
    }

    fn on_audio_data(&mut self, data: &[u8]) {
        self.0.on_audio_data(data);
        self.1.on_audio_data(data);
    }

    fn on_result(&mut self, payload: &EventPayload) {
        self.0.on_result(payload);
        self.1.on_result(payload);
    }

    fn on_complete(&mut self) {
        self.0.on_complete();
        self.1.on_complete();
    }

    fn on_state_changed(&mut self, state: &DialogState) {
        self.0.on_state_changed(state);
        self.1.on_state_changed(state);
    }

    fn on_event(&mut self, event: &ServerEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }

    fn on_error(&mut self, error: &Error) {
        self.0.on_error(error);
        self.1.on_error(error);
    }

    fn on_close(&mut self, code: CloseCode, reason: &str) {
        self.0.on_close(code, reason);
        self.1.on_close(code, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Log(&'static str, Arc<Mutex<Vec<String>>>);

    impl SessionCallback for Log {
        fn on_audio_data(&mut self, data: &[u8]) {
            self.1.lock().unwrap().push(format!("{}:{}", self.0, data.len()));
        }
    }

    #[test]
    fn tee_notifies_first_then_second() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tee = Tee(Log("a", log.clone()), Log("b", log.clone()));
        tee.on_audio_data(&[0; 4]);
        tee.on_stopped();
        assert_eq!(*log.lock().unwrap(), vec!["a:4", "b:4"]);
    }
}

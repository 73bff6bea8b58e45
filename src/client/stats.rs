/// Per-session traffic and usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    frames_sent: u64,
    bytes_sent: u64,
    frames_received: u64,
    bytes_received: u64,
    events_received: u64,
    characters: u64,
    audio_seconds: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn record_received(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub(crate) fn record_event(&mut self) {
        self.events_received += 1;
    }

    /// Usage figures are cumulative per task, so the latest report wins.
    pub(crate) fn update_usage(&mut self, usage: &serde_json::Value) {
        let field = |name: &str| usage.get(name).and_then(serde_json::Value::as_u64);
        if let Some(characters) = field("characters") {
            self.characters = characters;
        }
        if let Some(duration) = field("duration") {
            self.audio_seconds = duration;
        }
        if let Some(input) = field("input_tokens") {
            self.input_tokens = input;
        }
        if let Some(output) = field("output_tokens") {
            self.output_tokens = output;
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn events_received(&self) -> u64 {
        self.events_received
    }

    pub fn characters(&self) -> u64 {
        self.characters
    }

    pub fn audio_seconds(&self) -> u64 {
        self.audio_seconds
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usage_keeps_latest_report() {
        let mut stats = Stats::new();
        stats.update_usage(&json!({"input_tokens": 10, "output_tokens": 3}));
        stats.update_usage(&json!({"input_tokens": 25}));
        assert_eq!(stats.input_tokens(), 25);
        assert_eq!(stats.output_tokens(), 3);
    }

    #[test]
    fn traffic_counters_accumulate() {
        let mut stats = Stats::new();
        stats.record_sent(3200);
        stats.record_sent(3200);
        stats.record_received(1280);
        assert_eq!(stats.frames_sent(), 2);
        assert_eq!(stats.bytes_sent(), 6400);
        assert_eq!(stats.bytes_received(), 1280);
    }
}

use crate::client::consts::*;
use secrecy::SecretString;
use std::time::Duration;

/// Backoff used while waiting on an asynchronous task: the interval starts at
/// `initial`, doubles every `increment_every` polls and never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub initial: Duration,
    pub max: Duration,
    pub increment_every: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(DEFAULT_POLL_INITIAL_SECS),
            max: Duration::from_secs(DEFAULT_POLL_MAX_SECS),
            increment_every: DEFAULT_POLL_INCREMENT_EVERY,
        }
    }
}

pub struct Config {
    websocket_url: String,
    http_url: String,
    api_key: SecretString,
    workspace: Option<String>,
    user_agent: String,
    connect_timeout: Duration,
    stop_timeout: Duration,
    poll: PollConfig,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_websocket_url(mut self, url: &str) -> Self {
        self.config.websocket_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_url(mut self, url: &str) -> Self {
        self.config.http_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.config.workspace = Some(workspace.to_string());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = user_agent.to_string();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// How long `stop()` waits for the service to finish a task before the
    /// connection is forcibly closed.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.config.poll = poll;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            websocket_url: BASE_WEBSOCKET_URL.to_string(),
            http_url: BASE_HTTP_URL.to_string(),
            api_key: SecretString::from(String::new()),
            workspace: None,
            user_agent: USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECS),
            poll: PollConfig::default(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn websocket_url(&self) -> &str {
        &self.websocket_url
    }

    pub fn http_url(&self) -> &str {
        &self.http_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    pub fn poll(&self) -> PollConfig {
        self.poll
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("websocket_url", &self.websocket_url)
            .field("http_url", &self.http_url)
            .field("workspace", &self.workspace)
            .field("connect_timeout", &self.connect_timeout)
            .field("stop_timeout", &self.stop_timeout)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

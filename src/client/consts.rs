pub const BASE_WEBSOCKET_URL: &str = "wss://dashscope.aliyuncs.com/api-ws/v1/inference";
pub const BASE_HTTP_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const WORKSPACE_HEADER: &str = "X-DashScope-WorkSpace";
pub const ASYNC_HEADER: &str = "X-DashScope-Async";

pub const USER_AGENT: &str = concat!("dashscope-realtime-rs/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_POLL_INITIAL_SECS: u64 = 1;
pub const DEFAULT_POLL_MAX_SECS: u64 = 5;
pub const DEFAULT_POLL_INCREMENT_EVERY: u32 = 3;

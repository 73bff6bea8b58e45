use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, USER_AGENT_HEADER, WORKSPACE_HEADER};

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = config.websocket_url().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(
        AUTHORIZATION_HEADER,
        format!("bearer {}", config.api_key().expose_secret()).as_str().parse()?,
    );
    headers.insert(USER_AGENT_HEADER, config.user_agent().parse()?);
    if let Some(workspace) = config.workspace() {
        headers.insert(WORKSPACE_HEADER, workspace.parse()?);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_auth_and_workspace() {
        let config = Config::builder()
            .with_api_key("sk-1")
            .with_workspace("ws-9")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(request.uri().host(), Some("dashscope.aliyuncs.com"));
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "bearer sk-1");
        assert_eq!(request.headers()[WORKSPACE_HEADER], "ws-9");
    }

    #[test]
    fn workspace_header_is_optional() {
        let config = Config::builder().with_api_key("sk-1").build();
        let request = build_request(&config).unwrap();
        assert!(request.headers().get(WORKSPACE_HEADER).is_none());
    }
}

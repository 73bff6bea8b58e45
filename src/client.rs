use crate::synthesis::SpeechSynthesizer;
use crate::recognition::Recognition;
use crate::dialog::MultiModalDialog;
use crate::task::TaskPoller;
use crate::transport::{Connector, WsConnector};
use crate::error::{Error, Result};
use dashscope_realtime_types::audio::AudioFormat;
use secrecy::ExposeSecret;
use std::sync::Arc;

pub mod consts;
pub mod config;
pub mod utils;
pub mod stats;

/// Entry point: holds the shared configuration and hands out capability
/// handles. Each handle opens its own connection per call.
#[derive(Clone)]
pub struct Client {
    config: Arc<config::Config>,
    connector: Arc<dyn Connector>,
}

impl Client {
    pub fn new(config: config::Config) -> Result<Self> {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Uses `connector` for duplex sessions instead of WebSocket.
    pub fn with_connector(config: config::Config, connector: Arc<dyn Connector>) -> Result<Self> {
        if config.api_key().expose_secret().is_empty() {
            return Err(Error::Config("api key is empty".to_string()));
        }
        Ok(Self {
            config: Arc::new(config),
            connector,
        })
    }

    pub fn config(&self) -> &config::Config {
        &self.config
    }

    pub fn speech_synthesizer(&self, model: &str) -> SpeechSynthesizer {
        SpeechSynthesizer::new(self.config.clone(), self.connector.clone(), model)
    }

    pub fn recognition(&self, model: &str, format: AudioFormat, sample_rate: u32) -> Recognition {
        Recognition::new(
            self.config.clone(),
            self.connector.clone(),
            model,
            format,
            sample_rate,
        )
    }

    pub fn dialog(&self, model: &str, app_id: &str) -> MultiModalDialog {
        MultiModalDialog::new(self.config.clone(), self.connector.clone(), model, app_id)
    }

    pub fn tasks(&self) -> Result<TaskPoller> {
        TaskPoller::new(self.config.clone())
    }
}

pub fn connect(api_key: &str) -> Result<Client> {
    Client::new(config::Config::builder().with_api_key(api_key).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            Client::new(config::Config::new()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn handles_share_configuration() {
        let client = connect("sk-test").unwrap();
        let synthesizer = client.speech_synthesizer("sambert-zhichu-v1");
        assert_eq!(synthesizer.model(), "sambert-zhichu-v1");
        assert!(client.tasks().is_ok());
    }
}

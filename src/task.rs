use crate::cancel::CancellationToken;
use crate::client::config::{Config, PollConfig};
use crate::client::consts::ASYNC_HEADER;
use crate::client::consts::WORKSPACE_HEADER;
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashscope_realtime_types::events::ErrorDetails;
use dashscope_realtime_types::task::TaskResponse;
#[cfg(test)]
use mockall::automock;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Status read of an asynchronous task.
pub type TaskSnapshot = TaskResponse;

/// Request/response channel for asynchronous tasks.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Creates a task from `body` at `path` (relative to the HTTP base).
    async fn submit(&self, path: &str, body: Value) -> Result<TaskResponse>;

    async fn fetch(&self, task_id: &str) -> Result<TaskResponse>;

    async fn cancel(&self, task_id: &str) -> Result<TaskResponse>;
}

pub struct HttpTaskApi {
    config: Arc<Config>,
    http: reqwest::Client,
}

impl HttpTaskApi {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self { config, http })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.http_url(), path.trim_start_matches('/'));
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(self.config.api_key().expose_secret());
        if let Some(workspace) = self.config.workspace() {
            request = request.header(WORKSPACE_HEADER, workspace);
        }
        request
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(StatusCode, TaskResponse, String)> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        match serde_json::from_str::<TaskResponse>(&text) {
            Ok(body) => Ok((status, body, text)),
            // rejected requests sometimes come back without a JSON body
            Err(_) if !status.is_success() => Ok((status, TaskResponse::default(), text)),
            Err(e) => Err(Error::Protocol(format!("invalid task response: {}", e))),
        }
    }

    async fn exchange(
        &self,
        request: RequestBuilder,
        rejected: fn(ErrorDetails) -> Error,
    ) -> Result<TaskResponse> {
        let (status, body, text) = self.execute(request).await?;
        if !status.is_success() {
            return Err(rejected(rejection(status, &body, &text)));
        }
        if body.task_id().is_empty() {
            return Err(Error::Protocol("response carries no task id".to_string()));
        }
        Ok(body)
    }
}

fn rejection(status: StatusCode, body: &TaskResponse, text: &str) -> ErrorDetails {
    let code = body
        .code()
        .or(body.output().code())
        .unwrap_or(status.as_str());
    let message = body
        .message()
        .or(body.output().message())
        .unwrap_or(text);
    ErrorDetails::new(code, message)
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn submit(&self, path: &str, body: Value) -> Result<TaskResponse> {
        let request = self
            .request(Method::POST, path)
            .header(ASYNC_HEADER, "enable")
            .json(&body);
        self.exchange(request, Error::TaskSubmit).await
    }

    async fn fetch(&self, task_id: &str) -> Result<TaskResponse> {
        let request = self.request(Method::GET, &format!("tasks/{}", task_id));
        self.exchange(request, Error::Api).await
    }

    async fn cancel(&self, task_id: &str) -> Result<TaskResponse> {
        let request = self.request(Method::POST, &format!("tasks/{}/cancel", task_id));
        let (status, body, text) = self.execute(request).await?;
        if !status.is_success() {
            return Err(Error::Api(rejection(status, &body, &text)));
        }
        Ok(body)
    }
}

/// Poll intervals: starting at `initial`, doubled on every
/// `increment_every`-th poll, never above `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    poll: PollConfig,
    polls: u32,
    current: Duration,
}

impl Backoff {
    pub fn new(poll: PollConfig) -> Self {
        Self {
            poll,
            polls: 0,
            current: poll.initial.min(poll.max),
        }
    }

    /// Wait to apply after the next non-terminal poll.
    pub fn next_interval(&mut self) -> Duration {
        self.polls += 1;
        if self.poll.increment_every > 0 && self.polls % self.poll.increment_every == 0 {
            self.current = (self.current * 2).min(self.poll.max);
        }
        self.current
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_interval())
    }
}

/// Submits asynchronous tasks and waits for them to reach a final status.
/// Keeps nothing between polls.
pub struct TaskPoller<A = HttpTaskApi> {
    api: A,
    poll: PollConfig,
}

impl TaskPoller<HttpTaskApi> {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let poll = config.poll();
        Ok(Self {
            api: HttpTaskApi::new(config)?,
            poll,
        })
    }
}

impl<A: TaskApi> TaskPoller<A> {
    pub fn with_api(api: A, poll: PollConfig) -> Self {
        Self { api, poll }
    }

    /// Creates a task and returns its id.
    pub async fn submit(&self, path: &str, body: Value) -> Result<String> {
        let response = self.api.submit(path, body).await?;
        tracing::debug!("submitted task {} ({})", response.task_id(), response.status());
        Ok(response.task_id().to_string())
    }

    pub async fn get_status(&self, task_id: &str) -> Result<TaskSnapshot> {
        self.api.fetch(task_id).await
    }

    /// Polls until the task is final. Failed and canceled tasks are returned
    /// as snapshots; transport errors end the wait without retry.
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskSnapshot> {
        let mut backoff = Backoff::new(self.poll);
        let mut highest = 0;
        loop {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                snapshot = self.get_status(task_id) => snapshot?,
            };
            let status = snapshot.status();
            if status.rank() < highest {
                tracing::warn!("task {} went back to {}", task_id, status);
            }
            highest = highest.max(status.rank());
            if status.is_terminal() {
                tracing::debug!("task {} finished as {}", task_id, status);
                return Ok(snapshot);
            }

            let wait = backoff.next_interval();
            tracing::debug!("task {} is {}, next poll in {:?}", task_id, status, wait);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Asks the service to cancel a pending task.
    pub async fn cancel_task(&self, task_id: &str) -> Result<TaskSnapshot> {
        self.api.cancel(task_id).await
    }

    pub async fn submit_and_wait(
        &self,
        path: &str,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<TaskSnapshot> {
        let task_id = self.submit(path, body).await?;
        self.wait_for_completion(&task_id, cancel).await
    }
}

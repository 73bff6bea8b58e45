use crate::macros::open_enum;
use serde_json::Value;

open_enum! {
    /// `output.task_status` of an asynchronous task.
    pub enum TaskStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
        Canceled => "CANCELED",
        Unknown => "UNKNOWN",
        _ => Other,
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Unknown
    }
}

impl TaskStatus {
    /// Succeeded, Failed and Canceled are final; the task never changes again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    /// Position on the Pending -> Running -> terminal path. Statuses the
    /// client cannot place rank lowest.
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Unknown | TaskStatus::Other(_) => 0,
            TaskStatus::Pending => 1,
            TaskStatus::Running => 2,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    task_status: TaskStatus,
    /// Owned by the capability that submitted the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl TaskOutput {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn task_status(&self) -> &TaskStatus {
        &self.task_status
    }

    pub fn results(&self) -> Option<&Value> {
        self.results.as_ref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Body of both the submit response and `GET /tasks/{id}`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default)]
    output: TaskOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<Value>,
}

impl TaskResponse {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn output(&self) -> &TaskOutput {
        &self.output
    }

    pub fn usage(&self) -> Option<&Value> {
        self.usage.as_ref()
    }

    pub fn task_id(&self) -> &str {
        self.output.task_id()
    }

    pub fn status(&self) -> &TaskStatus {
        self.output.task_status()
    }

    pub fn results_as<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        match &self.output.results {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_task_resource() {
        let json = r#"{
            "request_id": "r-1",
            "output": {
                "task_id": "T1",
                "task_status": "SUCCEEDED",
                "results": [{"url": "https://example.com/a.png"}]
            },
            "usage": {"image_count": 1}
        }"#;
        let response: TaskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.task_id(), "T1");
        assert_eq!(response.status(), &TaskStatus::Succeeded);
        assert!(response.status().is_terminal());

        #[derive(serde::Deserialize)]
        struct Image {
            url: String,
        }
        let images: Vec<Image> = response.results_as().unwrap().unwrap();
        assert_eq!(images[0].url, "https://example.com/a.png");
    }

    #[test]
    fn unlisted_status_is_kept_and_not_terminal() {
        let status: TaskStatus = serde_json::from_str(r#""SUSPENDED""#).unwrap();
        assert_eq!(status, TaskStatus::Other("SUSPENDED".to_string()));
        assert!(!status.is_terminal());
        assert_eq!(status.rank(), 0);
    }

    #[test]
    fn missing_output_defaults_to_unknown() {
        let response: TaskResponse =
            serde_json::from_str(r#"{"request_id":"r","code":"InvalidApiKey","message":"no"}"#).unwrap();
        assert_eq!(response.status(), &TaskStatus::Unknown);
        assert_eq!(response.task_id(), "");
        assert_eq!(response.code(), Some("InvalidApiKey"));
    }
}

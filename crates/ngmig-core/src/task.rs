//! Persisted record of an asynchronous discovery or import task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state: `Processing` moves exactly once to `Done` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Processing,
    Done,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Done => "DONE",
            TaskStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "PROCESSING" => Some(TaskStatus::Processing),
            "DONE" => Some(TaskStatus::Done),
            "ERROR" => Some(TaskStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

/// What kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRequestType {
    Discovery,
    Import,
}

impl TaskRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskRequestType::Discovery => "DISCOVERY",
            TaskRequestType::Import => "IMPORT",
        }
    }

    pub fn parse(s: &str) -> Option<TaskRequestType> {
        match s {
            "DISCOVERY" => Some(TaskRequestType::Discovery),
            "IMPORT" => Some(TaskRequestType::Import),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncTaskRecord {
    pub id: String,
    pub account_id: String,
    pub request_type: TaskRequestType,
    pub status: TaskStatus,
    pub request_payload: serde_json::Value,
    #[serde(default)]
    pub response_payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AsyncTaskRecord {
    /// A fresh `Processing` record.
    pub fn processing(
        id: impl Into<String>,
        account_id: impl Into<String>,
        request_type: TaskRequestType,
        request_payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        AsyncTaskRecord {
            id: id.into(),
            account_id: account_id.into(),
            request_type,
            status: TaskStatus::Processing,
            request_payload,
            response_payload: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_done(&mut self, response: serde_json::Value) {
        self.status = TaskStatus::Done;
        self.response_payload = Some(response);
        self.updated_at = Utc::now();
    }

    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = TaskStatus::Error;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_transitions() {
        let mut rec = AsyncTaskRecord::processing(
            "t1",
            "acc",
            TaskRequestType::Import,
            serde_json::json!({}),
        );
        assert!(!rec.status.is_terminal());
        rec.mark_error("boom");
        assert_eq!(rec.status, TaskStatus::Error);
        assert_eq!(rec.error_message.as_deref(), Some("boom"));
        assert!(rec.status.is_terminal());
    }

    #[test]
    fn status_text_roundtrip() {
        for s in [TaskStatus::Processing, TaskStatus::Done, TaskStatus::Error] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(
            TaskRequestType::parse("DISCOVERY"),
            Some(TaskRequestType::Discovery)
        );
    }
}

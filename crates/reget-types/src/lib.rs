//! Shared types for reget
//!
//! The task record and its status enum, used by the core engine and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One download: identity, target and persisted progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned id, unique and strictly increasing.
    pub id: i64,
    pub url: String,
    pub target: PathBuf,
    pub status: TaskStatus,
    /// Bytes durably written for this task. Never regresses once the task
    /// leaves `New`.
    pub last_byte: i64,
    /// Server-reported total size, -1 while unknown.
    pub total_bytes: i64,
}

impl Task {
    /// Fraction downloaded, or `None` while the total is unknown.
    pub fn progress(&self) -> Option<f64> {
        if self.total_bytes > 0 {
            Some(self.last_byte as f64 / self.total_bytes as f64)
        } else {
            None
        }
    }
}

/// Status of a task.
///
/// Tasks are created `New` and resumed immediately, so `New` is only
/// transiently observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    New,
    Running,
    Paused,
    Completed,
    Error,
}

impl TaskStatus {
    /// The uppercase form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Paused => "PAUSED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Error => "ERROR",
        }
    }

    /// Parse the stored form back. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Some(TaskStatus::New),
            "RUNNING" => Some(TaskStatus::Running),
            "PAUSED" => Some(TaskStatus::Paused),
            "COMPLETED" => Some(TaskStatus::Completed),
            "ERROR" => Some(TaskStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

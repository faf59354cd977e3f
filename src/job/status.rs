use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job, as reported by the remote platform.
///
/// The platform owns the value; this crate only reads it. Statuses the
/// platform may add later land in [`JobStatus::Unknown`] and are treated as
/// non-final.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    New,
    Pending,
    Waiting,
    Running,
    Successful,
    Failed,
    Error,
    Canceled,
    Unknown(String),
}

impl JobStatus {
    pub const NON_FINAL: [JobStatus; 4] = [
        JobStatus::New,
        JobStatus::Pending,
        JobStatus::Waiting,
        JobStatus::Running,
    ];

    pub const FINAL: [JobStatus; 4] = [
        JobStatus::Successful,
        JobStatus::Failed,
        JobStatus::Error,
        JobStatus::Canceled,
    ];

    /// A final status is terminal: the job will never move again.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            JobStatus::Successful | JobStatus::Failed | JobStatus::Error | JobStatus::Canceled
        )
    }

    pub fn is_successful(&self) -> bool {
        *self == JobStatus::Successful
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::New => "new",
            JobStatus::Pending => "pending",
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Successful => "successful",
            JobStatus::Failed => "failed",
            JobStatus::Error => "error",
            JobStatus::Canceled => "canceled",
            JobStatus::Unknown(other) => other,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        match value {
            "new" => JobStatus::New,
            "pending" => JobStatus::Pending,
            "waiting" => JobStatus::Waiting,
            "running" => JobStatus::Running,
            "successful" => JobStatus::Successful,
            "failed" => JobStatus::Failed,
            "error" => JobStatus::Error,
            "canceled" => JobStatus::Canceled,
            other => JobStatus::Unknown(other.to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        JobStatus::from(value.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

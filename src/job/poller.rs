use serde::Deserialize;
use tracing::debug;

use super::status::JobStatus;
use crate::client::JobClient;
use crate::error::RetryError;
use crate::retry::Attempt;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: Option<String>,
}

/// Per-attempt logic for waiting on a remote job.
///
/// Each [`attempt`](Attempt::attempt) performs one GET on the job URL:
/// - a fetch that comes back with diagnostics is retryable and leaves the
///   recorded status untouched
/// - a body that is not JSON or lacks `status` is fatal
/// - otherwise the status is recorded, reported to the progress callback,
///   and the attempt succeeds once it is final
///
/// Feed it to a [`RetryLoop`](crate::retry::RetryLoop) or
/// [`retry_context`](crate::retry::retry_context) for the scheduling, then read
/// [`status`](JobPoller::status) for the last value seen, even on failure.
pub struct JobPoller<'a, C, P> {
    client: &'a C,
    progress: P,
    job_url: String,
    subject: String,
    status: Option<JobStatus>,
    attempts: u32,
}

/// Build a [`JobPoller`] for `job_url` that calls `progress` with every
/// status it observes.
pub fn poll_until_final<'a, C, P>(
    client: &'a C,
    progress: P,
    job_url: impl Into<String>,
) -> JobPoller<'a, C, P>
where
    C: JobClient,
    P: FnMut(&JobStatus),
{
    JobPoller {
        client,
        progress,
        job_url: job_url.into(),
        subject: "AAP job".to_string(),
        status: None,
        attempts: 0,
    }
}

impl<'a, C, P> JobPoller<'a, C, P>
where
    C: JobClient,
    P: FnMut(&JobStatus),
{
    /// Name used in "hasn't yet reached a final state" errors.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn job_url(&self) -> &str {
        &self.job_url
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Last status successfully parsed, `None` until one was.
    pub fn status(&self) -> Option<&JobStatus> {
        self.status.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<C, P> Attempt for JobPoller<'_, C, P>
where
    C: JobClient,
    P: FnMut(&JobStatus),
{
    type Output = JobStatus;

    async fn attempt(&mut self) -> Result<JobStatus, RetryError> {
        self.attempts += 1;
        let body = self
            .client
            .get(&self.job_url)
            .await
            .map_err(RetryError::from_diagnostics)?;

        let status = parse_status(&body)?;
        debug!(url = %self.job_url, attempt = self.attempts, %status, "job status observed");
        self.status = Some(status.clone());
        (self.progress)(&status);

        if status.is_final() {
            Ok(status)
        } else {
            Err(RetryError::NotFinal {
                subject: self.subject.clone(),
            })
        }
    }
}

fn parse_status(body: &[u8]) -> Result<JobStatus, RetryError> {
    let response: StatusResponse = serde_json::from_slice(body)
        .map_err(|e| RetryError::Parse(format!("could not parse job status response: {e}")))?;
    response
        .status
        .map(JobStatus::from)
        .ok_or_else(|| RetryError::Parse("job status response has no 'status' field".into()))
}

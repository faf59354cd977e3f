use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{AapClient, JobClient, JobLaunchRequest, JobSummary, parse_json};
use crate::context::Context;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::job::{JobStatus, poll_until_final};
use crate::retry::{DEFAULT_SUCCESS_STATUS_CODES, RetryConfig, RetryPolicy, retry_context};

/// Outcome of waiting for a job, kept even when the wait failed.
#[derive(Debug, Clone, Serialize)]
pub struct WaitReport {
    pub job_url: String,
    /// Last status observed, `None` if no poll ever parsed one.
    pub status: Option<JobStatus>,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub diagnostics: Diagnostics,
}

impl WaitReport {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_error()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// Launch a job template and return the job the platform created.
pub async fn launch_job(
    client: &AapClient,
    template_id: i64,
    request: &JobLaunchRequest,
) -> Result<JobSummary, Diagnostics> {
    let body = serde_json::to_value(request).map_err(|e| {
        Diagnostics::from(Diagnostic::error(
            "Error marshaling request body",
            format!("Could not create launch request for job template {template_id}: {e}"),
        ))
    })?;

    let path = format!("job_templates/{template_id}/launch/");
    let result = client.post_with_status(&path, &body, &[201]).await;
    if result.diagnostics.has_error() {
        return Err(result.diagnostics);
    }

    let job: JobSummary = parse_json(&result.body)?;
    info!(template_id, job_id = job.id, url = %job.url, "job launched");
    Ok(job)
}

/// Poll `job_url` until the job reaches a final status or `timeout` runs out.
///
/// Never fails outright: problems are recorded in the report's diagnostics.
/// A final status other than `successful` is an error, or only a warning
/// when `ignore_job_results` is set.
pub async fn wait_for_job<C, P>(
    ctx: &Context,
    client: &C,
    job_url: &str,
    timeout: Duration,
    progress: P,
    ignore_job_results: bool,
) -> WaitReport
where
    C: JobClient,
    P: FnMut(&JobStatus),
{
    let started_at = Utc::now();
    let mut poller = poll_until_final(client, progress, job_url);
    let outcome = retry_context(ctx, timeout, &mut poller).await;

    let mut diagnostics = Diagnostics::new();
    match &outcome {
        Err(err) => {
            warn!(url = job_url, error = %err, "gave up waiting for job");
            diagnostics.append(Diagnostics::from_error(
                "error when waiting for AAP job to complete",
                err,
            ));
        }
        Ok(status) if !status.is_successful() => {
            let summary = format!("AAP job {status}");
            let detail = format!("API Path: {job_url}");
            if ignore_job_results {
                diagnostics.add_warning(summary, detail);
            } else {
                diagnostics.add_error(summary, detail);
            }
        }
        Ok(status) => info!(url = job_url, %status, "job finished"),
    }

    WaitReport {
        job_url: job_url.to_string(),
        status: poller.status().cloned(),
        attempts: poller.attempts(),
        started_at,
        completed_at: Utc::now(),
        diagnostics,
    }
}

/// Delete a host, retrying while the platform reports it busy (409 while
/// jobs still use it, or transient 5xx).
pub async fn delete_host(
    ctx: &Context,
    client: &AapClient,
    host_id: i64,
    policy: &RetryPolicy,
) -> Result<(), Diagnostics> {
    let path = format!("hosts/{host_id}/");
    let path = path.as_str();
    let operation = move || client.delete_with_status(path, &DEFAULT_SUCCESS_STATUS_CODES);

    let deleted = match RetryConfig::from_policy(
        ctx,
        "delete host",
        operation,
        &DEFAULT_SUCCESS_STATUS_CODES,
        policy,
    ) {
        Ok(mut config) => {
            let timeout = config.timeout();
            config
                .wait_for_completion(ctx)
                .await
                .map_err(|err| (timeout, err))
        }
        Err(err) => Err((Duration::ZERO, err)),
    };

    deleted.map(|_| ()).map_err(|(timeout, err)| {
        Diagnostics::from(Diagnostic::error(
            "Error deleting host",
            format!("Failed to delete host after timeout ({timeout:?}): {err}"),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Auth;
    use crate::diagnostics::Severity;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JOB_PATH: &str = "/api/controller/v2/jobs/789/";

    fn client_for(server: &MockServer) -> AapClient {
        AapClient::new(
            &server.uri(),
            Auth::Bearer("t0ken".into()),
            false,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn status_body(status: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(format!(r#"{{"id": 789, "status": "{status}"}}"#))
    }

    async fn mount_statuses(server: &MockServer, statuses: &[&str]) {
        let (last, leading) = statuses.split_last().unwrap();
        for status in leading {
            Mock::given(method("GET"))
                .and(path(JOB_PATH))
                .respond_with(status_body(status))
                .up_to_n_times(1)
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(JOB_PATH))
            .respond_with(status_body(last))
            .mount(server)
            .await;
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(10),
            retry_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn launch_returns_created_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/controller/v2/job_templates/7/launch/"))
            .respond_with(ResponseTemplate::new(201).set_body_string(
                r#"{"id": 789, "url": "/api/controller/v2/jobs/789/", "status": "pending", "job": 789}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let job = launch_job(&client_for(&server), 7, &JobLaunchRequest::default())
            .await
            .unwrap();
        assert_eq!(job.id, 789);
        assert_eq!(job.url, JOB_PATH);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn launch_surfaces_rejection_and_bad_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/controller/v2/job_templates/8/launch/"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"inventory":["required"]}"#))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/controller/v2/job_templates/9/launch/"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;
        let client = client_for(&server);

        let rejected = launch_job(&client, 8, &JobLaunchRequest::default()).await.unwrap_err();
        assert!(rejected.to_string().contains("got (400)"));

        let garbled = launch_job(&client, 9, &JobLaunchRequest::default()).await.unwrap_err();
        assert!(garbled.to_string().contains("Error parsing JSON response from AAP"));
    }

    #[tokio::test]
    async fn wait_reports_success_and_progress() {
        let server = MockServer::start().await;
        mount_statuses(&server, &["pending", "running", "successful"]).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let report = wait_for_job(
            &Context::background(),
            &client_for(&server),
            JOB_PATH,
            Duration::from_secs(20),
            move |s: &JobStatus| sink.lock().unwrap().push(s.clone()),
            false,
        )
        .await;

        assert!(report.is_success(), "{}", report.diagnostics);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.status, Some(JobStatus::Successful));
        assert_eq!(report.attempts, 3);
        assert!(report.completed_at >= report.started_at);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![JobStatus::Pending, JobStatus::Running, JobStatus::Successful]
        );
    }

    #[tokio::test]
    async fn failed_job_is_error_unless_ignored() {
        for (ignore, severity) in [(false, Severity::Error), (true, Severity::Warning)] {
            let server = MockServer::start().await;
            mount_statuses(&server, &["failed"]).await;

            let report = wait_for_job(
                &Context::background(),
                &client_for(&server),
                JOB_PATH,
                Duration::from_secs(5),
                |_: &JobStatus| {},
                ignore,
            )
            .await;

            assert_eq!(report.status, Some(JobStatus::Failed));
            assert_eq!(report.diagnostics.len(), 1);
            let diag = report.diagnostics.iter().next().unwrap();
            assert_eq!(diag.severity, severity);
            assert_eq!(diag.summary, "AAP job failed");
            assert_eq!(diag.detail, format!("API Path: {JOB_PATH}"));
            assert_eq!(report.is_success(), ignore);
        }
    }

    #[tokio::test]
    async fn fetch_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JOB_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_statuses(&server, &["successful"]).await;

        let report = wait_for_job(
            &Context::background(),
            &client_for(&server),
            JOB_PATH,
            Duration::from_secs(20),
            |_: &JobStatus| {},
            false,
        )
        .await;
        assert!(report.is_success(), "{}", report.diagnostics);
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn wait_timeout_keeps_last_status() {
        let server = MockServer::start().await;
        mount_statuses(&server, &["running"]).await;

        let report = wait_for_job(
            &Context::background(),
            &client_for(&server),
            JOB_PATH,
            Duration::from_secs(1),
            |_: &JobStatus| {},
            true,
        )
        .await;

        assert!(!report.is_success());
        assert_eq!(report.status, Some(JobStatus::Running));
        let diag = report.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "error when waiting for AAP job to complete");
        assert!(diag.detail.contains("hasn't yet reached a final state"));
    }

    #[tokio::test]
    async fn cancelling_the_context_stops_the_wait() {
        let server = MockServer::start().await;
        mount_statuses(&server, &["running"]).await;

        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let report = wait_for_job(
            &ctx,
            &client_for(&server),
            JOB_PATH,
            Duration::from_secs(30),
            |_: &JobStatus| {},
            false,
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!report.is_success());
        assert_eq!(report.status, Some(JobStatus::Running));
        let diag = report.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "error when waiting for AAP job to complete");
        assert!(diag.detail.contains("was cancelled"), "{}", diag.detail);
    }

    #[tokio::test]
    async fn delete_host_retries_conflicts() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/controller/v2/hosts/42/"))
            .respond_with(ResponseTemplate::new(409))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/controller/v2/hosts/42/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = delete_host(&Context::background(), &client_for(&server), 42, &fast_policy()).await;
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[tokio::test]
    async fn delete_host_stops_on_fatal_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/controller/v2/hosts/43/"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let diags = delete_host(&Context::background(), &client_for(&server), 43, &fast_policy())
            .await
            .unwrap_err();
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Error deleting host");
        assert!(diag.detail.contains("non-retryable HTTP status 403 for delete host"));
    }

    #[tokio::test]
    async fn report_serializes_for_scripting() {
        let now = Utc::now();
        let report = WaitReport {
            job_url: JOB_PATH.into(),
            status: Some(JobStatus::Canceled),
            attempts: 4,
            started_at: now,
            completed_at: now,
            diagnostics: Diagnostics::new(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "canceled");
        assert_eq!(json["attempts"], 4);
        assert_eq!(report.elapsed(), chrono::Duration::zero());
    }
}

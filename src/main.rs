mod cli;
mod ui;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::Style;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use aap_waiter::actions::{delete_host, launch_job, wait_for_job};
use aap_waiter::client::{AapClient, JobLaunchRequest};
use aap_waiter::config::AapConfig;
use aap_waiter::context::Context;
use aap_waiter::job::JobStatus;
use cli::{Cli, Command};
use ui::JobProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {err:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "aap_waiter=debug" } else { "aap_waiter=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns whether the command succeeded; `Err` is reserved for setup failures.
async fn run(cli: Cli) -> Result<bool> {
    let config = AapConfig::load(&cli.config)?;
    config.validate()?;
    let policy = config.retry_policy()?;
    let client = AapClient::from_config(&config)?;

    let root = Context::background();
    let canceller = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            canceller.cancel();
        }
    });

    match cli.command {
        Command::Launch {
            template_id,
            wait,
            timeout,
            ignore_job_results,
            extra_vars,
            inventory,
            limit,
        } => {
            let request = JobLaunchRequest {
                extra_vars,
                inventory,
                limit,
            };
            let job = match launch_job(&client, template_id, &request).await {
                Ok(job) => job,
                Err(diagnostics) => {
                    ui::print_diagnostics(&diagnostics);
                    return Ok(false);
                }
            };
            ui::print_job(&job);
            if !wait {
                return Ok(true);
            }
            let timeout = timeout.map_or_else(|| config.wait_for_completion_timeout(), Duration::from_secs);
            Ok(wait_and_report(&root, &client, &job.url, timeout, ignore_job_results).await)
        }
        Command::Wait {
            job_url,
            timeout,
            ignore_job_results,
        } => {
            let timeout = timeout.map_or_else(|| config.wait_for_completion_timeout(), Duration::from_secs);
            Ok(wait_and_report(&root, &client, &job_url, timeout, ignore_job_results).await)
        }
        Command::DeleteHost { host_id, timeout } => {
            let ctx = match timeout {
                Some(secs) => root.with_timeout(Duration::from_secs(secs)),
                None => root.clone(),
            };
            let progress = JobProgress::start(&format!("Deleting host {host_id}"));
            match delete_host(&ctx, &client, host_id, &policy).await {
                Ok(()) => {
                    progress.success(&format!("Host {host_id} deleted"));
                    Ok(true)
                }
                Err(diagnostics) => {
                    progress.failure(&format!("Host {host_id} was not deleted"), &diagnostics);
                    Ok(false)
                }
            }
        }
    }
}

async fn wait_and_report(
    ctx: &Context,
    client: &AapClient,
    job_url: &str,
    timeout: Duration,
    ignore_job_results: bool,
) -> bool {
    let progress = JobProgress::start(&format!("Waiting for job at {job_url}"));
    let report = wait_for_job(
        ctx,
        client,
        job_url,
        timeout,
        |status: &JobStatus| progress.update_status(job_url, status),
        ignore_job_results,
    )
    .await;
    progress.complete(&report);
    report.is_success()
}

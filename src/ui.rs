//! Interface de terminal do aap-waiter: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente a espera
//! por um job ou por uma operação com retentativas.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use aap_waiter::actions::WaitReport;
use aap_waiter::client::JobSummary;
use aap_waiter::diagnostics::Diagnostics;
use aap_waiter::job::JobStatus;

/// Indicador visual de progresso no terminal.
///
/// Exibe um spinner animado durante a espera e mensagens coloridas para
/// sucesso (verde), erro (vermelho) e aviso (amarelo).
pub struct JobProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com a mensagem inicial.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner com o status mais recente do job.
    pub fn update_status(&self, job_url: &str, status: &JobStatus) {
        self.pb.set_message(status_message(job_url, status));
    }

    /// Finaliza o spinner e exibe o relatório da espera.
    pub fn complete(&self, report: &WaitReport) {
        self.pb.finish_and_clear();
        let status = report
            .status
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        let elapsed = report.elapsed().num_milliseconds() as f64 / 1000.0;
        let style = match &report.status {
            Some(JobStatus::Successful) => &self.green,
            Some(s) if s.is_final() => &self.red,
            _ => &self.yellow,
        };
        println!(
            "  {} Job {} finished as {} after {} polls ({elapsed:.1}s)",
            style.apply_to("●"),
            report.job_url,
            style.apply_to(status),
            report.attempts,
        );
        print_diagnostics(&report.diagnostics);
    }

    /// Mensagem final de sucesso para operações sem relatório.
    pub fn success(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    /// Mensagem final de falha, seguida dos diagnósticos.
    pub fn failure(&self, message: &str, diagnostics: &Diagnostics) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.red.apply_to("✗"));
        print_diagnostics(diagnostics);
    }
}

/// Texto exibido a cada status observado.
pub fn status_message(job_url: &str, status: &JobStatus) -> String {
    format!("Job at: {job_url} is in status: {status}")
}

/// Imprime o job recém-criado.
pub fn print_job(job: &JobSummary) {
    let cyan = Style::new().cyan();
    println!(
        "  {} Launched job {} ({}) status: {}",
        cyan.apply_to("→"),
        job.id,
        job.url,
        job.status
    );
}

/// Imprime diagnósticos em stderr: erros em vermelho, avisos em amarelo.
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow().bold();
    for diag in diagnostics.iter() {
        let label = if diag.is_error() {
            red.apply_to("error:")
        } else {
            yellow.apply_to("warning:")
        };
        eprintln!("  {label} {}", diag.summary);
        if !diag.detail.is_empty() {
            eprintln!("         {}", diag.detail);
        }
    }
}

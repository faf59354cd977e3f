//! Interface de linha de comando do aap-waiter baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (launch, wait,
//! delete-host) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use aap_waiter::config::DEFAULT_CONFIG_FILE;

/// aap-waiter: dispara jobs no Ansible Automation Platform e espera por eles.
#[derive(Debug, Parser)]
#[command(name = "aap-waiter", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Habilita saída detalhada (logs em nível debug).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Dispara um job template e, opcionalmente, espera o job terminar.
    Launch {
        /// Identificador do job template.
        template_id: i64,

        /// Espera o job chegar a um estado final.
        #[arg(long, default_value_t = false)]
        wait: bool,

        /// Tempo máximo de espera em segundos (padrão: valor do arquivo).
        #[arg(long)]
        timeout: Option<u64>,

        /// Rebaixa um resultado diferente de `successful` para aviso.
        #[arg(long, default_value_t = false)]
        ignore_job_results: bool,

        /// Variáveis extras como objeto JSON.
        #[arg(long, value_parser = parse_extra_vars)]
        extra_vars: Option<serde_json::Value>,

        /// Inventário a usar no lugar do definido no template.
        #[arg(long)]
        inventory: Option<i64>,

        /// Padrão de hosts que restringe a execução.
        #[arg(long)]
        limit: Option<String>,
    },

    /// Espera um job já existente chegar a um estado final.
    Wait {
        /// Caminho da API do job (ex.: /api/controller/v2/jobs/789/).
        job_url: String,

        /// Tempo máximo de espera em segundos.
        #[arg(long)]
        timeout: Option<u64>,

        /// Rebaixa um resultado diferente de `successful` para aviso.
        #[arg(long, default_value_t = false)]
        ignore_job_results: bool,
    },

    /// Remove um host, retentando enquanto ele estiver em uso.
    DeleteHost {
        /// Identificador do host.
        host_id: i64,

        /// Prazo total da operação em segundos.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

// Aceita apenas objetos JSON, como o endpoint de launch exige.
fn parse_extra_vars(raw: &str) -> Result<serde_json::Value, String> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("extra vars must be a JSON object".to_string())
    }
}

//! Configuração do aap-waiter carregada a partir de `aap.toml`.
//!
//! A struct [`AapConfig`] contém a conexão com o AAP e a tabela `[retry]`
//! com os tempos do motor de retentativas. Valores não presentes no arquivo
//! usam defaults sensíveis. As variáveis de ambiente `AAP_*` têm precedência
//! sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::client::Auth;
use crate::retry::RetryPolicy;

/// Arquivo lido quando `--config` não é informado.
pub const DEFAULT_CONFIG_FILE: &str = "aap.toml";

/// Configuração de nível superior carregada de `aap.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AapConfig {
    /// URL base do AAP (ex.: `https://aap.example.com`).
    #[serde(default)]
    pub host: String,

    /// Usuário para autenticação básica.
    #[serde(default)]
    pub username: Option<String>,

    /// Senha para autenticação básica.
    #[serde(default)]
    pub password: Option<String>,

    /// Token OAuth; quando presente, usuário e senha são ignorados.
    #[serde(default)]
    pub token: Option<String>,

    /// Desliga a verificação do certificado TLS do servidor.
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Timeout de cada requisição HTTP, em segundos.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Prefixo da API usado para caminhos relativos.
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Tempo máximo de espera pelo término de um job, em segundos.
    #[serde(default = "default_wait_for_completion_timeout_secs")]
    pub wait_for_completion_timeout_secs: u64,

    /// Tempos do motor de retentativas.
    #[serde(default)]
    pub retry: RetrySettings,
}

// Valor padrão para o timeout HTTP: 5 segundos.
fn default_timeout_secs() -> u64 {
    5
}

// Prefixo padrão da API do controller.
fn default_api_path() -> String {
    "api/controller/v2".to_string()
}

// Valor padrão para a espera por jobs: 120 segundos.
fn default_wait_for_completion_timeout_secs() -> u64 {
    120
}

/// Tabela `[retry]`, em segundos, convertida em [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub min_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub safety_factor: f64,
    pub initial_delay_secs: u64,
    pub retry_interval_secs: u64,
    pub max_interval_secs: u64,
    pub jitter_threshold_secs: u64,
    pub max_jitter_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            min_timeout_secs: policy.min_timeout.as_secs(),
            max_timeout_secs: policy.max_timeout.as_secs(),
            safety_factor: policy.safety_factor,
            initial_delay_secs: policy.initial_delay.as_secs(),
            retry_interval_secs: policy.retry_interval.as_secs(),
            max_interval_secs: policy.max_interval.as_secs(),
            jitter_threshold_secs: policy.jitter_threshold.as_secs(),
            max_jitter_secs: policy.max_jitter.as_secs(),
        }
    }
}

impl RetrySettings {
    /// Converte para [`RetryPolicy`], validando os limites.
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let policy = RetryPolicy {
            min_timeout: Duration::from_secs(self.min_timeout_secs),
            max_timeout: Duration::from_secs(self.max_timeout_secs),
            safety_factor: self.safety_factor,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            max_interval: Duration::from_secs(self.max_interval_secs),
            jitter_threshold: Duration::from_secs(self.jitter_threshold_secs),
            max_jitter: Duration::from_secs(self.max_jitter_secs),
        };
        policy.validate().context("invalid [retry] settings")?;
        Ok(policy)
    }
}

impl Default for AapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: None,
            password: None,
            token: None,
            insecure_skip_verify: false,
            timeout_secs: default_timeout_secs(),
            api_path: default_api_path(),
            wait_for_completion_timeout_secs: default_wait_for_completion_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl AapConfig {
    /// Carrega a configuração de `path` e aplica as variáveis de ambiente.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Lê apenas o arquivo, sem olhar o ambiente.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str::<AapConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Sobrepõe os campos com as variáveis `AAP_*` devolvidas por `lookup`.
    /// Variáveis vazias são ignoradas.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        // AAP_HOST é o nome antigo, mantido como alternativa.
        if let Some(host) = var("AAP_HOSTNAME").or_else(|| var("AAP_HOST")) {
            self.host = host;
        }
        if let Some(token) = var("AAP_TOKEN") {
            self.token = Some(token);
        }
        if let Some(username) = var("AAP_USERNAME") {
            self.username = Some(username);
        }
        if let Some(password) = var("AAP_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(raw) = var("AAP_INSECURE_SKIP_VERIFY") {
            self.insecure_skip_verify = raw
                .trim()
                .parse()
                .with_context(|| format!("AAP_INSECURE_SKIP_VERIFY must be true or false, got '{raw}'"))?;
        }
        if let Some(raw) = var("AAP_TIMEOUT") {
            self.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("AAP_TIMEOUT must be a whole number of seconds, got '{raw}'"))?;
        }
        Ok(())
    }

    /// Verifica que há host e credenciais suficientes para conectar.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("AAP host is not set: add 'host' to the config file or set AAP_HOSTNAME");
        }
        if self.token.is_none() && (self.username.is_none() || self.password.is_none()) {
            bail!("AAP credentials are not set: provide a token or both username and password");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Autenticação efetiva: o token vence usuário e senha.
    pub fn auth(&self) -> Auth {
        match (&self.token, &self.username, &self.password) {
            (Some(token), _, _) => Auth::Bearer(token.clone()),
            (None, Some(username), Some(password)) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::None,
        }
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        self.retry.to_policy()
    }

    pub fn wait_for_completion_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_for_completion_timeout_secs)
    }
}

//! Tipos de dados trocados com a API do AAP.
//!
//! Todas as structs derivam `Serialize` e `Deserialize`; os campos opcionais
//! são omitidos do JSON quando ausentes, como o endpoint de launch espera.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::job::JobStatus;

/// Corpo da requisição para `job_templates/<id>/launch/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobLaunchRequest {
    /// Variáveis extras repassadas ao playbook (objeto JSON).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_vars: Option<serde_json::Value>,
    /// Inventário a usar no lugar do definido no template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<i64>,
    /// Padrão de hosts que restringe a execução.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

/// Resumo de um job como devolvido pelo launch e pelo detalhe do job.
///
/// Campos extras da resposta são ignorados.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Identificador numérico do job.
    pub id: i64,
    /// Caminho da API para o detalhe do job (ex.: `/api/controller/v2/jobs/789/`).
    pub url: String,
    /// Status no momento da resposta.
    pub status: JobStatus,
}

/// Decodifica um corpo JSON, convertendo falhas em um diagnóstico de erro.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, Diagnostics> {
    serde_json::from_slice(body).map_err(|e| {
        let mut diags = Diagnostics::new();
        diags.add_error(
            "Error parsing JSON response from AAP",
            format!("Unable to parse the response body: {e}"),
        );
        diags
    })
}

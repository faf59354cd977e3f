//! Cliente HTTP para a API do Ansible Automation Platform (AAP).
//!
//! [`AapClient`] encapsula o `reqwest::Client`, a autenticação (básica ou
//! token) e a montagem das URLs. O trait [`JobClient`] é a única coisa que o
//! poller de jobs precisa, o que permite substituí-lo por mocks nos testes.

pub mod http;
pub mod types;

use std::future::Future;

use crate::diagnostics::Diagnostics;

pub use http::{AapClient, Auth, validate_response};
pub use types::{JobLaunchRequest, JobSummary, parse_json};

/// Busca o estado de um job remoto.
///
/// `get` devolve o corpo da resposta quando o servidor responde 200; qualquer
/// outra coisa (status inesperado, falha de transporte) vem como
/// [`Diagnostics`] com pelo menos um erro.
pub trait JobClient {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, Diagnostics>>;
}

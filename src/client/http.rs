use std::fmt;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Url};
use tracing::debug;

use super::JobClient;
use crate::config::AapConfig;
use crate::diagnostics::Diagnostics;
use crate::error::ClientError;
use crate::retry::OperationResult;

const DEFAULT_API_PATH: &str = "api/controller/v2";

/// How requests authenticate against the controller.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => write!(f, "None"),
            Auth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            Auth::Bearer(_) => write!(f, "Bearer(***)"),
        }
    }
}

#[derive(Debug)]
pub struct AapClient {
    host_url: String,
    api_path: String,
    auth: Auth,
    http: Client,
}

impl AapClient {
    pub fn new(
        host: &str,
        auth: Auth,
        insecure_skip_verify: bool,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let parsed = Url::parse(host).map_err(|e| ClientError::InvalidUrl {
            url: host.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl {
                url: host.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let http = Client::builder()
            .danger_accept_invalid_certs(insecure_skip_verify)
            .timeout(timeout)
            .build()?;

        let mut host_url = host.trim_end_matches('/').to_string();
        host_url.push('/');
        Ok(Self {
            host_url,
            api_path: DEFAULT_API_PATH.to_string(),
            auth,
            http,
        })
    }

    pub fn from_config(config: &AapConfig) -> Result<Self, ClientError> {
        let client = Self::new(
            &config.host,
            config.auth(),
            config.insecure_skip_verify,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(client.with_api_path(&config.api_path))
    }

    /// Prefix for relative paths, e.g. `api/v2` on older controllers.
    pub fn with_api_path(mut self, api_path: &str) -> Self {
        self.api_path = api_path.trim_matches('/').to_string();
        self
    }

    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    /// Full URL for `path`.
    ///
    /// Absolute URLs are used as-is, paths starting with `/` are resolved
    /// against the host, and anything else is relative to the API prefix.
    /// The result always ends with `/` unless it carries a query string.
    pub fn compute_url(&self, path: &str) -> String {
        let mut url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if let Some(rest) = path.strip_prefix('/') {
            format!("{}{rest}", self.host_url)
        } else if self.api_path.is_empty() {
            format!("{}{path}", self.host_url)
        } else {
            format!("{}{}/{path}", self.host_url, self.api_path)
        };
        if !url.ends_with('/') && !url.contains('?') {
            url.push('/');
        }
        url
    }

    /// Send one request and return the raw status and body.
    pub async fn do_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(u16, Vec<u8>), ClientError> {
        let url = self.compute_url(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");
        request = match &self.auth {
            Auth::None => request,
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Bearer(token) => request.bearer_auth(token),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        debug!(%method, %url, status, "AAP request completed");
        Ok((status, bytes.to_vec()))
    }

    /// GET `path`, expecting 200.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>, Diagnostics> {
        let result = self.request_with_status(Method::GET, path, None, &[200]).await;
        if result.diagnostics.has_error() {
            Err(result.diagnostics)
        } else {
            Ok(result.body)
        }
    }

    pub async fn get_with_status(&self, path: &str, expected: &[u16]) -> OperationResult {
        self.request_with_status(Method::GET, path, None, expected).await
    }

    pub async fn post_with_status(
        &self,
        path: &str,
        body: &serde_json::Value,
        expected: &[u16],
    ) -> OperationResult {
        self.request_with_status(Method::POST, path, Some(body), expected)
            .await
    }

    pub async fn delete_with_status(&self, path: &str, expected: &[u16]) -> OperationResult {
        self.request_with_status(Method::DELETE, path, None, expected)
            .await
    }

    /// Transport failures come back with status 0 and a
    /// "Client request error" diagnostic.
    async fn request_with_status(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        expected: &[u16],
    ) -> OperationResult {
        match self.do_request(method.clone(), path, body).await {
            Ok((status, body)) => {
                let diagnostics =
                    validate_response(&method, &self.compute_url(path), status, &body, expected);
                OperationResult::new(body, diagnostics, status)
            }
            Err(err) => {
                let mut diagnostics = Diagnostics::new();
                diagnostics.add_error("Client request error", err.to_string());
                OperationResult::new(Vec::new(), diagnostics, 0)
            }
        }
    }
}

impl JobClient for AapClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, Diagnostics> {
        AapClient::get(self, url).await
    }
}

/// Check `status` against `expected`; a mismatch yields one error diagnostic
/// quoting the response body.
pub fn validate_response(
    method: &Method,
    url: &str,
    status: u16,
    body: &[u8],
    expected: &[u16],
) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if !expected.contains(&status) {
        diags.add_error(
            format!("Unexpected HTTP status code received for {method} request to path {url}"),
            format!(
                "Expected one of ({expected:?}), got ({status}). Response details: {}",
                String::from_utf8_lossy(body)
            ),
        );
    }
    diags
}

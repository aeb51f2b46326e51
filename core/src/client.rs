//! Pooled implementation of the identity SDK's HTTP client contract.
//!
//! # Design
//! `PooledHttpClient` owns one `ureq::Agent` and one `ConnectionPool`, both
//! shared by clones. Each call is split into a pure `build_*` step that turns
//! the caller's arguments into an `HttpRequest` (rejecting unsupported methods
//! before any I/O) and a `dispatch` step that runs the exchange while holding
//! a pool permit. The permit lives in `dispatch`'s scope, so the slot is
//! returned on success, on transport errors, and when reading the body fails.

use std::fmt;

use tracing::{debug, info};

use crate::config::PoolConfig;
use crate::error::{ClientError, ConfigError, OAuthError, TransportError, UnsupportedMethod};
use crate::http::{
    decode_body, form_encode, has_content_type, header_pairs, query_string, Headers, HttpMethod, HttpRequest, HttpResponse,
    Parameters, FORM_CONTENT_TYPE,
};
use crate::oauth::{OAuthClientRequest, OAuthClientResponse};
use crate::pool::ConnectionPool;

/// Content type used for OAuth requests when the caller does not pass one.
pub const DEFAULT_OAUTH_CONTENT_TYPE: &str = "application/json";

/// The HTTP client contract the identity SDK calls into.
pub trait HttpClient {
    /// Execute a GET, POST, or DELETE request and return status and body.
    ///
    /// For GET and DELETE, `parameters` become the query string; for POST they
    /// are sent as a form body. `method` is matched case-insensitively.
    fn execute(
        &self,
        url: &str,
        parameters: Option<&Parameters>,
        headers: Option<&Headers>,
        method: &str,
    ) -> Result<HttpResponse, ClientError>;

    /// Execute a pre-built OAuth request with GET or POST and decode the
    /// response into the caller-chosen `T`.
    fn execute_oauth<T: OAuthClientResponse>(
        &self,
        request: &OAuthClientRequest,
        headers: Option<&Headers>,
        method: &str,
    ) -> Result<T, OAuthError>;
}

/// `HttpClient` backed by a bounded connection pool to a single upstream host.
#[derive(Clone)]
pub struct PooledHttpClient {
    agent: ureq::Agent,
    pool: ConnectionPool,
    config: PoolConfig,
}

impl fmt::Debug for PooledHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHttpClient")
            .field("config", &self.config)
            .field("available", &self.pool.available())
            .finish_non_exhaustive()
    }
}

impl Default for PooledHttpClient {
    fn default() -> Self {
        info!("creating pooled HTTP client with default settings");
        Self::build(PoolConfig::default())
    }
}

impl PooledHttpClient {
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PoolConfig) -> Self {
        info!(
            connect_timeout_ms = config.connect_timeout_ms,
            socket_timeout_ms = config.socket_timeout_ms,
            pool_size = config.pool_size,
            "creating pooled HTTP client"
        );
        // Only one upstream host is ever targeted, so the per-host cap is the pool size.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout()))
            .timeout_recv_response(Some(config.socket_timeout()))
            .timeout_recv_body(Some(config.socket_timeout()))
            .max_idle_connections(config.pool_size)
            .max_idle_connections_per_host(config.pool_size)
            .build()
            .new_agent();
        let pool = ConnectionPool::new(config.pool_size, config.connect_timeout());
        Self { agent, pool, config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run one exchange under a pool permit and read the whole body.
    fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let _permit = self.pool.acquire()?;

        let mut response = match request.method {
            HttpMethod::Get => {
                with_headers(self.agent.get(request.url.as_str()), &request.headers).call()
            }
            HttpMethod::Delete => {
                with_headers(self.agent.delete(request.url.as_str()), &request.headers).call()
            }
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(request.url.as_str()), &request.headers);
                let body = request.body.as_deref().unwrap_or_default();
                match request.content_type.as_deref() {
                    Some(content_type) => builder.content_type(content_type).send(body.as_bytes()),
                    None => builder.send(body.as_bytes()),
                }
            }
        }?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.body_mut().with_config().limit(u64::MAX).read_to_vec()?;
        Ok(HttpResponse {
            status,
            body: decode_body(&bytes, content_type.as_deref()),
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Build the request for the generic `execute` path.
pub fn build_request(
    url: &str,
    parameters: Option<&Parameters>,
    headers: Option<&Headers>,
    method: &str,
) -> Result<HttpRequest, UnsupportedMethod> {
    let method: HttpMethod = method.parse()?;
    let caller_content_type = has_content_type(headers);
    let headers = header_pairs(headers);
    let request = match method {
        HttpMethod::Get | HttpMethod::Delete => HttpRequest {
            method,
            url: format!("{url}{}", query_string(parameters)),
            headers,
            body: None,
            content_type: None,
        },
        HttpMethod::Post => HttpRequest {
            method,
            url: url.to_string(),
            body: Some(parameters.map(form_encode).unwrap_or_default()),
            // A caller Content-Type header wins over the form default.
            content_type: (!caller_content_type).then(|| FORM_CONTENT_TYPE.to_string()),
            headers,
        },
    };
    Ok(request)
}

/// Resolve the OAuth content type: the caller's `Content-Type` header if any,
/// otherwise `application/json`.
pub fn oauth_content_type(headers: Option<&Headers>) -> &str {
    headers
        .and_then(|h| h.iter().find(|(name, _)| name.eq_ignore_ascii_case("content-type")))
        .map(|(_, value)| value.as_str())
        .unwrap_or(DEFAULT_OAUTH_CONTENT_TYPE)
}

/// Build the request for the OAuth path. Only GET and POST are accepted.
pub fn build_oauth_request(
    request: &OAuthClientRequest,
    headers: Option<&Headers>,
    method: &str,
) -> Result<HttpRequest, UnsupportedMethod> {
    let method = match method.parse::<HttpMethod>() {
        Ok(HttpMethod::Delete) | Err(_) => return Err(UnsupportedMethod(method.to_string())),
        Ok(method) => method,
    };
    let url = request.location_uri().to_string();
    let request = match method {
        HttpMethod::Post => HttpRequest {
            method,
            url,
            // Sent through `content_type` instead.
            headers: header_pairs(headers)
                .into_iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                .collect(),
            body: Some(request.body().unwrap_or_default().to_string()),
            content_type: Some(with_utf8_charset(oauth_content_type(headers))),
        },
        _ => HttpRequest {
            method,
            url,
            headers: header_pairs(headers),
            body: None,
            content_type: None,
        },
    };
    Ok(request)
}

fn with_utf8_charset(content_type: &str) -> String {
    if content_type.to_ascii_lowercase().contains("charset=") {
        content_type.to_string()
    } else {
        format!("{content_type}; charset=UTF-8")
    }
}

impl HttpClient for PooledHttpClient {
    fn execute(
        &self,
        url: &str,
        parameters: Option<&Parameters>,
        headers: Option<&Headers>,
        method: &str,
    ) -> Result<HttpResponse, ClientError> {
        let request = build_request(url, parameters, headers, method)?;
        debug!(method = %request.method, url = %request.url, "executing request");
        self.dispatch(&request).map_err(|source| ClientError::Transport {
            url: request.url.clone(),
            source,
        })
    }

    fn execute_oauth<T: OAuthClientResponse>(
        &self,
        request: &OAuthClientRequest,
        headers: Option<&Headers>,
        method: &str,
    ) -> Result<T, OAuthError> {
        let http_request = build_oauth_request(request, headers, method)?;
        debug!(
            method = %http_request.method,
            url = %http_request.url,
            "executing OAuth request"
        );
        let response = self.dispatch(&http_request).map_err(OAuthError::System)?;
        let content_type = oauth_content_type(headers);
        T::from_parts(&response.body, content_type, response.status).map_err(OAuthError::from)
    }
}

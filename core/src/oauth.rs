//! OAuth request and response model used by `HttpClient::execute_oauth`.
//!
//! # Design
//! Requests are immutable values produced by builders, carrying a location
//! URI and an optional pre-encoded body. Responses are decoded through the
//! `OAuthClientResponse` trait: the caller picks the concrete response type as
//! the generic parameter of `execute_oauth`, and that type decides how to turn
//! `(body, content_type, status)` into a value or an `OAuthProblem`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::http::{form_encode, Parameters};

pub const INVALID_REQUEST: &str = "invalid_request";

/// An outgoing OAuth request: where to send it and what body to POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientRequest {
    location_uri: String,
    body: Option<String>,
}

impl OAuthClientRequest {
    pub fn new(location_uri: impl Into<String>, body: Option<String>) -> Self {
        Self {
            location_uri: location_uri.into(),
            body,
        }
    }

    /// Start a token endpoint request.
    pub fn token_location(location: impl Into<String>) -> TokenRequestBuilder {
        TokenRequestBuilder(MessageBuilder::new(location))
    }

    /// Start an authorization endpoint request.
    pub fn authorization_location(location: impl Into<String>) -> AuthenticationRequestBuilder {
        AuthenticationRequestBuilder(MessageBuilder::new(location))
    }

    pub fn location_uri(&self) -> &str {
        &self.location_uri
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// OAuth 2.0 grant types understood by token endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    Password,
    RefreshToken,
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

#[derive(Debug, Clone)]
struct MessageBuilder {
    location: String,
    parameters: Parameters,
}

impl MessageBuilder {
    fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            parameters: Parameters::new(),
        }
    }

    fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    fn query_message(self) -> OAuthClientRequest {
        if self.parameters.is_empty() {
            return OAuthClientRequest::new(self.location, None);
        }
        let separator = if self.location.contains('?') { '&' } else { '?' };
        let uri = format!("{}{separator}{}", self.location, form_encode(&self.parameters));
        OAuthClientRequest::new(uri, None)
    }
}

/// Builder for token endpoint requests.
#[derive(Debug, Clone)]
pub struct TokenRequestBuilder(MessageBuilder);

impl TokenRequestBuilder {
    pub fn grant_type(self, grant_type: GrantType) -> Self {
        self.set_parameter("grant_type", grant_type.as_str())
    }

    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        self.set_parameter("client_id", client_id)
    }

    pub fn client_secret(self, client_secret: impl Into<String>) -> Self {
        self.set_parameter("client_secret", client_secret)
    }

    pub fn redirect_uri(self, redirect_uri: impl Into<String>) -> Self {
        self.set_parameter("redirect_uri", redirect_uri)
    }

    pub fn code(self, code: impl Into<String>) -> Self {
        self.set_parameter("code", code)
    }

    pub fn username(self, username: impl Into<String>) -> Self {
        self.set_parameter("username", username)
    }

    pub fn password(self, password: impl Into<String>) -> Self {
        self.set_parameter("password", password)
    }

    pub fn refresh_token(self, refresh_token: impl Into<String>) -> Self {
        self.set_parameter("refresh_token", refresh_token)
    }

    pub fn scope(self, scope: impl Into<String>) -> Self {
        self.set_parameter("scope", scope)
    }

    pub fn set_parameter(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self(self.0.set(name, value))
    }

    /// Parameters as a form-encoded body.
    pub fn build_body_message(self) -> OAuthClientRequest {
        let body = form_encode(&self.0.parameters);
        OAuthClientRequest::new(self.0.location, Some(body))
    }

    /// Parameters as a flat JSON object body.
    pub fn build_json_message(self) -> OAuthClientRequest {
        let object: Map<String, Value> = self
            .0
            .parameters
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        OAuthClientRequest::new(self.0.location, Some(Value::Object(object).to_string()))
    }

    /// Parameters appended to the location as a query string.
    pub fn build_query_message(self) -> OAuthClientRequest {
        self.0.query_message()
    }
}

/// Builder for authorization endpoint redirects.
#[derive(Debug, Clone)]
pub struct AuthenticationRequestBuilder(MessageBuilder);

impl AuthenticationRequestBuilder {
    pub fn response_type(self, response_type: impl Into<String>) -> Self {
        self.set_parameter("response_type", response_type)
    }

    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        self.set_parameter("client_id", client_id)
    }

    pub fn redirect_uri(self, redirect_uri: impl Into<String>) -> Self {
        self.set_parameter("redirect_uri", redirect_uri)
    }

    pub fn scope(self, scope: impl Into<String>) -> Self {
        self.set_parameter("scope", scope)
    }

    pub fn state(self, state: impl Into<String>) -> Self {
        self.set_parameter("state", state)
    }

    pub fn set_parameter(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self(self.0.set(name, value))
    }

    pub fn build_query_message(self) -> OAuthClientRequest {
        self.0.query_message()
    }
}

/// An OAuth-level failure reported by the authorization server, or a response
/// that could not be understood as an OAuth response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("OAuth problem {}", describe_problem(.error, .description))]
pub struct OAuthProblem {
    pub error: String,
    pub description: Option<String>,
    pub uri: Option<String>,
    pub state: Option<String>,
    pub response_status: Option<u16>,
}

fn describe_problem(error: &str, description: &Option<String>) -> String {
    match description {
        Some(description) => format!("{error}: {description}"),
        None => error.to_string(),
    }
}

impl OAuthProblem {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            description: None,
            uri: None,
            state: None,
            response_status: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.response_status = Some(status);
        self
    }

    fn from_fields(error: String, fields: &Map<String, Value>, status: u16) -> Self {
        Self {
            error,
            description: string_field(fields, "error_description"),
            uri: string_field(fields, "error_uri"),
            state: string_field(fields, "state"),
            response_status: Some(status),
        }
    }
}

/// A response shape `execute_oauth` can decode into.
pub trait OAuthClientResponse: Sized {
    /// Build the response from the raw body, the request's content type, and
    /// the HTTP status.
    fn from_parts(body: &str, content_type: &str, status: u16) -> Result<Self, OAuthProblem>;
}

/// Access token issued by a token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthJsonAccessTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    scope: Option<String>,
    extra: BTreeMap<String, Value>,
    status: u16,
}

const TOKEN_FIELDS: [&str; 5] = [
    "access_token",
    "token_type",
    "expires_in",
    "refresh_token",
    "scope",
];

impl OAuthJsonAccessTokenResponse {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Fields other than the standard token fields, e.g. `user_id`.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

impl OAuthClientResponse for OAuthJsonAccessTokenResponse {
    fn from_parts(body: &str, content_type: &str, status: u16) -> Result<Self, OAuthProblem> {
        let fields = decode_fields(body, content_type).map_err(|description| {
            OAuthProblem::new(INVALID_REQUEST)
                .with_description(description)
                .with_status(status)
        })?;

        if let Some(error) = string_field(&fields, "error") {
            return Err(OAuthProblem::from_fields(error, &fields, status));
        }

        let access_token = string_field(&fields, "access_token").ok_or_else(|| {
            OAuthProblem::new(INVALID_REQUEST)
                .with_description("missing access_token in token response")
                .with_status(status)
        })?;

        let expires_in = match fields.get("expires_in") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        let extra = fields
            .iter()
            .filter(|(k, _)| !TOKEN_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            access_token,
            token_type: string_field(&fields, "token_type"),
            expires_in,
            refresh_token: string_field(&fields, "refresh_token"),
            scope: string_field(&fields, "scope"),
            extra,
            status,
        })
    }
}

/// Raw response from a protected resource. Decoding never fails; callers
/// interpret the body themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthResourceResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl OAuthClientResponse for OAuthResourceResponse {
    fn from_parts(body: &str, content_type: &str, status: u16) -> Result<Self, OAuthProblem> {
        Ok(Self {
            status,
            content_type: content_type.to_string(),
            body: body.to_string(),
        })
    }
}

fn is_form_encoded(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .starts_with("application/x-www-form-urlencoded")
}

/// Decode a response body into a flat field map. Bodies that look like a JSON
/// object are always read as JSON; otherwise form encoding is used when the
/// content type says so.
fn decode_fields(body: &str, content_type: &str) -> Result<Map<String, Value>, String> {
    if is_form_encoded(content_type) && !body.trim_start().starts_with('{') {
        return Ok(url::form_urlencoded::parse(body.as_bytes())
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err("response body is not a JSON object".to_string()),
        Err(e) => Err(format!("response body is not valid JSON: {e}")),
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

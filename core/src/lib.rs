//! Pooled HTTP client for the identity SDK.
//!
//! # Overview
//! Implements the SDK's `HttpClient` contract on top of a shared `ureq` agent
//! and a bounded pool of connection permits, so a slow identity service cannot
//! exhaust sockets or file descriptors. Two operations are exposed: a generic
//! `(method, url, headers, parameters) -> (status, body)` call, and an
//! OAuth-shaped call that decodes into a caller-chosen response type.
//!
//! # Design
//! - `PooledHttpClient` owns its pool explicitly; clones share it.
//! - Every exchange holds a `PoolPermit` that is released on drop, on every
//!   exit path.
//! - Requests are built as plain data before any I/O, so unsupported methods
//!   fail without touching the network.
//! - No retries, backoff, or circuit breaking: every failure is returned.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod pool;

pub use client::{HttpClient, PooledHttpClient, DEFAULT_OAUTH_CONTENT_TYPE};
pub use config::PoolConfig;
pub use error::{ClientError, ConfigError, OAuthError, TransportError, UnsupportedMethod};
pub use http::{query_string, Headers, HttpMethod, HttpRequest, HttpResponse, Parameters};
pub use oauth::{
    GrantType, OAuthClientRequest, OAuthClientResponse, OAuthJsonAccessTokenResponse,
    OAuthProblem, OAuthResourceResponse,
};
pub use pool::{ConnectionPool, PoolPermit};

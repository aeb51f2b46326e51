//! Error types for the pooled HTTP client.
//!
//! # Design
//! The generic and OAuth paths report failures through separate enums because
//! their callers expect different shapes: the generic path always carries the
//! URL it tried, while the OAuth path distinguishes system failures (transport,
//! pool, encoding) from OAuth problems raised while decoding the response.
//! Both share `TransportError` as the underlying cause.

use std::time::Duration;

use thiserror::Error;

use crate::oauth::OAuthProblem;

/// The caller asked for an HTTP method this client does not support.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported HTTP request method {0}")]
pub struct UnsupportedMethod(pub String);

/// A failure while talking to the upstream host.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Every pooled connection stayed busy for the whole acquire timeout.
    #[error("no pooled connection became available within {waited:?}")]
    PoolTimeout { waited: Duration },

    /// Connecting, sending, or reading the response failed.
    #[error(transparent)]
    Http(#[from] ureq::Error),
}

impl TransportError {
    /// Whether this failure was caused by a timeout, either while waiting for
    /// a pooled connection or inside the transport itself.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::PoolTimeout { .. } => true,
            TransportError::Http(ureq::Error::Timeout(_)) => true,
            TransportError::Http(ureq::Error::Io(e)) => e.kind() == std::io::ErrorKind::TimedOut,
            TransportError::Http(_) => false,
        }
    }
}

/// Errors returned by `HttpClient::execute`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    UnsupportedMethod(#[from] UnsupportedMethod),

    /// The exchange failed. `url` is the final request URL, query string included.
    #[error("pooled request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport { source, .. } if source.is_timeout())
    }
}

/// Errors returned by `HttpClient::execute_oauth`.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error(transparent)]
    UnsupportedMethod(#[from] UnsupportedMethod),

    /// Transport, pool, or encoding failure.
    #[error("OAuth system failure")]
    System(#[source] TransportError),

    /// The response decoded into an OAuth-level error. Passed through as-is.
    #[error(transparent)]
    Problem(#[from] OAuthProblem),
}

/// Invalid construction-time configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pool size must be at least 1")]
    ZeroPoolSize,

    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: String, value: String },
}

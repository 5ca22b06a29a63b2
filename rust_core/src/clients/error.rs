//! Errors raised by the upstream price sources

use thiserror::Error;

/// Failure of one upstream request.
///
/// The `Display` text is what ends up in front of the user, either as the
/// cycle-level error or inside a single row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceError {
    /// Upstream answered with a non-2xx status
    #[error("{provider} HTTP {status}: {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Transport failure (DNS, connect, TLS, timeout)
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    /// Body was not the JSON shape we expected
    #[error("{provider} returned invalid JSON: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// Configured base URL cannot be turned into a request URL
    #[error("{provider} URL is invalid: {message}")]
    InvalidUrl {
        provider: &'static str,
        message: String,
    },
}

impl SourceError {
    /// Build an HTTP error, keeping at most `max_chars` of the response body
    pub fn http(provider: &'static str, status: u16, body: &str, max_chars: usize) -> Self {
        Self::Http {
            provider,
            status,
            body: body.chars().take(max_chars).collect(),
        }
    }

    pub fn request(provider: &'static str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out ({})", err)
        } else {
            err.to_string()
        };
        Self::Request { provider, message }
    }

    pub fn decode(provider: &'static str, err: serde_json::Error) -> Self {
        Self::Decode {
            provider,
            message: err.to_string(),
        }
    }

    pub fn invalid_url(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            provider,
            message: message.into(),
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            Self::Http { provider, .. }
            | Self::Request { provider, .. }
            | Self::Decode { provider, .. }
            | Self::InvalidUrl { provider, .. } => *provider,
        }
    }
}

use std::fmt;

/// Errors returned when dispatching fails *before* any delivery attempt.
///
/// Operational failures (transport errors, provider rejections) never
/// surface here. They become failed log entries in the response so the
/// feedback dispatcher can re-post them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Request failed validation. The message is part of the external
    /// contract and is surfaced verbatim to the caller.
    InvalidRequest(String),

    /// Platform tag not recognized at ingress.
    UnknownPlatform(i32),

    /// Channel cannot be driven at all, e.g. missing credentials.
    Setup(&'static str),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::InvalidRequest(msg) =>
                write!(f, "{}", msg),
            DispatchError::UnknownPlatform(tag) =>
                write!(f, "unknown platform tag: {}", tag),
            DispatchError::Setup(msg) =>
                write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Why a single provider call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// HTTP transport failure (connect, timeout, body read).
    Transport(String),

    /// Provider answered with a non-2xx status or a provider-level
    /// rejection in the response body.
    Rejected(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) =>
                write!(f, "transport error: {}", msg),
            ProviderError::Rejected(msg) =>
                write!(f, "provider rejected: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

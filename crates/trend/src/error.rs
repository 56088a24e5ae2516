//! Fetch error types and the failure classifier
//!
//! Classification is decoupled from logging: the fetch client decides
//! whether to retry from the [`ErrorClass`], and callers decide what a
//! capability rejection means for them.

use thiserror::Error;

/// Longest response body excerpt kept in an error
const BODY_EXCERPT_CHARS: usize = 500;

/// Signature Graph uses when `$select` names a property the mailbox does not expose
const UNKNOWN_PROPERTY_SIGNATURE: &str = "could not find a property named";

/// How a failed request should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts, connection failures and non-400 statuses; worth retrying
    Transient,
    /// HTTP 400 rejecting a requested property; the caller may downgrade the query
    CapabilityRejection,
    /// Requests that will fail the same way again
    Fatal,
}

/// Failure below the HTTP status level (DNS, TLS, connect, timeout, body read)
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Terminal failure of a logical GET after its attempt budget
#[derive(Debug, Clone, Error)]
#[error("{}: {body_excerpt}", status_label(.status))]
pub struct FetchError {
    /// HTTP status, or `None` for transport failures
    pub status: Option<u16>,
    /// Start of the response body, or the transport error text
    pub body_excerpt: String,
    pub class: ErrorClass,
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "transport error".to_string(),
    }
}

impl FetchError {
    /// Failure with an HTTP status and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        Self {
            status: Some(status),
            body_excerpt: excerpt(body),
            class: classify(Some(status), body),
        }
    }

    /// Failure before any status was received
    pub fn from_transport(error: &TransportError) -> Self {
        Self {
            status: None,
            body_excerpt: excerpt(&error.0),
            class: ErrorClass::Transient,
        }
    }

    /// A 200 whose body could not be used
    pub fn undecodable(reason: impl std::fmt::Display) -> Self {
        Self {
            status: Some(200),
            body_excerpt: excerpt(&format!("invalid JSON body: {}", reason)),
            class: ErrorClass::Fatal,
        }
    }

    /// Whether this is a 400 naming `property` as unknown
    pub fn rejects_property(&self, property: &str) -> bool {
        self.class == ErrorClass::CapabilityRejection
            && self
                .body_excerpt
                .to_lowercase()
                .contains(&format!("property named '{}'", property.to_lowercase()))
    }

    pub fn is_retryable(&self) -> bool {
        self.class == ErrorClass::Transient
    }
}

/// Classify a failed response
pub fn classify(status: Option<u16>, body: &str) -> ErrorClass {
    match status {
        None => ErrorClass::Transient,
        Some(400) if body.to_lowercase().contains(UNKNOWN_PROPERTY_SIGNATURE) => {
            ErrorClass::CapabilityRejection
        }
        Some(400) => ErrorClass::Fatal,
        Some(_) => ErrorClass::Transient,
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}

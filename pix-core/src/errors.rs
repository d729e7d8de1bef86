//! # Errors
//!
//! pixvault carries a small set of structured errors through `anyhow::Error`.
//! Core goals:
//! - every error has a kind, a status code and a class name
//! - services return `anyhow::Result` and attach a `PixError` where the
//!   caller needs to tell kinds apart
//! - transport-agnostic (the HTTP crate decides how to serialize)
//!
//! With feature `serde` you also get `data` as `serde_json::Value` and a
//! `to_json()` helper.

use std::fmt;

use anyhow::Error as AnyError;

/// A convenience result type for pixvault core APIs.
pub type PixResult<T> = std::result::Result<T, AnyError>;

/// Error class names + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,      // 400
    NotFound,        // 404
    PayloadTooLarge, // 413
    Unprocessable,   // 422
    GeneralError,    // 500
    Unavailable,     // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    /// Error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::PayloadTooLarge => "payload-too-large",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::Unavailable => "unavailable",
        }
    }

    /// Server-side kinds never echo their message to clients.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(feature = "serde")]
pub type ErrorValue = serde_json::Value;

#[cfg(not(feature = "serde"))]
pub type ErrorValue = std::sync::Arc<dyn std::any::Any + Send + Sync>;

/// A structured pixvault error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct PixError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<ErrorValue>,
    pub source: Option<AnyError>,
}

impl PixError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: ErrorValue) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error` so it flows through service results.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `PixError` anywhere in an `anyhow::Error` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&PixError> {
        err.chain().find_map(|e| e.downcast_ref::<PixError>())
    }

    /// Turn any error into a PixError:
    /// - if it's already a PixError, keep it (lossless)
    /// - otherwise wrap as GeneralError with a generic message
    pub fn normalize(err: AnyError) -> PixError {
        match err.downcast::<PixError>() {
            Ok(pix) => pix,
            Err(other) => {
                PixError::new(ErrorKind::GeneralError, "Internal server error").with_source(other)
            }
        }
    }

    /// A version suitable for returning to clients:
    /// - drops the inner `source`
    /// - replaces the message of 5xx kinds with a generic one
    pub fn sanitize_for_client(&self) -> PixError {
        let message = if self.kind.is_server_error() {
            match self.kind {
                ErrorKind::Unavailable => "Service unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.message.clone()
        };

        PixError {
            kind: self.kind,
            message,
            data: self.data.clone(),
            source: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
}

impl fmt::Display for PixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for PixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(feature = "serde")]
impl PixError {
    /// JSON payload returned to HTTP clients.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        base
    }
}

/// Convenience helper for "bail with PixError".
#[macro_export]
macro_rules! bail_pix {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::PixError::$ctor($msg).into_anyhow());
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::PixError::$ctor(format!($fmt, $($arg)*)).into_anyhow());
    };
}

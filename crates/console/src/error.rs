use std::error::Error as StdError;

use axum::http::StatusCode;
use thiserror::Error;

use crate::security::SecurityTier;
use crate::store::StoreError;

/// Every failure a dispatched request can end in. Handlers never catch
/// these; the HTTP layer turns each one into a status and an error page.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{path} requires {required} access (caller is {actual})")]
    Authorization {
        path: String,
        required: SecurityTier,
        actual: SecurityTier,
    },

    #[error("bad request: {reason}")]
    BadRequest { reason: String },

    #[error("failed to render template '{template}'")]
    Template {
        template: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("handler failed: {reason}")]
    Handler {
        reason: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

/// Result alias for dispatch and action operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    pub fn handler(reason: impl Into<String>) -> Self {
        Self::Handler {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Template { .. } | Self::Handler { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Authorization { .. } => "authorization",
            Self::BadRequest { .. } => "bad_request",
            Self::Template { .. } => "template",
            Self::Handler { .. } => "handler",
        }
    }

    /// Message safe to show to the caller. Server-side failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            Self::Template { .. } | Self::Handler { .. } => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ConsoleError {
    fn from(err: StoreError) -> Self {
        Self::Handler {
            reason: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Handler {
            reason: format!("serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

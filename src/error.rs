// src/error.rs

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// One field/message pair from a server-side validation error array.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum KronosError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Access token not available")]
    MissingToken,

    #[error("Token refresh failed: Status={status:?}, Message='{message}'")]
    TokenRefreshFailed {
        status: Option<StatusCode>,
        message: String,
    },

    /// Server-side validation errors (field/message pairs).
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Domain error reported by the API (`detail` or `error.message` body).
    #[error("API error: Status={status}, Message='{message}'")]
    Api { status: StatusCode, message: String },

    /// Client-side guard failed before any network call was made.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Another destructive action on the same request is still outstanding.
    #[error("Action '{0}' already in flight")]
    ActionInFlight(&'static str),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

// Error body shapes the API is known to produce. All fields optional so a
// single parse attempt covers every shape.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    errors: Option<Vec<FieldError>>,
    detail: Option<String>,
    error: Option<NestedError>,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: Option<String>,
}

/// Turns a non-success response body into a typed error, in precedence
/// order: validation array, `detail`, nested `error.message`, raw body.
pub(crate) fn extract_api_error(status: StatusCode, body: &str) -> KronosError {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(errors) = parsed.errors {
            if !errors.is_empty() {
                return KronosError::Validation(errors);
            }
        }
        if let Some(detail) = parsed.detail {
            return KronosError::Api {
                status,
                message: detail,
            };
        }
        if let Some(message) = parsed.error.and_then(|e| e.message) {
            return KronosError::Api { status, message };
        }
    }
    let fallback = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    };
    KronosError::Api {
        status,
        message: fallback,
    }
}

/// Renders any error into the transient notification string shown to the
/// user. User-facing text is Italian, matching the rest of the product.
pub fn user_message(err: &KronosError) -> String {
    match err {
        KronosError::Validation(errors) => join_field_errors(errors),
        KronosError::Api { message, .. } => message.clone(),
        KronosError::Precondition(msg) => msg.clone(),
        KronosError::ActionInFlight(_) => "Operazione già in corso, attendere".to_string(),
        KronosError::MissingToken | KronosError::TokenRefreshFailed { .. } => {
            "Sessione scaduta, effettuare di nuovo l'accesso".to_string()
        }
        KronosError::Request(_) => "Impossibile contattare il server".to_string(),
        KronosError::Json(_) | KronosError::UrlParse(_) | KronosError::Config(_) => {
            "Errore interno dell'applicazione".to_string()
        }
    }
}

//! Contact form relay: `POST /email` validates the form and forwards it by SMTP.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;

pub mod mailer;
pub mod validation;

pub use mailer::{Mailer, SmtpMailer};
pub use validation::{ContactMessage, ContactPayload, ValidationError};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build the email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Relay settings, read from `EMAIL_USER`, `EMAIL_PASSWORD`, `EMAIL_TARGET`,
/// `SMTP_HOST` and `PORT`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub user: String,
    pub password: String,
    pub target: String,
    pub smtp_host: String,
    pub port: u16,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let required = |key: &'static str| lookup(key).ok_or(RelayError::MissingEnv(key));

        let port = match lookup("PORT") {
            Some(port) => port.parse().map_err(|_| RelayError::InvalidPort(port))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            user: required("EMAIL_USER")?,
            password: required("EMAIL_PASSWORD")?,
            target: required("EMAIL_TARGET")?,
            smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_owned()),
            port,
        })
    }
}

#[derive(Clone)]
pub struct RelayState {
    mailer: Arc<dyn Mailer>,
}

impl RelayState {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[derive(Debug, Serialize)]
pub struct RelayResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
}

impl RelayResponse {
    fn sent() -> Self {
        Self {
            success: true,
            message: Some("Email sent successfully!".into()),
            errors: None,
        }
    }

    fn invalid(errors: Vec<ValidationError>) -> Self {
        Self {
            success: false,
            message: None,
            errors: Some(errors),
        }
    }

    fn failed() -> Self {
        Self {
            success: false,
            message: Some("Error sending email.".into()),
            errors: None,
        }
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/email", post(send_email))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn send_email(
    State(state): State<RelayState>,
    payload: Result<Json<ContactPayload>, JsonRejection>,
) -> (StatusCode, Json<RelayResponse>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            log::debug!("Rejected body: {rejection}");
            let error = ValidationError {
                field: "body".into(),
                message: rejection.body_text(),
            };
            return (StatusCode::BAD_REQUEST, Json(RelayResponse::invalid(vec![error])));
        }
    };

    let message = match payload.validate() {
        Ok(message) => message,
        Err(errors) => {
            log::debug!("Invalid contact request: {} errors", errors.len());
            return (StatusCode::BAD_REQUEST, Json(RelayResponse::invalid(errors)));
        }
    };

    match state.mailer.send(&message).await {
        Ok(()) => (StatusCode::OK, Json(RelayResponse::sent())),
        Err(error) => {
            log::error!("Failed to relay message from {}: {error}", message.email);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(RelayResponse::failed()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn config_defaults() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("EMAIL_USER", "relay@example.com"),
            ("EMAIL_PASSWORD", "secret"),
            ("EMAIL_TARGET", "owner@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.smtp_host, DEFAULT_SMTP_HOST);
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn config_requires_credentials() {
        let error = RelayConfig::from_lookup(lookup(&[("EMAIL_USER", "relay@example.com")]))
            .unwrap_err();
        assert!(matches!(error, RelayError::MissingEnv("EMAIL_PASSWORD")));

        let error = RelayConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(error, RelayError::InvalidPort(_)));
    }
}

// src/errors.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;
use thiserror::Error;

/// Pipeline step that produced a model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    VisionAnalysis,
    Generation,
    Revision,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::VisionAnalysis => "vision analysis",
            Stage::Generation => "prompt generation",
            Stage::Revision => "revision",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ShotlistError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing credential: send an `Authorization: Bearer <key>` header")]
    MissingCredential,

    #[error("A revision is already in progress for card {0}")]
    RevisionInFlight(String),

    #[error("Gateway returned status {status}: {body}")]
    Gateway { status: u16, body: String },

    #[error("Model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway returned no text for model {0}")]
    EmptyResponse(String),

    #[error("Could not parse {stage} output as JSON")]
    Parse { stage: Stage },

    #[error("Malformed {stage} output: {reason}")]
    Schema { stage: Stage, reason: String },

    #[error("The {stage} step returned nothing usable: {reason}")]
    EmptyResult { stage: Stage, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShotlistError {
    /// Coarse category reported alongside the message.
    pub fn category(&self) -> &'static str {
        match self {
            ShotlistError::Validation(_) => "Validation error",
            ShotlistError::MissingCredential => "Missing credential",
            ShotlistError::RevisionInFlight(_) => "Revision in progress",
            ShotlistError::Gateway { .. } => "Gateway error",
            ShotlistError::Timeout(_) => "Timeout",
            ShotlistError::Network(_) => "Network error",
            ShotlistError::EmptyResponse(_) => "Empty response",
            ShotlistError::Parse { .. } => "Parse error",
            ShotlistError::Schema { .. } => "Schema error",
            ShotlistError::EmptyResult { .. } => "Empty result",
            ShotlistError::Config(_) => "Configuration error",
        }
    }
}

impl ResponseError for ShotlistError {
    fn status_code(&self) -> StatusCode {
        match self {
            ShotlistError::Validation(_) => StatusCode::BAD_REQUEST,
            ShotlistError::MissingCredential => StatusCode::UNAUTHORIZED,
            ShotlistError::RevisionInFlight(_) => StatusCode::CONFLICT,
            ShotlistError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ShotlistError::Gateway { .. }
            | ShotlistError::Network(_)
            | ShotlistError::EmptyResponse(_)
            | ShotlistError::Parse { .. }
            | ShotlistError::Schema { .. }
            | ShotlistError::EmptyResult { .. } => StatusCode::BAD_GATEWAY,
            ShotlistError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.category(),
            "message": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ShotlistError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ShotlistError::MissingCredential.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ShotlistError::RevisionInFlight("3".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ShotlistError::Timeout(90).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ShotlistError::Gateway {
                status: 429,
                body: "slow down".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn messages_name_the_stage() {
        let err = ShotlistError::Parse {
            stage: Stage::VisionAnalysis,
        };
        assert_eq!(err.to_string(), "Could not parse vision analysis output as JSON");

        let err = ShotlistError::EmptyResult {
            stage: Stage::Generation,
            reason: "no prompts".into(),
        };
        assert!(err.to_string().contains("prompt generation"));
    }

    #[test]
    fn gateway_error_carries_status_and_body() {
        let err = ShotlistError::Gateway {
            status: 401,
            body: "bad key".into(),
        };
        assert_eq!(err.to_string(), "Gateway returned status 401: bad key");
    }
}

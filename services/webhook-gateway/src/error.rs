//! HTTP boundary error mapping. Signature-verification failures
//! ([`webhook_ingestor::WebhookError::BadSignature`] /
//! `MissingSignatureHeader`) are the only ones that ever reach the caller as
//! a non-2xx response; everything past acceptance is handled internally and
//! routed to the dead-letter store instead of surfacing here.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::Utc;
use serde::Serialize;
use transactional_outbox::OutboxError;
use webhook_ingestor::WebhookError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Outbox(#[from] OutboxError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    code: &'static str,
    message: String,
    timestamp: chrono::DateTime<Utc>,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Webhook(WebhookError::BadSignature(_)) => "BAD_SIGNATURE",
            AppError::Webhook(WebhookError::MissingSignatureHeader(_)) => "MISSING_SIGNATURE",
            AppError::Webhook(WebhookError::MalformedBody(_) | WebhookError::UnrecognizedPayload(_)) => {
                "MALFORMED_BODY"
            }
            AppError::Webhook(WebhookError::Database(_) | WebhookError::Serialization(_)) => "INTERNAL",
            AppError::Outbox(_) => "INTERNAL",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Webhook(e) if e.is_verification_failure() => StatusCode::UNAUTHORIZED,
            AppError::Webhook(WebhookError::MalformedBody(_) | WebhookError::UnrecognizedPayload(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Webhook(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Outbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Webhook(WebhookError::Database(_) | WebhookError::Serialization(_)) | AppError::Outbox(_) => {
                tracing::error!(error = %self, "webhook-gateway internal error");
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            status: self.status_code().as_u16(),
            code: self.code(),
            message,
            timestamp: Utc::now(),
        })
    }
}

//! HTTP boundary error mapping. [`order_domain::OrderError`] and
//! [`transactional_outbox::OutboxError`] are translated here into the
//! `actix_web::ResponseError` the corpus's `AppError` convention expects;
//! nothing upstream of this module ever constructs an HTTP status directly.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::Utc;
use order_domain::OrderError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Order(#[from] OrderError),

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
            AppError::Order(OrderError::NotFound(_)) => "NOT_FOUND",
            AppError::Order(OrderError::UnauthorizedStockOverride(_)) => "UNAUTHORIZED_STOCK_OVERRIDE",
            AppError::Order(
                OrderError::InvalidStatusTransition { .. }
                | OrderError::InvalidPaidStatusTransition { .. }
                | OrderError::NotPending { .. }
                | OrderError::UnknownOverrideProduct(_)
                | OrderError::MissingOverrideReason(_)
                | OrderError::InvalidQuantity(_)
                | OrderError::NegativeMonetaryField { .. }
                | OrderError::EmptyOrder,
            ) => "VALIDATION_FAILED",
            AppError::Order(OrderError::Database(_) | OrderError::Outbox(_) | OrderError::Serialization(_)) => {
                "INTERNAL"
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Order(OrderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Order(OrderError::UnauthorizedStockOverride(_)) => StatusCode::FORBIDDEN,
            AppError::Order(e) if e.is_client_fault() => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Order(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Infrastructure failures never leak their raw text to the caller.
        let message = match self {
            AppError::Order(OrderError::Database(_) | OrderError::Outbox(_) | OrderError::Serialization(_)) => {
                tracing::error!(error = %self, "order-service internal error");
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

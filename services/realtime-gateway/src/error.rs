//! HTTP boundary error mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use bus_adapter::BusError;
use chrono::Utc;
use realtime_hub::HubError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Bus(#[from] BusError),

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
            AppError::Hub(_) => "INTERNAL",
            AppError::Bus(_) => "INTERNAL",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Hub(_) | AppError::Bus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Hub(_) | AppError::Bus(_) => {
                tracing::error!(error = %self, "realtime-gateway internal error");
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

use actix_web::{web, HttpRequest, HttpResponse};
use webhook_ingestor::{signature, sources::delivery, WebhookError};

use crate::error::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Signature";

/// Shared handler for `POST /webhook/grab` and `POST /webhook/lineman`.
/// Both delivery providers sign a plain hex HMAC, same scheme as Loyverse.
async fn receive(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes, provider: &'static str, secret: &str) -> Result<HttpResponse, AppError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignatureHeader(provider))?;

    signature::verify_hex(provider, secret, &body, header_value)?;

    super::spawn_ingest(state, provider, body, move |b| delivery::normalize(provider, b).map(Some));

    Ok(HttpResponse::Ok().finish())
}

pub async fn receive_grab(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let secret = state.webhook_secrets.secret_grab.clone();
    receive(state, req, body, "grab", &secret).await
}

pub async fn receive_lineman(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let secret = state.webhook_secrets.secret_lineman.clone();
    receive(state, req, body, "lineman", &secret).await
}

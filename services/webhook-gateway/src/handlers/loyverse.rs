use actix_web::{web, HttpRequest, HttpResponse};
use webhook_ingestor::{signature, sources::loyverse, WebhookError};

use crate::error::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Loyverse-Signature";

/// `POST /webhook/loyverse`. `X-Loyverse-Signature: hex(HMAC-SHA256(body, secret))`.
pub async fn receive(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignatureHeader("loyverse"))?;

    signature::verify_hex("loyverse", &state.webhook_secrets.secret_loyverse, &body, header_value)?;

    super::spawn_ingest(state, "loyverse", body, loyverse::normalize);

    Ok(HttpResponse::Ok().finish())
}

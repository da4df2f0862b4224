use actix_web::{web, HttpRequest, HttpResponse};
use webhook_ingestor::{signature, sources::line, WebhookError};

use crate::error::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// `POST /webhook/line`, header `X-Line-Signature: base64(HMAC-SHA256(body, secret))`.
pub async fn receive(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignatureHeader("line"))?;

    signature::verify_base64("line", &state.webhook_secrets.secret_line, &body, header_value)?;

    super::spawn_ingest(state, "line", body, line::normalize);

    Ok(HttpResponse::Ok().finish())
}

use actix_web::{web, HttpRequest, HttpResponse};
use webhook_ingestor::{signature, sources::payment_gateway, WebhookError};

use crate::error::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Signature-256";

/// Shared handler for `POST /webhook/omise` and `POST /webhook/2c2p`.
/// Both gateways sign with a `sha256=`-prefixed HMAC, same scheme as
/// Facebook's `X-Hub-Signature-256`.
async fn receive(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes, gateway: &'static str, secret: &str) -> Result<HttpResponse, AppError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignatureHeader(gateway))?;

    signature::verify_prefixed_hex(gateway, secret, &body, header_value)?;

    super::spawn_ingest(state, gateway, body, move |b| payment_gateway::normalize(gateway, b));

    Ok(HttpResponse::Ok().finish())
}

pub async fn receive_omise(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let secret = state.webhook_secrets.secret_omise.clone();
    receive(state, req, body, "omise", &secret).await
}

pub async fn receive_2c2p(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let secret = state.webhook_secrets.secret_2c2p.clone();
    receive(state, req, body, "2c2p", &secret).await
}

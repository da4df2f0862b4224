use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use webhook_ingestor::{signature, sources::facebook, WebhookError};

use crate::error::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// `GET /webhook/facebook?hub.mode=subscribe&hub.verify_token=…&hub.challenge=…`
/// Echoes the challenge back verbatim on a matching verify token.
pub async fn subscribe(state: web::Data<AppState>, query: web::Query<SubscribeQuery>) -> Result<HttpResponse, AppError> {
    let verify_token = query
        .verify_token
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("missing hub.verify_token".to_string()))?;
    let challenge = query
        .challenge
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("missing hub.challenge".to_string()))?;

    let echoed = signature::verify_challenge(
        "facebook",
        &state.webhook_secrets.facebook_verify_token,
        verify_token,
        challenge,
    )?;

    Ok(HttpResponse::Ok().body(echoed.to_string()))
}

/// `POST /webhook/facebook`, header `X-Hub-Signature-256: sha256=<hex>`.
pub async fn receive(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let header_value = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignatureHeader("facebook"))?;

    signature::verify_prefixed_hex("facebook", &state.webhook_secrets.secret_facebook, &body, header_value)?;

    super::spawn_ingest(state, "facebook", body, facebook::normalize);

    Ok(HttpResponse::Ok().finish())
}

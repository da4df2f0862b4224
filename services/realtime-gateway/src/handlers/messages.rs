//! `POST /api/v1/messages/` — chat message intake.
//!
//! This binary owns no outbox — it only runs the fan-out hub, a bus
//! consumer, and the WebSocket upgrade — so an intake message is published
//! straight to the bus rather than appended transactionally — there is no
//! domain write here to co-commit it with. A local client connected to the
//! same conversation only sees it once the bus consumer (`bus_bridge`)
//! redelivers it: the bus is the single source of truth for realtime
//! fan-out, never a direct in-process hand-off.

use actix_web::{web, HttpResponse};
use bus_adapter::BusProducer;
use event_schema::domain::{ChatMessageSent, DomainEvent};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub user_id: String,
    pub message: String,
}

pub async fn send_message(
    state: web::Data<AppState>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let event = DomainEvent::ChatMessageSent(ChatMessageSent {
        conversation_id: body.conversation_id.clone(),
        user_id: body.user_id.clone(),
        message: body.message.clone(),
    });

    let subject = event.subject().to_string();
    let envelope = event.into_envelope(body.conversation_id.clone(), "conversation");
    let bytes = envelope
        .encode()
        .map_err(|e| AppError::BadRequest(format!("failed to encode event: {e}")))?;
    let headers = envelope.bus_headers();

    state
        .bus_producer
        .publish(&subject, &body.conversation_id, &bytes, &headers)
        .await?;

    Ok(HttpResponse::Accepted().json(serde_json::json!({"status": "queued"})))
}

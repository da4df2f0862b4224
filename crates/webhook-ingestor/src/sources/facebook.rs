//! Facebook Messenger webhook normalization.
//!
//! Facebook's webhook body is a nested `entry[].messaging[]` structure. A
//! `messaging.message` entry becomes a [`ChatMessageReceived`];
//! `page_id` doubles as `conversation_id` since this
//! backbone has no richer thread concept for Messenger.

use event_schema::domain::{ChatMessageReceived, DomainEvent};
use serde::Deserialize;

use crate::error::{WebhookError, WebhookResult};
use crate::sources::NormalizedWebhook;

#[derive(Debug, Deserialize)]
struct FacebookWebhookBody {
    entry: Vec<FacebookEntry>,
}

#[derive(Debug, Deserialize)]
struct FacebookEntry {
    id: String,
    messaging: Vec<FacebookMessaging>,
}

#[derive(Debug, Deserialize)]
struct FacebookMessaging {
    sender: FacebookSender,
    message: Option<FacebookMessage>,
}

#[derive(Debug, Deserialize)]
struct FacebookSender {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FacebookMessage {
    mid: String,
    text: Option<String>,
}

pub fn normalize(body: &[u8]) -> WebhookResult<Option<NormalizedWebhook>> {
    let parsed: FacebookWebhookBody =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedBody(e.to_string()))?;

    for entry in parsed.entry {
        let page_id = entry.id;
        for messaging in entry.messaging {
            let Some(message) = messaging.message else {
                continue;
            };
            let event = DomainEvent::ChatMessageReceived(ChatMessageReceived {
                platform: "facebook".to_string(),
                conversation_id: page_id.clone(),
                user_id: messaging.sender.id,
                message: message.text.unwrap_or_default(),
                reply_token: None,
            });
            return Ok(Some(NormalizedWebhook {
                event,
                aggregate_id: page_id,
                aggregate_type: "conversation",
                upstream_event_id: Some(message.mid),
            }));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_messaging_message_into_chat_message_received() {
        let body = br#"{
            "entry": [
                {
                    "id": "page-1",
                    "messaging": [
                        {
                            "sender": {"id": "sender-1"},
                            "message": {"mid": "m-1", "text": "hi there"}
                        }
                    ]
                }
            ]
        }"#;

        let normalized = normalize(body).unwrap().unwrap();
        match normalized.event {
            DomainEvent::ChatMessageReceived(chat) => {
                assert_eq!(chat.platform, "facebook");
                assert_eq!(chat.conversation_id, "page-1");
                assert_eq!(chat.user_id, "sender-1");
                assert_eq!(chat.message, "hi there");
            }
            _ => panic!("expected ChatMessageReceived"),
        }
        assert_eq!(normalized.upstream_event_id.as_deref(), Some("m-1"));
    }

    #[test]
    fn entries_with_no_message_normalize_to_nothing() {
        let body = br#"{"entry": [{"id": "page-1", "messaging": [{"sender": {"id": "s1"}}]}]}"#;
        assert!(normalize(body).unwrap().is_none());
    }
}

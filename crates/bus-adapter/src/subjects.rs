//! Mapping from event families to canonical bus topics.
//!
//! The outbox store and the consumers on the other end must agree on topic
//! names without sharing code, so the mapping lives here as the single
//! source of truth and is driven by an operator-configured prefix
//! (`BUS_TOPIC_PREFIX`) so the same cluster can host multiple environments.

const ORDER_EVENTS: &str = "order-events";
const PAYMENT_EVENTS: &str = "payment-events";
const CHAT_MESSAGES: &str = "chat-messages";
const DELIVERY_UPDATES: &str = "delivery-updates";
const LOYVERSE_WEBHOOKS: &str = "loyverse-webhooks";

/// Resolves a logical subject name (as produced by
/// [`event_schema::DomainEvent::subject`]) into the physical topic name used
/// on the wire, given an environment prefix.
pub fn topic_for(prefix: &str, subject: &str) -> String {
    let base = match subject {
        "order-events" => ORDER_EVENTS,
        "payment-events" => PAYMENT_EVENTS,
        "chat-messages" => CHAT_MESSAGES,
        "delivery-updates" => DELIVERY_UPDATES,
        "loyverse-webhooks" => LOYVERSE_WEBHOOKS,
        other => other,
    };
    if prefix.is_empty() {
        base.to_string()
    } else {
        format!("{prefix}.{base}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_known_subjects() {
        assert_eq!(topic_for("orderflow", "order-events"), "orderflow.order-events");
        assert_eq!(topic_for("orderflow", "chat-messages"), "orderflow.chat-messages");
    }

    #[test]
    fn passes_through_unknown_subjects_unprefixed_base() {
        assert_eq!(topic_for("orderflow", "custom-events"), "orderflow.custom-events");
    }

    #[test]
    fn empty_prefix_is_bare_topic() {
        assert_eq!(topic_for("", "order-events"), "order-events");
    }
}

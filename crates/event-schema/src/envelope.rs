use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Bumped on breaking changes to the envelope shape itself (not to
/// individual event payloads, which carry their own implicit version via
/// `event_type`).
pub const SCHEMA_VERSION: u32 = 1;

/// The canonical, immutable-once-created event envelope.
///
/// `payload` stays as an opaque JSON value at this layer so the codec does
/// not need to know about every event family that will ever exist; callers
/// decode it into a [`crate::DomainEvent`] at the boundary where they need
/// typed access. Unknown top-level fields encountered on decode are
/// preserved in `extra` and re-emitted on encode, so a producer upgraded
/// ahead of a consumer doesn't silently drop information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub event_type: String,
    pub schema_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(flatten, default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn new(
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            schema_version: SCHEMA_VERSION,
            occurred_at: Utc::now(),
            payload,
            headers: HashMap::new(),
            extra: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }

    /// Bus metadata: `event-type`, `event-source`, `schema-version` are
    /// duplicated here so a consumer can route without decoding the body.
    pub fn bus_headers(&self) -> Vec<(String, String)> {
        let mut h = vec![
            ("event-type".to_string(), self.event_type.clone()),
            ("schema-version".to_string(), self.schema_version.to_string()),
        ];
        if let Some(source) = self.headers.get("source") {
            h.push(("event-source".to_string(), source.clone()));
        }
        h
    }

    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec(self).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Validates that the envelope carries everything a consumer needs to
    /// dispatch and process it. Decode success from serde only proves the
    /// wire shape parsed; this is the semantic check behind it.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.aggregate_id.is_empty() {
            return Err(SchemaError::MissingField("aggregate_id"));
        }
        if self.event_type.is_empty() {
            return Err(SchemaError::MissingField("event_type"));
        }
        if self.schema_version == 0 {
            return Err(SchemaError::MissingField("schema_version"));
        }
        Ok(())
    }

    /// Deterministic content hash over `(aggregate_id, event_type, payload,
    /// occurred_at)`, usable as a content-addressed `event_id` by producers
    /// that want "same logical event in, same id out" semantics. Two
    /// fingerprints colliding for the same `aggregate_id` is a signal the
    /// caller is re-emitting the same event and the second append MUST be
    /// rejected as a duplicate.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.aggregate_id.as_bytes());
        hasher.update(self.event_type.as_bytes());
        hasher.update(self.occurred_at.to_rfc3339().as_bytes());
        hasher.update(
            serde_json::to_vec(&self.payload)
                .unwrap_or_default()
                .as_slice(),
        );
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed envelope bytes: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventEnvelope {
        EventEnvelope::new(
            "order-1",
            "order",
            "OrderCreated",
            serde_json::json!({"total": "20.00"}),
        )
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let env = sample();
        let bytes = env.encode().unwrap();
        let decoded = EventEnvelope::decode(&bytes).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn decode_of_malformed_bytes_is_non_retryable() {
        let err = EventEnvelope::decode(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let mut env = sample();
        let bytes = env.encode().unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("future_field".to_string(), serde_json::json!("added-later"));
        let decoded = EventEnvelope::decode(&serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(
            decoded.extra.get("future_field"),
            Some(&serde_json::json!("added-later"))
        );

        env.extra
            .insert("future_field".to_string(), serde_json::json!("added-later"));
        assert_eq!(decoded, env);
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive_to_payload() {
        let a = sample();
        let b = sample().with_event_id(Uuid::new_v4()); // event_id not part of fingerprint
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = sample();
        c.payload = serde_json::json!({"total": "21.00"});
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn validate_rejects_missing_required_fields() {
        let mut env = sample();
        env.aggregate_id.clear();
        assert_eq!(
            env.validate().unwrap_err(),
            SchemaError::MissingField("aggregate_id")
        );
    }
}

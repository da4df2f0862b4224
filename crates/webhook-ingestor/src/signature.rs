//! Per-source signature verification.
//!
//! Every scheme reduces to "compute HMAC-SHA256 over the raw body with the
//! shared secret, then compare to the header in constant time" — the
//! schemes differ only in how the tag is encoded on the wire. Verification
//! uses `Mac::verify_slice`, which is constant-time over the tag, so no
//! source here does its own byte comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{WebhookError, WebhookResult};

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(body);
    mac
}

/// Verifies a hex-encoded HMAC-SHA256 tag with no prefix, e.g. Loyverse's
/// `X-Loyverse-Signature` and Grab/LineMan-style headers.
pub fn verify_hex(source: &'static str, secret: &str, body: &[u8], header_value: &str) -> WebhookResult<()> {
    let tag = hex::decode(header_value).map_err(|_| WebhookError::BadSignature(source))?;
    mac_for(secret, body)
        .verify_slice(&tag)
        .map_err(|_| WebhookError::BadSignature(source))
}

/// Verifies a `sha256=<hex>`-prefixed tag, as Facebook's `X-Hub-Signature-256`
/// and Omise/2c2p-style headers use.
pub fn verify_prefixed_hex(source: &'static str, secret: &str, body: &[u8], header_value: &str) -> WebhookResult<()> {
    let hex_part = header_value
        .strip_prefix("sha256=")
        .ok_or(WebhookError::BadSignature(source))?;
    verify_hex(source, secret, body, hex_part)
}

/// Verifies a base64-encoded HMAC-SHA256 tag, as LINE's `X-Line-Signature`
/// uses.
pub fn verify_base64(source: &'static str, secret: &str, body: &[u8], header_value: &str) -> WebhookResult<()> {
    use base64::Engine;
    let tag = base64::engine::general_purpose::STANDARD
        .decode(header_value)
        .map_err(|_| WebhookError::BadSignature(source))?;
    mac_for(secret, body)
        .verify_slice(&tag)
        .map_err(|_| WebhookError::BadSignature(source))
}

/// Checks a Facebook-style `hub.challenge` subscription handshake: if
/// `verify_token` matches the configured secret, returns the challenge to
/// be echoed back verbatim; otherwise fails verification.
pub fn verify_challenge<'a>(
    source: &'static str,
    configured_token: &str,
    verify_token: &str,
    challenge: &'a str,
) -> WebhookResult<&'a str> {
    if configured_token == verify_token {
        Ok(challenge)
    } else {
        Err(WebhookError::BadSignature(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_hex(secret: &str, body: &[u8]) -> String {
        hex::encode(mac_for(secret, body).finalize().into_bytes())
    }

    fn tag_base64(secret: &str, body: &[u8]) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(mac_for(secret, body).finalize().into_bytes())
    }

    #[test]
    fn verifies_a_correct_hex_signature() {
        let body = br#"{"type":"receipt_created"}"#;
        let sig = tag_hex("loyverse-secret", body);
        assert!(verify_hex("loyverse", "loyverse-secret", body, &sig).is_ok());
    }

    #[test]
    fn rejects_a_tampered_hex_signature() {
        let body = br#"{"type":"receipt_created"}"#;
        let sig = tag_hex("loyverse-secret", body);
        let tampered = br#"{"type":"receipt_deleted"}"#;
        assert!(verify_hex("loyverse", "loyverse-secret", tampered, &sig).is_err());
    }

    #[test]
    fn verifies_a_prefixed_facebook_style_signature() {
        let body = br#"{"object":"page"}"#;
        let sig = format!("sha256={}", tag_hex("fb-secret", body));
        assert!(verify_prefixed_hex("facebook", "fb-secret", body, &sig).is_ok());
    }

    #[test]
    fn rejects_a_prefixed_signature_missing_its_prefix() {
        let body = br#"{"object":"page"}"#;
        let sig = tag_hex("fb-secret", body);
        assert!(verify_prefixed_hex("facebook", "fb-secret", body, &sig).is_err());
    }

    #[test]
    fn verifies_a_base64_line_style_signature() {
        let body = br#"{"events":[]}"#;
        let sig = tag_base64("line-secret", body);
        assert!(verify_base64("line", "line-secret", body, &sig).is_ok());
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let body = br#"{"events":[]}"#;
        let sig = tag_base64("line-secret", body);
        assert!(verify_base64("line", "wrong-secret", body, &sig).is_err());
    }

    #[test]
    fn challenge_handshake_echoes_on_matching_token() {
        let challenge = verify_challenge("facebook", "my-verify-token", "my-verify-token", "echo-me").unwrap();
        assert_eq!(challenge, "echo-me");
    }

    #[test]
    fn challenge_handshake_rejects_mismatched_token() {
        assert!(verify_challenge("facebook", "my-verify-token", "wrong-token", "echo-me").is_err());
    }
}

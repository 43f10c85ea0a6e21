//! Verification for webhooks signed by the authentication provider.
//!
//! The provider signs `"{id}.{timestamp}.{body}"` with HMAC-SHA256 using the
//! base64 key after the `whsec_` prefix, and sends one or more
//! space-separated `v1,<base64 signature>` entries.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

/// Allowed clock skew between the provider and us, in seconds.
pub const TOLERANCE_SECONDS: i64 = 300;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WebhookError {
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    #[error("Invalid timestamp header")]
    InvalidTimestamp,

    #[error("Timestamp outside tolerance")]
    StaleTimestamp,

    #[error("Invalid webhook secret")]
    InvalidSecret,

    #[error("No matching signature found")]
    SignatureMismatch,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingHeader(name))
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, WebhookError> {
    let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
    STANDARD.decode(encoded).map_err(|_| WebhookError::InvalidSecret)
}

fn signing_mac(secret: &str, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
    let key = decode_secret(secret)?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(format!("{}.{}.", msg_id, timestamp).as_bytes());
    mac.update(payload);
    Ok(mac)
}

pub fn verify(headers: &HeaderMap, payload: &[u8], secret: &str) -> Result<(), WebhookError> {
    verify_at(headers, payload, secret, Utc::now().timestamp())
}

pub fn verify_at(headers: &HeaderMap, payload: &[u8], secret: &str, now: i64) -> Result<(), WebhookError> {
    let msg_id = header(headers, HEADER_ID)?;
    let timestamp_raw = header(headers, HEADER_TIMESTAMP)?;
    let signatures = header(headers, HEADER_SIGNATURE)?;

    let timestamp = timestamp_raw
        .parse::<i64>()
        .map_err(|_| WebhookError::InvalidTimestamp)?;

    if (now - timestamp).abs() > TOLERANCE_SECONDS {
        warn!("Webhook {} timestamp {} outside tolerance (now {})", msg_id, timestamp, now);
        return Err(WebhookError::StaleTimestamp);
    }

    let mac = signing_mac(secret, msg_id, timestamp, payload)?;

    // Entries that are not valid base64 simply never match
    let matched = signatures
        .split(' ')
        .filter_map(|entry| entry.split_once(','))
        .filter(|(version, _)| *version == "v1")
        .filter_map(|(_, signature)| STANDARD.decode(signature).ok())
        .any(|signature| mac.clone().verify_slice(&signature).is_ok());

    if matched {
        debug!("Webhook {} signature verified", msg_id);
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use shared_utils::test_utils::WebhookTestUtils;

    const NOW: i64 = 1_700_000_000;

    fn headers(id: &str, timestamp: &str, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ID, HeaderValue::from_str(id).unwrap());
        headers.insert(HEADER_TIMESTAMP, HeaderValue::from_str(timestamp).unwrap());
        headers.insert(HEADER_SIGNATURE, HeaderValue::from_str(signature).unwrap());
        headers
    }

    #[test]
    fn test_matches_provider_signature() {
        let body = r#"{"type":"user.created","data":{"id":"user_1"}}"#;
        let signature = WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", NOW, body);

        let headers = headers("msg_1", &NOW.to_string(), &signature);
        assert_eq!(verify_at(&headers, body.as_bytes(), WebhookTestUtils::SECRET, NOW), Ok(()));
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let body = "{}";
        let good = WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", NOW, body);
        let list = format!("v1,bm90LXRoZS1zaWduYXR1cmU= v2,ignored {}", good);

        let headers = headers("msg_1", &NOW.to_string(), &list);
        assert!(verify_at(&headers, body.as_bytes(), WebhookTestUtils::SECRET, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let signature = WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", NOW, "{}");
        let headers = headers("msg_1", &NOW.to_string(), &signature);

        assert_eq!(
            verify_at(&headers, b"{\"x\":1}", WebhookTestUtils::SECRET, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_undecodable_or_truncated_signature_fails() {
        let body = "{}";
        let good = WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", NOW, body);
        let encoded = good.strip_prefix("v1,").unwrap();
        let raw = STANDARD.decode(encoded).unwrap();
        let truncated = format!("v1,{}", STANDARD.encode(&raw[..raw.len() - 1]));

        for signature in ["v1,***not base64***", truncated.as_str()] {
            let headers = headers("msg_1", &NOW.to_string(), signature);
            assert_eq!(
                verify_at(&headers, body.as_bytes(), WebhookTestUtils::SECRET, NOW),
                Err(WebhookError::SignatureMismatch)
            );
        }
    }

    #[test]
    fn test_stale_timestamp_fails() {
        let signature = WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", NOW - 301, "{}");
        let headers = headers("msg_1", &(NOW - 301).to_string(), &signature);

        assert_eq!(
            verify_at(&headers, b"{}", WebhookTestUtils::SECRET, NOW),
            Err(WebhookError::StaleTimestamp)
        );
    }

    #[test]
    fn test_missing_header_fails() {
        let mut headers = headers("msg_1", &NOW.to_string(), "v1,abc");
        headers.remove(HEADER_SIGNATURE);

        assert_eq!(
            verify_at(&headers, b"{}", WebhookTestUtils::SECRET, NOW),
            Err(WebhookError::MissingHeader(HEADER_SIGNATURE))
        );
    }

    #[test]
    fn test_non_numeric_timestamp_fails() {
        let headers = headers("msg_1", "yesterday", "v1,abc");
        assert_eq!(
            verify_at(&headers, b"{}", WebhookTestUtils::SECRET, NOW),
            Err(WebhookError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_bad_secret() {
        let headers = headers("msg_1", &NOW.to_string(), "v1,abc");
        assert_eq!(
            verify_at(&headers, b"{}", "whsec_***not base64***", NOW),
            Err(WebhookError::InvalidSecret)
        );
    }
}

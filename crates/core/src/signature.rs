//! HMAC-SHA256 verification of payment-provider webhook signatures.
//!
//! - Stripe: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]` over
//!   `"{t}.{raw_body}"`.
//! - MercadoPago: `x-signature: ts=<ts>,v1=<hex>` over the manifest
//!   `"id:{data.id};request-id:{x-request-id};ts:{ts};"`.
//!
//! Both checks reject timestamps outside the configured tolerance to limit
//! replay.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Default replay window for webhook timestamps.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Timestamps above this are treated as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature header is missing")]
    MissingHeader,

    #[error("Signature header is malformed")]
    Malformed,

    #[error("Signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("Signature does not match payload")]
    Mismatch,
}

/// Parsed `k=v` pairs from a signature header.
struct SignatureHeader<'a> {
    timestamp: &'a str,
    signatures: Vec<&'a str>,
}

fn parse_header<'a>(
    header: &'a str,
    ts_key: &str,
) -> Result<SignatureHeader<'a>, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            k if k == ts_key => timestamp = Some(value.trim()),
            "v1" => signatures.push(value.trim()),
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(SignatureError::Malformed),
    }
}

fn check_tolerance(timestamp: &str, now: Timestamp, tolerance_secs: i64) -> Result<(), SignatureError> {
    let raw: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    let secs = if raw > MILLIS_THRESHOLD { raw / 1000 } else { raw };
    let tolerance = u64::try_from(tolerance_secs).unwrap_or(0);
    if now.timestamp().abs_diff(secs) > tolerance {
        return Err(SignatureError::TimestampOutOfTolerance);
    }
    Ok(())
}

fn mac_for(secret: &str, message: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    mac
}

/// Constant-time check of one hex signature against `message`.
fn matches(secret: &str, message: &str, signature_hex: &str) -> bool {
    match hex::decode(signature_hex) {
        Ok(bytes) => mac_for(secret, message).verify_slice(&bytes).is_ok(),
        Err(_) => false,
    }
}

/// Hex HMAC-SHA256 of `message`.
pub fn sign(secret: &str, message: &str) -> String {
    hex::encode(mac_for(secret, message).finalize().into_bytes())
}

/// Verify a Stripe webhook signature header against the raw request body.
pub fn verify_stripe(
    header: Option<&str>,
    body: &str,
    secret: &str,
    tolerance_secs: i64,
    now: Timestamp,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header, "t")?;
    check_tolerance(parsed.timestamp, now, tolerance_secs)?;

    let signed_payload = format!("{}.{}", parsed.timestamp, body);
    if parsed
        .signatures
        .iter()
        .any(|sig| matches(secret, &signed_payload, sig))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a `Stripe-Signature` header value. Used to sign fixtures.
pub fn stripe_header(secret: &str, timestamp: i64, body: &str) -> String {
    let signature = sign(secret, &format!("{timestamp}.{body}"));
    format!("t={timestamp},v1={signature}")
}

/// The string MercadoPago signs for a notification.
pub fn mercadopago_manifest(data_id: &str, request_id: Option<&str>, timestamp: &str) -> String {
    let mut manifest = format!("id:{data_id};");
    if let Some(request_id) = request_id {
        manifest.push_str(&format!("request-id:{request_id};"));
    }
    manifest.push_str(&format!("ts:{timestamp};"));
    manifest
}

/// Verify a MercadoPago `x-signature` header.
pub fn verify_mercadopago(
    header: Option<&str>,
    data_id: &str,
    request_id: Option<&str>,
    secret: &str,
    tolerance_secs: i64,
    now: Timestamp,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header, "ts")?;
    check_tolerance(parsed.timestamp, now, tolerance_secs)?;

    let manifest = mercadopago_manifest(data_id, request_id, parsed.timestamp);
    if parsed
        .signatures
        .iter()
        .any(|sig| matches(secret, &manifest, sig))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build an `x-signature` header value. Used to sign fixtures.
pub fn mercadopago_header(
    secret: &str,
    data_id: &str,
    request_id: Option<&str>,
    timestamp: i64,
) -> String {
    let ts = timestamp.to_string();
    let signature = sign(secret, &mercadopago_manifest(data_id, request_id, &ts));
    format!("ts={ts},v1={signature}")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &str = r#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    #[test]
    fn stripe_signature_round_trip() {
        let now = Utc::now();
        let header = stripe_header(SECRET, now.timestamp(), BODY);
        assert_eq!(verify_stripe(Some(&header), BODY, SECRET, 300, now), Ok(()));
    }

    #[test]
    fn stripe_rejects_tampered_body() {
        let now = Utc::now();
        let header = stripe_header(SECRET, now.timestamp(), BODY);
        let tampered = BODY.replace("evt_1", "evt_2");
        assert_eq!(
            verify_stripe(Some(&header), &tampered, SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stripe_rejects_wrong_secret() {
        let now = Utc::now();
        let header = stripe_header("other", now.timestamp(), BODY);
        assert_eq!(
            verify_stripe(Some(&header), BODY, SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stripe_accepts_any_matching_v1() {
        let now = Utc::now();
        let good = stripe_header(SECRET, now.timestamp(), BODY);
        let header = format!("{good},v1=deadbeef");
        assert_eq!(verify_stripe(Some(&header), BODY, SECRET, 300, now), Ok(()));
    }

    #[test]
    fn stripe_rejects_stale_timestamp() {
        let now = Utc::now();
        let old = (now - Duration::minutes(10)).timestamp();
        let header = stripe_header(SECRET, old, BODY);
        assert_eq!(
            verify_stripe(Some(&header), BODY, SECRET, 300, now),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn missing_or_malformed_headers() {
        let now = Utc::now();
        assert_eq!(
            verify_stripe(None, BODY, SECRET, 300, now),
            Err(SignatureError::MissingHeader)
        );
        assert_eq!(
            verify_stripe(Some("garbage"), BODY, SECRET, 300, now),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_stripe(Some("t=abc,v1=00"), BODY, SECRET, 300, now),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn extreme_timestamps_are_out_of_tolerance() {
        let now = Utc::now();
        for ts in [i64::MIN, i64::MAX] {
            let header = format!("t={ts},v1=00");
            assert_eq!(
                verify_stripe(Some(&header), BODY, SECRET, 300, now),
                Err(SignatureError::TimestampOutOfTolerance)
            );
            let header = format!("ts={ts},v1=00");
            assert_eq!(
                verify_mercadopago(Some(&header), "1", None, SECRET, 300, now),
                Err(SignatureError::TimestampOutOfTolerance)
            );
        }
    }

    #[test]
    fn non_hex_signature_is_a_mismatch() {
        let now = Utc::now();
        let header = format!("t={},v1=zz", now.timestamp());
        assert_eq!(
            verify_stripe(Some(&header), BODY, SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn mercadopago_manifest_format() {
        assert_eq!(
            mercadopago_manifest("123", Some("req-1"), "1700000000"),
            "id:123;request-id:req-1;ts:1700000000;"
        );
        assert_eq!(mercadopago_manifest("123", None, "1"), "id:123;ts:1;");
    }

    #[test]
    fn mercadopago_signature_round_trip() {
        let now = Utc::now();
        let header = mercadopago_header(SECRET, "98765", Some("req-9"), now.timestamp());
        assert_eq!(
            verify_mercadopago(Some(&header), "98765", Some("req-9"), SECRET, 300, now),
            Ok(())
        );
        assert_eq!(
            verify_mercadopago(Some(&header), "98766", Some("req-9"), SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn mercadopago_accepts_millisecond_timestamps() {
        let now = Utc::now();
        let header = mercadopago_header(SECRET, "1", None, now.timestamp_millis());
        assert_eq!(
            verify_mercadopago(Some(&header), "1", None, SECRET, 300, now),
            Ok(())
        );
    }

    #[test]
    fn odd_length_signature_is_a_mismatch() {
        let now = Utc::now();
        let header = format!("t={},v1=abc", now.timestamp());
        assert_eq!(
            verify_stripe(Some(&header), BODY, SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }
}

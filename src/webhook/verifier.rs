//! HMAC-SHA256 webhook signatures.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const DIGEST_LEN: usize = 32;

/// Hex signature of `body` under `secret`. Used by senders and tests.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length, so the error arm is unreachable.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Decode a signature header value: hex (either case) or base64, with an
/// optional `sha256=` prefix.
pub fn decode_signature(header: &str) -> Option<Vec<u8>> {
    let value = header.trim();
    let value = match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("sha256=") => &value[7..],
        _ => value,
    };

    let bytes = if value.len() == DIGEST_LEN * 2 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex::decode(value).ok()?
    } else {
        STANDARD.decode(value).ok()?
    };

    (bytes.len() == DIGEST_LEN).then_some(bytes)
}

/// True iff `signature` is the HMAC-SHA256 of `raw_body` under `secret`.
///
/// Fails closed on a missing secret, missing or undecodable signature.
/// Comparison is constant time.
pub fn verify(raw_body: &[u8], signature: Option<&str>, secret: Option<&str>) -> bool {
    let (Some(signature), Some(secret)) = (signature, secret) else {
        return false;
    };
    if secret.is_empty() {
        return false;
    }
    let Some(expected) = decode_signature(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"ContactCreate","id":"evt_1"}"#;

    #[test]
    fn test_valid_hex_signature() {
        let sig = sign(SECRET.as_bytes(), BODY);
        assert!(verify(BODY, Some(&sig), Some(SECRET)));
        assert!(verify(BODY, Some(&sig.to_uppercase()), Some(SECRET)));
        assert!(verify(BODY, Some(&format!("sha256={}", sig)), Some(SECRET)));
    }

    #[test]
    fn test_valid_base64_signature() {
        let raw = hex::decode(sign(SECRET.as_bytes(), BODY)).unwrap();
        let sig = STANDARD.encode(raw);
        assert!(verify(BODY, Some(&sig), Some(SECRET)));
    }

    #[test]
    fn test_flipped_byte_rejected() {
        let sig = sign(SECRET.as_bytes(), BODY);

        let mut body = BODY.to_vec();
        body[3] ^= 0x01;
        assert!(!verify(&body, Some(&sig), Some(SECRET)));

        let mut raw = hex::decode(&sig).unwrap();
        raw[0] ^= 0x01;
        assert!(!verify(BODY, Some(&hex::encode(raw)), Some(SECRET)));
    }

    #[test]
    fn test_fails_closed() {
        let sig = sign(SECRET.as_bytes(), BODY);
        assert!(!verify(BODY, None, Some(SECRET)));
        assert!(!verify(BODY, Some(&sig), None));
        assert!(!verify(BODY, Some(&sig), Some("")));
        assert!(!verify(BODY, Some("not-a-signature"), Some(SECRET)));
        assert!(!verify(BODY, Some(&sig[..40]), Some(SECRET)));
        assert!(!verify(BODY, Some(&sig), Some("other-secret")));
    }
}

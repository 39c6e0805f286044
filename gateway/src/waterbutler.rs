//! Waterbutler-compatibility request signing (§6 ambient stack): the
//! parent platform's file proxy signs outbound requests to addon
//! endpoints with an HMAC-SHA256 digest over `method\npath\ntimestamp`,
//! valid for a short window around "now". Grounded on the teacher's
//! `sha2`/`hex` dependencies (already pulled in for token hashing) plus
//! `hmac`, compared in constant time with `subtle` the way a credential
//! comparison would be.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signing key")]
    InvalidKey,
    #[error("timestamp is outside the accepted window")]
    ExpiredTimestamp,
    #[error("signature does not match")]
    Mismatch,
    #[error("provided signature is not valid hex")]
    InvalidEncoding,
}

fn signing_input(method: &str, path: &str, timestamp: i64) -> String {
    format!("{method}\n{path}\n{timestamp}")
}

pub fn sign(secret: &[u8], method: &str, path: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(signing_input(method, path, timestamp).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a caller-supplied signature against `now`, rejecting
/// timestamps more than `window_seconds` away in either direction —
/// the Waterbutler-compatible replay-resistance rule (§6).
pub fn verify(
    secret: &[u8],
    method: &str,
    path: &str,
    timestamp: i64,
    now: i64,
    window_seconds: i64,
    provided_signature_hex: &str,
) -> Result<(), SignatureError> {
    if (now - timestamp).abs() > window_seconds {
        return Err(SignatureError::ExpiredTimestamp);
    }

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(signing_input(method, path, timestamp).as_bytes());
    let expected = mac.finalize().into_bytes();

    let provided = hex::decode(provided_signature_hex).map_err(|_| SignatureError::InvalidEncoding)?;
    if expected.as_slice().ct_eq(&provided).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_freshly_signed_request() {
        let secret = b"wb-secret";
        let signature = sign(secret, "GET", "/v1/resources/abc123", 1_000);
        assert!(verify(secret, "GET", "/v1/resources/abc123", 1_000, 1_005, 110, &signature).is_ok());
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let secret = b"wb-secret";
        let signature = sign(secret, "GET", "/v1/resources/abc123", 1_000);
        let err = verify(secret, "GET", "/v1/resources/abc123", 1_000, 1_200, 110, &signature).unwrap_err();
        assert!(matches!(err, SignatureError::ExpiredTimestamp));
    }

    #[test]
    fn test_verify_rejects_tampered_path() {
        let secret = b"wb-secret";
        let signature = sign(secret, "GET", "/v1/resources/abc123", 1_000);
        let err = verify(secret, "GET", "/v1/resources/other", 1_000, 1_005, 110, &signature).unwrap_err();
        assert!(matches!(err, SignatureError::Mismatch));
    }
}

//! HMAC-SHA256 signing and verification of webhook payloads.
//!
//! Signatures are computed over the exact bytes that go on the wire. Callers
//! must serialize once and reuse the same buffer for both signing and sending;
//! re-serializing parsed JSON before verification breaks the signature.
//!
//! # Header format
//!
//! Outbound requests carry `X-CMS-Signature: sha256=<hex-digest>`. Verification
//! accepts the digest with or without the `sha256=` prefix.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by signature header values
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "X-CMS-Signature";

/// Header carrying the Unix timestamp the payload was signed at
pub const TIMESTAMP_HEADER: &str = "X-CMS-Timestamp";

/// Inbound signature verification failures.
///
/// Always surfaced as an authentication failure; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header is missing")]
    MissingSignature,

    #[error("signature does not match payload")]
    Mismatch,
}

/// Compute the hex-encoded HMAC-SHA256 of `payload` keyed by `secret`.
///
/// # Examples
///
/// ```rust
/// use cms_bridge_core::signing::{sign, verify};
///
/// let body = br#"{"event":"content.published"}"#;
/// let signature = sign(body, "shared-secret");
///
/// assert_eq!(signature.len(), 64);
/// assert!(verify(body, &signature, "shared-secret"));
/// ```
pub fn sign(payload: &[u8], secret: &str) -> String {
    hex::encode(digest(payload, secret))
}

/// Format a hex digest as a header value (`sha256=<hex>`).
pub fn signature_header_value(hex_digest: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex_digest)
}

/// Check `signature` against the HMAC of `payload` under `secret`.
///
/// The `sha256=` prefix is stripped when present. Signatures that are not
/// valid hex, or whose decoded length differs from a SHA-256 digest, are
/// reported as invalid rather than raising an error. The byte comparison runs
/// in constant time.
#[instrument(skip(payload, signature, secret), fields(payload_len = payload.len()))]
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> bool {
    let hex_part = signature
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or_else(|| signature.trim());

    let provided = match hex::decode(hex_part) {
        Ok(bytes) => bytes,
        Err(_) => {
            debug!("Signature is not valid hex");
            return false;
        }
    };

    let expected = digest(payload, secret);
    if provided.len() != expected.len() {
        debug!(
            provided_len = provided.len(),
            expected_len = expected.len(),
            "Signature length does not match digest length"
        );
        return false;
    }

    provided.ct_eq(&expected).into()
}

/// Verify the signature header of an inbound request.
///
/// # Errors
///
/// - [`SignatureError::MissingSignature`] when no header value was supplied
/// - [`SignatureError::Mismatch`] when the signature does not verify
pub fn verify_header(
    payload: &[u8],
    header_value: Option<&str>,
    secret: &str,
) -> Result<(), SignatureError> {
    let signature = header_value
        .filter(|value| !value.trim().is_empty())
        .ok_or(SignatureError::MissingSignature)?;

    if verify(payload, signature, secret) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn digest(payload: &[u8], secret: &str) -> Vec<u8> {
    // HMAC accepts keys of any length, including empty ones.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
#[path = "signing_tests.rs"]
mod tests;

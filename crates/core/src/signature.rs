use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC-SHA256 of a webhook body, in both directions.
pub const SIGNATURE_HEADER: &str = "x-outbound-token";

/// Lowercase hex HMAC-SHA256 of `payload` under `secret`.
pub fn sign(secret: &[u8], payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac = keyed(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `provided` against the signature of the raw, unparsed `body`.
pub fn verify(secret: &[u8], body: &[u8], provided: Option<&str>) -> Result<(), SignatureError> {
    let Some(provided) = provided.filter(|value| !value.is_empty()) else {
        return Err(SignatureError::Missing);
    };
    if !provided.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(SignatureError::Mismatch);
    }
    let expected = hex::decode(provided).map_err(|_| SignatureError::Mismatch)?;

    let mut mac = keyed(secret)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

fn keyed(secret: &[u8]) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret).map_err(|error| SignatureError::Key(error.to_string()))
}

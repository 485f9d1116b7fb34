use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign a request the Coinbase Exchange way:
/// base64(HMAC-SHA256(base64_decode(secret), timestamp + METHOD + path + body)).
/// `request_path` includes the query string.
pub fn sign_coinbase(
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
    secret_b64: &str,
) -> Result<String, String> {
    let secret = STANDARD
        .decode(secret_b64)
        .map_err(|e| format!("base64 decode error: {}", e))?;
    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|e| format!("HMAC error: {}", e))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.to_uppercase().as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

//! Shared-secret check for incoming connections.
//!
//! A client proves it knows the secret by sending it in a cookie on the
//! WebSocket handshake. Cookie headers from fronting proxies may carry
//! extra non `key=value` fragments, so parsing is lenient.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const DIGEST_CONTEXT: &[u8] = b"docfeed shared secret";

/// Validates the shared-secret cookie.
///
/// The secret is never compared directly: both sides are reduced to an
/// HMAC-SHA256 digest and checked with a constant-time comparison.
#[derive(Clone)]
pub struct SharedSecretValidator {
    cookie_name: String,
    expected: Vec<u8>,
}

impl SharedSecretValidator {
    /// Creates a validator for `secret`, read from the `cookie_name` cookie.
    pub fn new(cookie_name: impl Into<String>, secret: &str) -> ServerResult<Self> {
        Ok(Self {
            cookie_name: cookie_name.into(),
            expected: digest(secret.as_bytes())?,
        })
    }

    /// Cookie the secret is read from.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Checks a raw `Cookie` header value.
    pub fn validate_cookie_header(&self, raw: Option<&str>) -> ServerResult<()> {
        let value = raw
            .and_then(|raw| find_cookie(raw, &self.cookie_name))
            .ok_or_else(|| ServerError::NotAuthorized("missing secret cookie".into()))?;
        self.validate(value)
    }

    /// Checks a candidate secret.
    pub fn validate(&self, candidate: &str) -> ServerResult<()> {
        let mut mac = HmacSha256::new_from_slice(candidate.as_bytes())
            .map_err(|e| ServerError::NotAuthorized(e.to_string()))?;
        mac.update(DIGEST_CONTEXT);
        mac.verify_slice(&self.expected)
            .map_err(|_| ServerError::NotAuthorized("invalid secret".into()))
    }
}

impl std::fmt::Debug for SharedSecretValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretValidator")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

fn digest(secret: &[u8]) -> ServerResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    mac.update(DIGEST_CONTEXT);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Finds `name` in a raw `Cookie` header.
///
/// Fragments without `=` are skipped rather than failing the whole header.
pub fn find_cookie<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split(';')
        .map(str::trim)
        .filter_map(|fragment| fragment.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

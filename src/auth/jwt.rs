//! Bearer token verification (compact JWS, HMAC family).
//!
//! # Responsibilities
//! - Verify the signature with the shared secret
//! - Reject every algorithm outside HS256/HS384/HS512, including `none`
//! - Re-check `exp` so an expired token is reported as expired, not invalid
//! - Pull the principal identifier out of the claims
//!
//! # Design Decisions
//! - Pure CPU work, no I/O; safe to call on the request path
//! - Signature comparison is constant time (`Mac::verify_slice`)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use time::OffsetDateTime;

use crate::config::AuthConfig;

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub principal_id: String,
    pub expires_at: OffsetDateTime,
    pub issued_at: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Verifies tokens against one shared secret.
pub struct CredentialValidator {
    secret: Vec<u8>,
    principal_claim: String,
}

impl CredentialValidator {
    pub fn new(secret: impl Into<Vec<u8>>, principal_claim: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            principal_claim: principal_claim.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.secret_key.as_bytes(), config.principal_claim.clone())
    }

    pub fn validate(&self, token: &str) -> Result<IdentityClaim, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Validate against an explicit clock.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<IdentityClaim, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Invalid)?;
        let mut segments = signing_input.split('.');
        let (Some(header), Some(payload), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(TokenError::Invalid);
        };

        let header: Header = decode_json(header)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Invalid)?;

        let verified = match header.alg.as_str() {
            "HS256" => verify_mac::<Hmac<Sha256>>(&self.secret, signing_input.as_bytes(), &signature),
            "HS384" => verify_mac::<Hmac<Sha384>>(&self.secret, signing_input.as_bytes(), &signature),
            "HS512" => verify_mac::<Hmac<Sha512>>(&self.secret, signing_input.as_bytes(), &signature),
            _ => false,
        };
        if !verified {
            return Err(TokenError::Invalid);
        }

        let claims: Map<String, Value> = decode_json(payload)?;

        if let Some(nbf) = timestamp(&claims, "nbf")? {
            if nbf > now {
                return Err(TokenError::Invalid);
            }
        }

        let expires_at = timestamp(&claims, "exp")?.ok_or(TokenError::Invalid)?;
        if expires_at < now {
            return Err(TokenError::Expired);
        }

        let principal_id = claims
            .get(&self.principal_claim)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(TokenError::Invalid)?
            .to_string();

        Ok(IdentityClaim {
            principal_id,
            expires_at,
            issued_at: timestamp(&claims, "iat")?,
        })
    }

    /// Validate and return only the principal identifier.
    pub fn extract_principal(&self, token: &str) -> Result<String, TokenError> {
        self.validate(token).map(|claim| claim.principal_id)
    }
}

fn verify_mac<M>(secret: &[u8], message: &[u8], signature: &[u8]) -> bool
where
    M: Mac + hmac::digest::KeyInit,
{
    let Ok(mut mac) = <M as Mac>::new_from_slice(secret) else {
        return false;
    };
    Mac::update(&mut mac, message);
    mac.verify_slice(signature).is_ok()
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Invalid)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Invalid)
}

/// Read a NumericDate claim. Present but malformed is invalid.
fn timestamp(claims: &Map<String, Value>, name: &str) -> Result<Option<OffsetDateTime>, TokenError> {
    let Some(value) = claims.get(name) else {
        return Ok(None);
    };
    let seconds = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
        .ok_or(TokenError::Invalid)?;
    OffsetDateTime::from_unix_timestamp(seconds)
        .map(Some)
        .map_err(|_| TokenError::Invalid)
}

/// Produce a compact token. Test helper.
#[cfg(test)]
pub(crate) fn sign(alg: &str, claims: &Value, secret: &[u8]) -> String {
    let header = URL_SAFE_NO_PAD.encode(serde_json::json!({ "alg": alg, "typ": "JWT" }).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let input = format!("{}.{}", header, payload);

    let signature = match alg {
        "HS384" => {
            let mut mac = <Hmac<Sha384> as Mac>::new_from_slice(secret).unwrap();
            Mac::update(&mut mac, input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        "HS512" => {
            let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(secret).unwrap();
            Mac::update(&mut mac, input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        _ => {
            let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret).unwrap();
            Mac::update(&mut mac, input.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(signature))
}

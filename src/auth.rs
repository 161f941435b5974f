// src/auth.rs
//
// Signed, short-lived bearer tokens for the watcher → publisher hand-off.
// Tokens are minted fresh per outbound call and never reused past expiry.

use anyhow::{anyhow, Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const ISSUER: &str = "watcher";
pub const TOKEN_TTL_SECS: u64 = 60;

/// Small clock-skew allowance when checking expiry.
const LEEWAY_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayClaims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub iat: u64,
    pub exp: u64,
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

pub fn mint_token(secret: &str, source: Option<&str>) -> Result<String> {
    mint_token_with_ttl(secret, source, TOKEN_TTL_SECS)
}

pub fn mint_token_with_ttl(secret: &str, source: Option<&str>, ttl_secs: u64) -> Result<String> {
    let iat = unix_now();
    let claims = RelayClaims {
        iss: ISSUER.to_string(),
        source: source.map(str::to_string),
        iat,
        exp: iat + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("signing relay token")
}

/// Check an `Authorization` header value and return the verified claims.
///
/// Rejects missing headers, non-bearer schemes, bad signatures, wrong
/// issuers, and expired tokens. The scheme match is case-insensitive.
pub fn verify_bearer(secret: &str, header: Option<&str>) -> Result<RelayClaims> {
    let header = header.ok_or_else(|| anyhow!("missing Authorization header"))?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| anyhow!("invalid Authorization header format"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(anyhow!("invalid auth scheme"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(anyhow!("invalid Authorization header format"));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = LEEWAY_SECS;
    validation.set_issuer(&[ISSUER]);
    let data = decode::<RelayClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| anyhow!("invalid token: {e}"))?;
    Ok(data.claims)
}

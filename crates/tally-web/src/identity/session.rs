//! Signed session cookies.
//!
//! The cookie value is an HS256 JWT whose `sub` is a random session id. The
//! session id is what the vote store sees as the voter identity.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// A session minted for this request that still has to reach the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: String,
    pub set_cookie: String,
}

pub fn create_token(secret: &str, ttl_hours: u64, session_id: &str) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let claims = Claims {
        sub: session_id.to_string(),
        exp: (now + ttl_hours * 3600) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn verify_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Finds the value of cookie `name` across all `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

pub fn set_cookie_header(config: &IdentityConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        token,
        config.session_ttl_hours * 3600
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Returns the session id carried by a valid cookie, if any.
pub fn existing_session(config: &IdentityConfig, headers: &HeaderMap) -> Option<String> {
    let token = read_cookie(headers, &config.cookie_name)?;
    match verify_token(&config.secret, token) {
        Ok(claims) if !claims.sub.is_empty() => Some(claims.sub),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Discarding invalid session cookie: {e}");
            None
        }
    }
}

/// Mints a fresh session id and the cookie that carries it.
pub fn issue(config: &IdentityConfig) -> anyhow::Result<IssuedSession> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let token = create_token(&config.secret, config.session_ttl_hours, &session_id)?;
    tracing::debug!("Issued new voter session {session_id}");
    Ok(IssuedSession {
        set_cookie: set_cookie_header(config, &token),
        session_id,
    })
}

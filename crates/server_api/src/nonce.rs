//! Anti-forgery tokens for every mutating request.
//!
//! A token is an HS256 JWT naming who it was issued to and the exact action it
//! permits. Board-specific actions carry the board id in the action string, so
//! a token minted for one board is rejected on any other.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{domain::BoardId, error::ApiError};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct NonceConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Admin,
    /// Anyone viewing a rendered board.
    Visitor,
}

impl Identity {
    fn subject(self) -> &'static str {
        match self {
            Identity::Admin => "admin",
            Identity::Visitor => "visitor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Held in the admin cookie after a successful login.
    AdminSession,
    AddBoard,
    SaveBoard(BoardId),
    Toggle(BoardId),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AdminSession => f.write_str("bingo_admin_session"),
            Action::AddBoard => f.write_str("bingo_add"),
            Action::SaveBoard(id) => write!(f, "bingo_save:{}", id.0),
            Action::Toggle(id) => write!(f, "bingo_toggle:{}", id.0),
        }
    }
}

#[derive(Debug, Error)]
pub enum NonceError {
    #[error("anti-forgery token is missing")]
    Missing,
    #[error("anti-forgery token is invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("anti-forgery token was issued for another action")]
    WrongScope,
}

impl From<NonceError> for ApiError {
    fn from(err: NonceError) -> Self {
        ApiError::forbidden(err.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NonceClaims {
    sub: String,
    act: String,
    iat: i64,
    exp: i64,
}

pub fn mint(
    cfg: &NonceConfig,
    identity: Identity,
    action: Action,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = NonceClaims {
        sub: identity.subject().to_string(),
        act: action.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

pub fn verify(
    cfg: &NonceConfig,
    identity: Identity,
    action: Action,
    token: &str,
) -> Result<(), NonceError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(NonceError::Missing);
    }

    let decoded = decode::<NonceClaims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )?;

    let claims = decoded.claims;
    if claims.sub != identity.subject() || claims.act != action.to_string() {
        return Err(NonceError::WrongScope);
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/nonce_tests.rs"]
mod tests;

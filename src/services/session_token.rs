use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(thiserror::Error, Debug)]
pub enum SessionTokenError {
    #[error("Session token expired")]
    Expired,

    #[error("Invalid session token: {0}")]
    Invalid(String),

    #[error("Session token subject is not a creator id")]
    MalformedSubject,

    #[error("Failed to sign session token: {0}")]
    Signing(String),
}

impl From<SessionTokenError> for AppError {
    fn from(err: SessionTokenError) -> Self {
        match err {
            SessionTokenError::Signing(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            _ => AppError::Unauthorized,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Creator id, as a decimal string
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 session tokens
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, creator_id: i64) -> Result<String, SessionTokenError> {
        self.issue_with_ttl(creator_id, self.ttl)
    }

    pub fn issue_with_ttl(
        &self,
        creator_id: i64,
        ttl: Duration,
    ) -> Result<String, SessionTokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: creator_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionTokenError::Signing(e.to_string()))
    }

    /// Returns the creator id carried by a valid, unexpired token
    pub fn validate(&self, token: &str) -> Result<i64, SessionTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionTokenError::Expired,
                _ => SessionTokenError::Invalid(e.to_string()),
            })?;

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| SessionTokenError::MalformedSubject)
    }
}

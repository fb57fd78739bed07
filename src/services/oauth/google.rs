use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::AppError;

/// Google's public endpoint for checking id tokens
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("Google OAuth is not configured (GOOGLE_CLIENT_ID is unset)")]
    NotConfigured,

    #[error("Invalid Google token: {0}")]
    InvalidToken(String),

    #[error("Identity provider request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Identity provider error: {0}")]
    ProviderError(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotConfigured => AppError::Internal(anyhow::anyhow!(err.to_string())),
            IdentityError::InvalidToken(_) => AppError::Unauthorized,
            IdentityError::HttpError(_) | IdentityError::ProviderError(_) => {
                AppError::IdentityProvider(err.to_string())
            }
        }
    }
}

/// Identity asserted by the external provider
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Verifies a client-supplied id token and decodes the identity inside it
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: String,
    sub: String,
    aud: String,
    // tokeninfo encodes numbers as strings
    exp: String,
    email: Option<String>,
    name: Option<String>,
}

/// Checks Google id tokens against the tokeninfo endpoint
pub struct GoogleTokenVerifier {
    client: Client,
    client_id: Option<String>,
    tokeninfo_url: Url,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: Option<String>, tokeninfo_url: Url) -> Self {
        Self {
            client: Client::new(),
            client_id: client_id.filter(|id| !id.trim().is_empty()),
            tokeninfo_url,
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, IdentityError> {
        let client_id = self.client_id.as_deref().ok_or(IdentityError::NotConfigured)?;

        let response = self
            .client
            .get(self.tokeninfo_url.clone())
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => {
                return Err(IdentityError::InvalidToken(
                    "rejected by Google tokeninfo".to_string(),
                ))
            }
            other => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(IdentityError::ProviderError(format!(
                    "{}: {}",
                    other, error_text
                )));
            }
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| IdentityError::ProviderError(e.to_string()))?;

        if info.aud != client_id {
            return Err(IdentityError::InvalidToken("wrong audience".to_string()));
        }

        if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
            return Err(IdentityError::InvalidToken(format!(
                "unexpected issuer {}",
                info.iss
            )));
        }

        let exp: i64 = info
            .exp
            .parse()
            .map_err(|_| IdentityError::InvalidToken("malformed expiry".to_string()))?;
        if exp <= Utc::now().timestamp() {
            return Err(IdentityError::InvalidToken("token expired".to_string()));
        }

        tracing::debug!(subject = %info.sub, "Verified Google id token");

        Ok(ExternalIdentity {
            subject: info.sub,
            email: info.email,
            name: info.name,
        })
    }
}

use serde::Serialize;

use crate::db::{is_unique_violation, CreatorStore};
use crate::error::{AppError, Result};
use crate::models::{Creator, NewCreator};
use crate::services::oauth::{ExternalIdentity, IdentityVerifier};
use crate::services::session_token::SessionTokens;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Exchanges an external id token for a session token, registering the
/// creator on first login.
pub async fn login(
    creators: &dyn CreatorStore,
    verifier: &dyn IdentityVerifier,
    tokens: &SessionTokens,
    id_token: &str,
) -> Result<LoginResponse> {
    let identity = verifier.verify(id_token).await?;
    let creator = resolve_identity(creators, identity).await?;

    let access_token = tokens.issue(creator.id)?;

    tracing::info!(creator_id = creator.id, "Creator logged in");

    Ok(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    })
}

/// Finds the creator behind an external identity, matching by email or
/// Google subject, or creates an unverified one.
pub async fn resolve_identity(
    creators: &dyn CreatorStore,
    identity: ExternalIdentity,
) -> Result<Creator> {
    let email = identity
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Email not provided by Google".to_string()))?;

    if let Some(mut existing) = creators
        .find_creator_by_identity(&email, &identity.subject)
        .await?
    {
        if existing.google_id.is_none() {
            existing.google_id = Some(identity.subject);
            existing = creators.save_creator(&existing).await?;
            tracing::info!(creator_id = existing.id, "Linked Google account to existing creator");
        }
        return Ok(existing);
    }

    let name = identity
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

    let registration = creators
        .insert_creator(NewCreator {
            name,
            email: email.clone(),
            google_id: Some(identity.subject.clone()),
        })
        .await;

    match registration {
        Ok(creator) => {
            tracing::info!(creator_id = creator.id, "Registered new creator");
            Ok(creator)
        }
        // A concurrent first login registered the same account
        Err(e) if is_unique_violation(&e) => {
            let creator = creators
                .find_creator_by_identity(&email, &identity.subject)
                .await?
                .ok_or(AppError::Database(e))?;
            tracing::info!(creator_id = creator.id, "Reused creator registered concurrently");
            Ok(creator)
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolves a bearer session token to a live creator
pub async fn authenticate(
    creators: &dyn CreatorStore,
    tokens: &SessionTokens,
    token: &str,
) -> Result<Creator> {
    let creator_id = tokens.validate(token)?;

    creators
        .find_creator(creator_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

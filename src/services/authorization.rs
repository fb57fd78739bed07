use crate::error::AppError;
use crate::models::{Creator, DonationPoint};

/// A record with a single owning creator
pub trait Owned {
    fn owner_id(&self) -> i64;
}

impl Owned for DonationPoint {
    fn owner_id(&self) -> i64 {
        self.creator_id
    }
}

/// Creators own their own profile
impl Owned for Creator {
    fn owner_id(&self) -> i64 {
        self.id
    }
}

/// The one ownership rule applied to every mutation
pub fn can_mutate(identity: &Creator, resource: &impl Owned) -> bool {
    identity.id == resource.owner_id()
}

/// `can_mutate` as a guard, naming the resource kind in the error
pub fn ensure_can_mutate(
    identity: &Creator,
    resource: &impl Owned,
    kind: &str,
) -> Result<(), AppError> {
    if can_mutate(identity, resource) {
        Ok(())
    } else {
        tracing::warn!(
            creator_id = identity.id,
            owner_id = resource.owner_id(),
            kind,
            "Rejected mutation by non-owner"
        );
        Err(AppError::Forbidden(format!("Not authorized to modify this {}", kind)))
    }
}

/// Gate for actions reserved to verified creators
pub fn ensure_verified(identity: &Creator) -> Result<(), AppError> {
    if identity.verified {
        Ok(())
    } else {
        Err(AppError::Forbidden("Creator account not verified".to_string()))
    }
}

/// Administrators are configured by email
pub fn is_admin(identity: &Creator, admin_emails: &[String]) -> bool {
    admin_emails
        .iter()
        .any(|email| email.eq_ignore_ascii_case(&identity.email))
}

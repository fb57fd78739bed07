pub mod google;

pub use google::{ExternalIdentity, GoogleTokenVerifier, IdentityError, IdentityVerifier};

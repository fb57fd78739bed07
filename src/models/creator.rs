use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Creator {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCreator {
    pub name: String,
    pub email: String,
    pub google_id: Option<String>,
}

/// Self-service profile changes. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorQuery {
    /// Case-insensitive substring matched against name or email
    pub search: Option<String>,
    pub verified: Option<bool>,
}

impl CreatorQuery {
    pub fn matches(&self, creator: &Creator) -> bool {
        if let Some(verified) = self.verified {
            if creator.verified != verified {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => {
                let needle = needle.to_lowercase();
                creator.name.to_lowercase().contains(&needle)
                    || creator.email.to_lowercase().contains(&needle)
            }
            _ => true,
        }
    }
}

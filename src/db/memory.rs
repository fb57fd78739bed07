use async_trait::async_trait;
use chrono::Utc;
use sqlx::error::{DatabaseError, ErrorKind};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{CreatorStore, PointStore};
use crate::models::{Creator, CreatorQuery, DonationPoint, NewCreator, NewPoint, PointStatus};
use crate::services::search::PointFilter;

#[derive(Default)]
struct Tables {
    creators: BTreeMap<i64, Creator>,
    points: BTreeMap<i64, DonationPoint>,
    next_creator_id: i64,
    next_point_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Violation {
    Unique,
    ForeignKey,
}

/// Constraint failure reported the way Postgres reports it, so callers can
/// inspect it through `DatabaseError`
#[derive(Debug)]
struct ConstraintViolation {
    violation: Violation,
    message: &'static str,
}

impl ConstraintViolation {
    fn unique(message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Self {
            violation: Violation::Unique,
            message,
        }))
    }

    fn foreign_key(message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Self {
            violation: Violation::ForeignKey,
            message,
        }))
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl StdError for ConstraintViolation {}

impl DatabaseError for ConstraintViolation {
    fn message(&self) -> &str {
        self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(match self.violation {
            Violation::Unique => "23505",
            Violation::ForeignKey => "23503",
        }))
    }

    fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        match self.violation {
            Violation::Unique => ErrorKind::UniqueViolation,
            Violation::ForeignKey => ErrorKind::ForeignKeyViolation,
        }
    }
}

impl Tables {
    /// Mirrors the UNIQUE constraints on `creators.email` and `creators.google_id`
    fn check_unique_creator(
        &self,
        id: Option<i64>,
        email: &str,
        google_id: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        for other in self.creators.values().filter(|c| Some(c.id) != id) {
            if other.email == email {
                return Err(ConstraintViolation::unique(
                    "duplicate key value violates unique constraint \"creators_email_key\"",
                ));
            }
            if google_id.is_some() && other.google_id.as_deref() == google_id {
                return Err(ConstraintViolation::unique(
                    "duplicate key value violates unique constraint \"creators_google_id_key\"",
                ));
            }
        }
        Ok(())
    }
}

/// Process-local store used by tests and local runs without a database.
/// Ids are assigned sequentially starting at 1, like BIGSERIAL.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreatorStore for MemoryStore {
    async fn insert_creator(&self, data: NewCreator) -> Result<Creator, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        tables.check_unique_creator(None, &data.email, data.google_id.as_deref())?;
        tables.next_creator_id += 1;

        let creator = Creator {
            id: tables.next_creator_id,
            name: data.name,
            email: data.email,
            password_hash: None,
            google_id: data.google_id,
            verified: false,
            created_at: Utc::now(),
        };
        tables.creators.insert(creator.id, creator.clone());

        Ok(creator)
    }

    async fn find_creator(&self, id: i64) -> Result<Option<Creator>, sqlx::Error> {
        Ok(self.tables.lock().await.creators.get(&id).cloned())
    }

    async fn find_creator_by_email(&self, email: &str) -> Result<Option<Creator>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables.creators.values().find(|c| c.email == email).cloned())
    }

    async fn find_creator_by_identity(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<Creator>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .creators
            .values()
            .find(|c| c.email == email || c.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn list_creators(&self, query: &CreatorQuery) -> Result<Vec<Creator>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .creators
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect())
    }

    async fn save_creator(&self, creator: &Creator) -> Result<Creator, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        tables.check_unique_creator(
            Some(creator.id),
            &creator.email,
            creator.google_id.as_deref(),
        )?;
        let stored = tables
            .creators
            .get_mut(&creator.id)
            .ok_or(sqlx::Error::RowNotFound)?;

        stored.name = creator.name.clone();
        stored.email = creator.email.clone();
        stored.google_id = creator.google_id.clone();
        stored.verified = creator.verified;

        Ok(stored.clone())
    }

    async fn delete_creator(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().await;

        // ON DELETE RESTRICT
        if tables.points.values().any(|p| p.creator_id == id) {
            return Err(ConstraintViolation::foreign_key(
                "update or delete on table \"creators\" violates foreign key constraint",
            ));
        }

        Ok(tables.creators.remove(&id).is_some())
    }
}

#[async_trait]
impl PointStore for MemoryStore {
    async fn insert_point(
        &self,
        creator_id: i64,
        data: NewPoint,
    ) -> Result<DonationPoint, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        tables.next_point_id += 1;

        let point = DonationPoint {
            id: tables.next_point_id,
            creator_id,
            organization_name: data.organization_name,
            address: data.address,
            latitude: data.coordinates.latitude,
            longitude: data.coordinates.longitude,
            description: data.description,
            images: Vec::new(),
            start_date: data.start_date,
            end_date: data.end_date,
            status: PointStatus::Ongoing,
            created_at: Utc::now(),
        };
        tables.points.insert(point.id, point.clone());

        Ok(point)
    }

    async fn find_point(&self, id: i64) -> Result<Option<DonationPoint>, sqlx::Error> {
        Ok(self.tables.lock().await.points.get(&id).cloned())
    }

    async fn list(&self, filter: &PointFilter) -> Result<Vec<DonationPoint>, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .points
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn save_point(&self, point: &DonationPoint) -> Result<DonationPoint, sqlx::Error> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .points
            .get_mut(&point.id)
            .ok_or(sqlx::Error::RowNotFound)?;

        stored.status = point.status;
        stored.description = point.description.clone();
        stored.end_date = point.end_date;

        Ok(stored.clone())
    }

    async fn append_images(
        &self,
        id: i64,
        images: &[String],
    ) -> Result<Option<DonationPoint>, sqlx::Error> {
        let mut tables = self.tables.lock().await;

        Ok(tables.points.get_mut(&id).map(|point| {
            point.images.extend_from_slice(images);
            point.clone()
        }))
    }

    async fn delete_point(&self, id: i64) -> Result<bool, sqlx::Error> {
        Ok(self.tables.lock().await.points.remove(&id).is_some())
    }

    async fn count_points_by_creator(&self, creator_id: i64) -> Result<i64, sqlx::Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .points
            .values()
            .filter(|p| p.creator_id == creator_id)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{is_foreign_key_violation, is_unique_violation};
    use crate::services::geo::Coordinates;

    fn creator(email: &str, google_id: Option<&str>) -> NewCreator {
        NewCreator {
            name: "Someone".to_string(),
            email: email.to_string(),
            google_id: google_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_or_google_id_is_unique_violation() {
        let store = MemoryStore::new();
        store.insert_creator(creator("a@example.com", Some("g-1"))).await.unwrap();

        let same_email = store.insert_creator(creator("a@example.com", None)).await;
        assert!(is_unique_violation(&same_email.unwrap_err()));

        let same_subject = store.insert_creator(creator("b@example.com", Some("g-1"))).await;
        assert!(is_unique_violation(&same_subject.unwrap_err()));

        // Several creators without a Google account may coexist
        store.insert_creator(creator("c@example.com", None)).await.unwrap();
        store.insert_creator(creator("d@example.com", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_creator_with_points_is_restricted() {
        let store = MemoryStore::new();
        let owner = store.insert_creator(creator("a@example.com", None)).await.unwrap();
        store
            .insert_point(
                owner.id,
                NewPoint {
                    organization_name: "Pantry".to_string(),
                    address: "1 Elm".to_string(),
                    coordinates: Coordinates::new(0.0, 0.0).unwrap(),
                    description: None,
                    start_date: None,
                    end_date: None,
                },
            )
            .await
            .unwrap();

        let err = store.delete_creator(owner.id).await.unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(store.find_creator(owner.id).await.unwrap().is_some());
    }
}

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::{Creator, CreatorQuery, DonationPoint, NewCreator, NewPoint};
use crate::services::search::PointFilter;

pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// True for a violated UNIQUE constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// True for a violated FOREIGN KEY constraint
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Persistence of creator records
#[async_trait]
pub trait CreatorStore: Send + Sync {
    async fn insert_creator(&self, data: NewCreator) -> Result<Creator, sqlx::Error>;

    async fn find_creator(&self, id: i64) -> Result<Option<Creator>, sqlx::Error>;

    async fn find_creator_by_email(&self, email: &str) -> Result<Option<Creator>, sqlx::Error>;

    /// First creator whose email or Google subject matches
    async fn find_creator_by_identity(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<Creator>, sqlx::Error>;

    async fn list_creators(&self, query: &CreatorQuery) -> Result<Vec<Creator>, sqlx::Error>;

    /// Writes name, email, google_id and verified back to the record
    async fn save_creator(&self, creator: &Creator) -> Result<Creator, sqlx::Error>;

    async fn delete_creator(&self, id: i64) -> Result<bool, sqlx::Error>;
}

/// Persistence of donation point records
#[async_trait]
pub trait PointStore: Send + Sync {
    async fn insert_point(
        &self,
        creator_id: i64,
        data: NewPoint,
    ) -> Result<DonationPoint, sqlx::Error>;

    async fn find_point(&self, id: i64) -> Result<Option<DonationPoint>, sqlx::Error>;

    /// Points accepted by `filter`, in ascending id order
    async fn list(&self, filter: &PointFilter) -> Result<Vec<DonationPoint>, sqlx::Error>;

    /// Writes the owner-editable fields (status, description, end date)
    async fn save_point(&self, point: &DonationPoint) -> Result<DonationPoint, sqlx::Error>;

    /// Appends to the ordered image list, keeping earlier entries
    async fn append_images(
        &self,
        id: i64,
        images: &[String],
    ) -> Result<Option<DonationPoint>, sqlx::Error>;

    async fn delete_point(&self, id: i64) -> Result<bool, sqlx::Error>;

    async fn count_points_by_creator(&self, creator_id: i64) -> Result<i64, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

use async_trait::async_trait;
use sqlx::PgPool;

use super::{CreatorStore, PointStore};
use crate::models::{Creator, CreatorQuery, DonationPoint, NewCreator, NewPoint};
use crate::services::search::PointFilter;

/// PostgreSQL-backed store for creators and donation points
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE wildcards so user input only matches literally
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl CreatorStore for PgStore {
    async fn insert_creator(&self, data: NewCreator) -> Result<Creator, sqlx::Error> {
        let creator = sqlx::query_as::<_, Creator>(
            r#"
            INSERT INTO creators (name, email, google_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.google_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(creator)
    }

    async fn find_creator(&self, id: i64) -> Result<Option<Creator>, sqlx::Error> {
        sqlx::query_as::<_, Creator>(
            r#"
            SELECT * FROM creators WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_creator_by_email(&self, email: &str) -> Result<Option<Creator>, sqlx::Error> {
        sqlx::query_as::<_, Creator>(
            r#"
            SELECT * FROM creators WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_creator_by_identity(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<Creator>, sqlx::Error> {
        sqlx::query_as::<_, Creator>(
            r#"
            SELECT * FROM creators
            WHERE email = $1 OR google_id = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_creators(&self, query: &CreatorQuery) -> Result<Vec<Creator>, sqlx::Error> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        sqlx::query_as::<_, Creator>(
            r#"
            SELECT * FROM creators
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR email ILIKE $1)
              AND ($2::BOOLEAN IS NULL OR verified = $2)
            ORDER BY id
            "#,
        )
        .bind(pattern)
        .bind(query.verified)
        .fetch_all(&self.pool)
        .await
    }

    async fn save_creator(&self, creator: &Creator) -> Result<Creator, sqlx::Error> {
        sqlx::query_as::<_, Creator>(
            r#"
            UPDATE creators
            SET name = $2, email = $3, google_id = $4, verified = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(creator.id)
        .bind(&creator.name)
        .bind(&creator.email)
        .bind(&creator.google_id)
        .bind(creator.verified)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_creator(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM creators WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PointStore for PgStore {
    async fn insert_point(
        &self,
        creator_id: i64,
        data: NewPoint,
    ) -> Result<DonationPoint, sqlx::Error> {
        sqlx::query_as::<_, DonationPoint>(
            r#"
            INSERT INTO donation_points (
                creator_id, organization_name, address, latitude, longitude,
                description, start_date, end_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(creator_id)
        .bind(&data.organization_name)
        .bind(&data.address)
        .bind(data.coordinates.latitude)
        .bind(data.coordinates.longitude)
        .bind(&data.description)
        .bind(data.start_date)
        .bind(data.end_date)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_point(&self, id: i64) -> Result<Option<DonationPoint>, sqlx::Error> {
        sqlx::query_as::<_, DonationPoint>(
            r#"
            SELECT * FROM donation_points WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list(&self, filter: &PointFilter) -> Result<Vec<DonationPoint>, sqlx::Error> {
        match filter {
            PointFilter::Route(bbox) => {
                sqlx::query_as::<_, DonationPoint>(
                    r#"
                    SELECT * FROM donation_points
                    WHERE latitude BETWEEN $1 AND $2
                      AND longitude BETWEEN $3 AND $4
                    ORDER BY id
                    "#,
                )
                .bind(bbox.min_lat)
                .bind(bbox.max_lat)
                .bind(bbox.min_lng)
                .bind(bbox.max_lng)
                .fetch_all(&self.pool)
                .await
            }
            PointFilter::All | PointFilter::Radius { .. } => {
                let points = sqlx::query_as::<_, DonationPoint>(
                    r#"
                    SELECT * FROM donation_points ORDER BY id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?;

                // Distance is evaluated in-process over the full table
                Ok(points.into_iter().filter(|p| filter.matches(p)).collect())
            }
        }
    }

    async fn save_point(&self, point: &DonationPoint) -> Result<DonationPoint, sqlx::Error> {
        sqlx::query_as::<_, DonationPoint>(
            r#"
            UPDATE donation_points
            SET status = $2, description = $3, end_date = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(point.id)
        .bind(point.status)
        .bind(&point.description)
        .bind(point.end_date)
        .fetch_one(&self.pool)
        .await
    }

    async fn append_images(
        &self,
        id: i64,
        images: &[String],
    ) -> Result<Option<DonationPoint>, sqlx::Error> {
        sqlx::query_as::<_, DonationPoint>(
            r#"
            UPDATE donation_points
            SET images = array_cat(images, $2)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(images)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_point(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM donation_points WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_points_by_creator(&self, creator_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM donation_points WHERE creator_id = $1
            "#,
        )
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

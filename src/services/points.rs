use chrono::{DateTime, Utc};

use crate::db::PointStore;
use crate::error::{AppError, Result};
use crate::models::{Creator, DonationPoint, NewPoint, PointUpdate};
use crate::services::authorization::ensure_can_mutate;
use crate::services::geo::Coordinates;
use crate::services::image_store::{ImageStore, Upload};

/// Unvalidated fields of a point being published
#[derive(Debug, Clone, Default)]
pub struct PointSubmission {
    pub organization_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl PointSubmission {
    pub fn validate(self) -> Result<NewPoint> {
        let coordinates = Coordinates::new(self.latitude, self.longitude)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let organization_name = self.organization_name.trim().to_string();
        if organization_name.is_empty() {
            return Err(AppError::Validation(
                "Organization name is required".to_string(),
            ));
        }

        let address = self.address.trim().to_string();
        if address.is_empty() {
            return Err(AppError::Validation("Address is required".to_string()));
        }

        check_date_range(self.start_date, self.end_date)?;

        Ok(NewPoint {
            organization_name,
            address,
            coordinates,
            description: self.description.filter(|d| !d.trim().is_empty()),
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

fn check_date_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::Validation(
                "End date must not be before start date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Publishes a point, storing any attached images.
///
/// Either the point is created with all of its images, or nothing is kept:
/// an image failure after the record was inserted deletes the record again.
pub async fn create(
    points: &dyn PointStore,
    images: &ImageStore,
    creator: &Creator,
    submission: PointSubmission,
    uploads: Vec<Upload>,
) -> Result<DonationPoint> {
    let new_point = submission.validate()?;
    images.validate(&uploads)?;

    let point = points.insert_point(creator.id, new_point).await?;

    tracing::info!(point_id = point.id, creator_id = creator.id, "Donation point created");

    if uploads.is_empty() {
        return Ok(point);
    }

    match attach_images(points, images, point.id, &uploads).await {
        Ok(point) => Ok(point),
        Err(e) => {
            tracing::error!(
                point_id = point.id,
                error = %e,
                "Image upload failed, removing new point"
            );
            if let Err(cleanup) = points.delete_point(point.id).await {
                tracing::error!(
                    point_id = point.id,
                    error = %cleanup,
                    "Failed to remove point after image failure"
                );
            }
            Err(e)
        }
    }
}

pub async fn get(points: &dyn PointStore, id: i64) -> Result<DonationPoint> {
    points
        .find_point(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Donation point not found".to_string()))
}

/// Owner-only edit of status, description and end date
pub async fn update(
    points: &dyn PointStore,
    id: i64,
    changes: PointUpdate,
    requester: &Creator,
) -> Result<DonationPoint> {
    let mut point = get(points, id).await?;
    ensure_can_mutate(requester, &point, "donation point")?;

    if changes.is_empty() {
        return Ok(point);
    }

    if let Some(status) = changes.status {
        point.status = status;
    }
    if let Some(description) = changes.description {
        point.description = Some(description);
    }
    if let Some(end_date) = changes.end_date {
        check_date_range(point.start_date, Some(end_date))?;
        point.end_date = Some(end_date);
    }

    let saved = points.save_point(&point).await?;

    tracing::info!(point_id = saved.id, status = ?saved.status, "Donation point updated");

    Ok(saved)
}

/// Owner-only upload of additional images
pub async fn append_images(
    points: &dyn PointStore,
    images: &ImageStore,
    id: i64,
    uploads: Vec<Upload>,
    requester: &Creator,
) -> Result<DonationPoint> {
    let point = get(points, id).await?;
    ensure_can_mutate(requester, &point, "donation point")?;

    if uploads.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }

    attach_images(points, images, point.id, &uploads).await
}

/// Owner-only removal of a point and its stored images
pub async fn delete(
    points: &dyn PointStore,
    images: &ImageStore,
    id: i64,
    requester: &Creator,
) -> Result<()> {
    let point = get(points, id).await?;
    ensure_can_mutate(requester, &point, "donation point")?;

    points.delete_point(point.id).await?;

    for reference in &point.images {
        if let Err(e) = images.remove(reference).await {
            tracing::warn!(
                point_id = point.id,
                reference = %reference,
                error = %e,
                "Failed to remove image file"
            );
        }
    }

    tracing::info!(point_id = point.id, "Donation point deleted");

    Ok(())
}

async fn attach_images(
    points: &dyn PointStore,
    images: &ImageStore,
    point_id: i64,
    uploads: &[Upload],
) -> Result<DonationPoint> {
    let references = images.store(point_id, uploads).await?;

    let recorded = match points.append_images(point_id, &references).await {
        Ok(Some(point)) => Ok(point),
        Ok(None) => Err(AppError::NotFound("Donation point not found".to_string())),
        Err(e) => Err(AppError::Database(e)),
    };

    if recorded.is_err() {
        for reference in &references {
            if let Err(e) = images.remove(reference).await {
                tracing::warn!(
                    point_id,
                    reference = %reference,
                    error = %e,
                    "Failed to remove orphaned image"
                );
            }
        }
    }

    recorded
}

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::auth::CurrentCreator;
use crate::api::state::AppState;
use crate::error::{AppError, Result};
use crate::models::donation_point::parse_timestamp;
use crate::models::{DonationPoint, PointUpdate};
use crate::services::authorization;
use crate::services::image_store::Upload;
use crate::services::points::{self, PointSubmission};
use crate::services::search::{self, SearchParams};

struct PointForm {
    submission: PointSubmission,
    uploads: Vec<Upload>,
}

/// Reads the multipart body of the create endpoint
async fn read_point_form(mut multipart: Multipart) -> Result<PointForm> {
    let mut organization_name = None;
    let mut address = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut description = None;
    let mut start_date = None;
    let mut end_date = None;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        // Any part carrying a file name is an upload, whatever its field name
        if let Some(file_name) = field.file_name().map(str::to_string) {
            // Browsers send an empty part when no file was chosen
            if !file_name.is_empty() {
                let bytes = field.bytes().await?;
                uploads.push(Upload { file_name, bytes });
            }
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "organization_name" => organization_name = Some(value),
            "address" => address = Some(value),
            "latitude" => latitude = Some(parse_number("latitude", &value)?),
            "longitude" => longitude = Some(parse_number("longitude", &value)?),
            "description" => description = non_empty(value),
            "start_date" => start_date = parse_optional_date("start_date", &value)?,
            "end_date" => end_date = parse_optional_date("end_date", &value)?,
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(PointForm {
        submission: PointSubmission {
            organization_name: organization_name.ok_or_else(|| missing("organization_name"))?,
            address: address.ok_or_else(|| missing("address"))?,
            latitude: latitude.ok_or_else(|| missing("latitude"))?,
            longitude: longitude.ok_or_else(|| missing("longitude"))?,
            description,
            start_date,
            end_date,
        },
        uploads,
    })
}

/// Collects the files of an image-append request
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            continue;
        }
        let bytes = field.bytes().await?;
        uploads.push(Upload { file_name, bytes });
    }

    Ok(uploads)
}

fn missing(field: &str) -> AppError {
    AppError::Validation(format!("Missing required field: {}", field))
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

fn parse_number(field: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| AppError::Validation(format!("{} must be a number", field)))
}

fn parse_optional_date(
    field: &str,
    value: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_timestamp(value)
        .map(Some)
        .ok_or_else(|| AppError::Validation(format!("{} is not a valid date", field)))
}

async fn create_point(
    State(state): State<AppState>,
    CurrentCreator(creator): CurrentCreator,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DonationPoint>)> {
    if state.settings.require_verified_publishers {
        authorization::ensure_verified(&creator)?;
    }

    let form = read_point_form(multipart).await?;
    let point = points::create(
        state.points.as_ref(),
        &state.images,
        &creator,
        form.submission,
        form.uploads,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(point)))
}

/// Radius, route or unfiltered listing depending on the query parameters
async fn search_points(
    State(state): State<AppState>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<DonationPoint>>> {
    let Query(params) = params?;
    let found = search::search(state.points.as_ref(), &params, &state.settings.search).await?;

    Ok(Json(found))
}

async fn get_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DonationPoint>> {
    Ok(Json(points::get(state.points.as_ref(), id).await?))
}

async fn update_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    CurrentCreator(requester): CurrentCreator,
    payload: std::result::Result<Json<PointUpdate>, JsonRejection>,
) -> Result<Json<DonationPoint>> {
    let Json(changes) = payload?;
    let point = points::update(state.points.as_ref(), id, changes, &requester).await?;

    Ok(Json(point))
}

async fn append_images(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    CurrentCreator(requester): CurrentCreator,
    multipart: Multipart,
) -> Result<Json<DonationPoint>> {
    let uploads = read_uploads(multipart).await?;
    let point = points::append_images(
        state.points.as_ref(),
        &state.images,
        id,
        uploads,
        &requester,
    )
    .await?;

    Ok(Json(point))
}

async fn delete_point(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    CurrentCreator(requester): CurrentCreator,
) -> Result<StatusCode> {
    points::delete(state.points.as_ref(), &state.images, id, &requester).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/donation-points", get(search_points).post(create_point))
        .route(
            "/api/donation-points/:id",
            get(get_point).patch(update_point).delete(delete_point),
        )
        .route("/api/donation-points/:id/images", post(append_images))
}

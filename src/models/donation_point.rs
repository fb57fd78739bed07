use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::services::geo::Coordinates;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PointStatus {
    #[default]
    Ongoing,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DonationPoint {
    pub id: i64,
    pub creator_id: i64,
    pub organization_name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: PointStatus,
    pub created_at: DateTime<Utc>,
}

impl DonationPoint {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new_unchecked(self.latitude, self.longitude)
    }
}

/// Fields supplied when publishing a point. Coordinates are already validated.
#[derive(Debug, Clone)]
pub struct NewPoint {
    pub organization_name: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Owner-editable fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointUpdate {
    pub status: Option<PointStatus>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
}

impl PointUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.description.is_none() && self.end_date.is_none()
    }
}

/// Parses RFC 3339 timestamps, or the `YYYY-MM-DDTHH:MM[:SS]` form browsers
/// send from `datetime-local` inputs (interpreted as UTC).
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;

    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", value))),
    }
}

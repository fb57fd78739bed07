use serde::Deserialize;

use crate::db::PointStore;
use crate::error::{AppError, Result};
use crate::models::DonationPoint;
use crate::services::geo::{haversine_km, BoundingBox, Coordinates};

/// Smallest accepted search radius, in kilometers
pub const MIN_RADIUS_KM: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 10.0,
            max_radius_km: 1000.0,
        }
    }
}

/// Raw query string parameters of the search endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius: Option<f64>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
}

/// Predicate over stored points. Stores receive this instead of raw SQL so an
/// indexed implementation can answer the same filter differently.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum PointFilter {
    #[default]
    All,
    Radius { center: Coordinates, radius_km: f64 },
    Route(BoundingBox),
}

impl PointFilter {
    /// Picks the search mode. Radius wins over route when both are supplied.
    pub fn from_params(params: &SearchParams, config: &SearchConfig) -> Result<Self> {
        if let (Some(lat), Some(lng)) = (params.lat, params.lng) {
            let center = validated(lat, lng)?;
            let radius_km = params.radius.unwrap_or(config.default_radius_km);

            if !(MIN_RADIUS_KM..=config.max_radius_km).contains(&radius_km) {
                return Err(AppError::Validation(format!(
                    "Radius must be between {} and {} km",
                    MIN_RADIUS_KM, config.max_radius_km
                )));
            }

            return Ok(PointFilter::Radius { center, radius_km });
        }

        if let (Some(start_lat), Some(start_lng), Some(end_lat), Some(end_lng)) = (
            params.start_lat,
            params.start_lng,
            params.end_lat,
            params.end_lng,
        ) {
            let start = validated(start_lat, start_lng)?;
            let end = validated(end_lat, end_lng)?;

            return Ok(PointFilter::Route(BoundingBox::spanning(start, end)));
        }

        Ok(PointFilter::All)
    }

    pub fn matches(&self, point: &DonationPoint) -> bool {
        match self {
            PointFilter::All => true,
            PointFilter::Radius { center, radius_km } => {
                haversine_km(*center, point.coordinates()) <= *radius_km
            }
            PointFilter::Route(bbox) => bbox.contains(point.coordinates()),
        }
    }
}

fn validated(lat: f64, lng: f64) -> Result<Coordinates> {
    Coordinates::new(lat, lng).map_err(|e| AppError::Validation(e.to_string()))
}

/// Runs a search against the store
pub async fn search(
    store: &dyn PointStore,
    params: &SearchParams,
    config: &SearchConfig,
) -> Result<Vec<DonationPoint>> {
    let filter = PointFilter::from_params(params, config)?;
    let points = store.list(&filter).await?;

    tracing::debug!(?filter, results = points.len(), "Donation point search");

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::CreatorStore;
    use crate::models::{NewCreator, NewPoint};

    async fn seeded_store(coords: &[(f64, f64)]) -> MemoryStore {
        let store = MemoryStore::new();
        let creator = store
            .insert_creator(NewCreator {
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                google_id: None,
            })
            .await
            .unwrap();

        for (i, (lat, lng)) in coords.iter().enumerate() {
            store
                .insert_point(
                    creator.id,
                    NewPoint {
                        organization_name: format!("Org {}", i),
                        address: format!("{} Main St", i),
                        coordinates: Coordinates::new(*lat, *lng).unwrap(),
                        description: None,
                        start_date: None,
                        end_date: None,
                    },
                )
                .await
                .unwrap();
        }

        store
    }

    fn names(points: &[DonationPoint]) -> Vec<String> {
        points.iter().map(|p| p.organization_name.clone()).collect()
    }

    #[test]
    fn test_mode_selection() {
        let config = SearchConfig::default();

        let all = PointFilter::from_params(&SearchParams::default(), &config).unwrap();
        assert_eq!(all, PointFilter::All);

        let partial = SearchParams {
            lat: Some(1.0),
            start_lat: Some(1.0),
            ..Default::default()
        };
        assert_eq!(PointFilter::from_params(&partial, &config).unwrap(), PointFilter::All);

        let both = SearchParams {
            lat: Some(0.0),
            lng: Some(0.0),
            start_lat: Some(0.0),
            start_lng: Some(0.0),
            end_lat: Some(1.0),
            end_lng: Some(1.0),
            ..Default::default()
        };
        assert!(matches!(
            PointFilter::from_params(&both, &config).unwrap(),
            PointFilter::Radius { radius_km, .. } if radius_km == 10.0
        ));
    }

    #[test]
    fn test_radius_bounds_are_validated() {
        let config = SearchConfig::default();
        let params = |radius| SearchParams {
            lat: Some(0.0),
            lng: Some(0.0),
            radius: Some(radius),
            ..Default::default()
        };

        assert!(PointFilter::from_params(&params(0.05), &config).is_err());
        assert!(PointFilter::from_params(&params(1000.5), &config).is_err());
        assert!(PointFilter::from_params(&params(f64::NAN), &config).is_err());
        assert!(PointFilter::from_params(&params(1000.0), &config).is_ok());
    }

    #[test]
    fn test_out_of_range_center_is_rejected() {
        let params = SearchParams {
            lat: Some(91.0),
            lng: Some(0.0),
            ..Default::default()
        };

        let result = PointFilter::from_params(&params, &SearchConfig::default());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_radius_search_includes_and_excludes_by_distance() {
        // Org 1 sits ~111.2 km east of the origin
        let store = seeded_store(&[(0.0, 0.0), (0.0, 1.0)]).await;
        let config = SearchConfig::default();

        let near = SearchParams {
            lat: Some(0.0),
            lng: Some(0.0),
            radius: Some(100.0),
            ..Default::default()
        };
        let wide = SearchParams {
            radius: Some(120.0),
            ..near.clone()
        };

        assert_eq!(names(&search(&store, &near, &config).await.unwrap()), ["Org 0"]);
        assert_eq!(
            names(&search(&store, &wide, &config).await.unwrap()),
            ["Org 0", "Org 1"]
        );
    }

    #[tokio::test]
    async fn test_radius_boundary_is_inclusive() {
        let store = seeded_store(&[(0.0, 1.0)]).await;
        let exact = haversine_km(
            Coordinates::new(0.0, 0.0).unwrap(),
            Coordinates::new(0.0, 1.0).unwrap(),
        );
        let filter = PointFilter::Radius {
            center: Coordinates::new(0.0, 0.0).unwrap(),
            radius_km: exact,
        };

        assert_eq!(store.list(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_route_search_is_order_independent() {
        let store = seeded_store(&[(0.5, 0.5), (2.0, 2.0), (1.0, 0.0), (-0.1, 0.5)]).await;
        let config = SearchConfig::default();

        let forward = SearchParams {
            start_lat: Some(0.0),
            start_lng: Some(0.0),
            end_lat: Some(1.0),
            end_lng: Some(1.0),
            ..Default::default()
        };
        let reverse = SearchParams {
            start_lat: Some(1.0),
            start_lng: Some(1.0),
            end_lat: Some(0.0),
            end_lng: Some(0.0),
            ..Default::default()
        };

        let a = names(&search(&store, &forward, &config).await.unwrap());
        let b = names(&search(&store, &reverse, &config).await.unwrap());

        assert_eq!(a, ["Org 0", "Org 2"]);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_default_search_returns_everything() {
        let store = seeded_store(&[(10.0, 10.0), (-40.0, 100.0)]).await;

        let all = search(&store, &SearchParams::default(), &SearchConfig::default())
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
    }
}

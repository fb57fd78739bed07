// API module - HTTP endpoints

pub mod admin;
pub mod creators;
pub mod donation_points;
pub mod health;
pub mod images;
pub mod middleware;
pub mod state;

use axum::Router;

use crate::api::state::AppState;

/// Every route of the service, still waiting for its state
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(creators::router())
        .merge(admin::router())
        .merge(donation_points::router())
        .merge(images::router())
}

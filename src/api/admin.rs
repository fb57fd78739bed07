use axum::{extract::State, routing::{get, post}, Json, Router};

use crate::api::creators::{unverify_creator, verify_creator};
use crate::api::middleware::auth::AdminCreator;
use crate::api::state::AppState;
use crate::error::Result;
use crate::models::{Creator, CreatorQuery};
use crate::services::creators;

async fn list_all_creators(
    State(state): State<AppState>,
    AdminCreator(_admin): AdminCreator,
) -> Result<Json<Vec<Creator>>> {
    Ok(Json(
        creators::list(state.creators.as_ref(), &CreatorQuery::default()).await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/creators", get(list_all_creators))
        .route("/api/admin/creators/:id/verify", post(verify_creator))
        .route("/api/admin/creators/:id/unverify", post(unverify_creator))
}

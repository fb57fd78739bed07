use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::auth::{AdminCreator, CurrentCreator};
use crate::api::state::AppState;
use crate::error::Result;
use crate::models::{Creator, CreatorQuery, CreatorUpdate};
use crate::services::auth::{self, LoginResponse};
use crate::services::creators;

#[derive(Deserialize)]
struct GoogleLogin {
    id_token: String,
}

/// Login or first-time registration with a Google id token
async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GoogleLogin>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = payload?;

    let response = auth::login(
        state.creators.as_ref(),
        state.identity.as_ref(),
        &state.tokens,
        &body.id_token,
    )
    .await?;

    Ok(Json(response))
}

async fn me(CurrentCreator(creator): CurrentCreator) -> Json<Creator> {
    Json(creator)
}

async fn list_creators(
    State(state): State<AppState>,
    query: std::result::Result<Query<CreatorQuery>, QueryRejection>,
) -> Result<Json<Vec<Creator>>> {
    let Query(query) = query?;

    Ok(Json(creators::list(state.creators.as_ref(), &query).await?))
}

async fn get_creator(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Creator>> {
    Ok(Json(creators::get(state.creators.as_ref(), id).await?))
}

async fn update_creator(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    CurrentCreator(requester): CurrentCreator,
    payload: std::result::Result<Json<CreatorUpdate>, JsonRejection>,
) -> Result<Json<Creator>> {
    let Json(changes) = payload?;
    let creator = creators::update(state.creators.as_ref(), id, changes, &requester).await?;

    Ok(Json(creator))
}

async fn delete_creator(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    CurrentCreator(requester): CurrentCreator,
) -> Result<StatusCode> {
    creators::delete(state.creators.as_ref(), state.points.as_ref(), id, &requester).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn verify_creator(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminCreator(admin): AdminCreator,
) -> Result<Json<Creator>> {
    Ok(Json(
        creators::set_verified(state.creators.as_ref(), id, true, &admin).await?,
    ))
}

pub(crate) async fn unverify_creator(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AdminCreator(admin): AdminCreator,
) -> Result<Json<Creator>> {
    Ok(Json(
        creators::set_verified(state.creators.as_ref(), id, false, &admin).await?,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/creators", get(list_creators))
        .route("/api/creators/login", post(login))
        .route("/api/creators/me", get(me))
        .route(
            "/api/creators/:id",
            get(get_creator).patch(update_creator).delete(delete_creator),
        )
        .route("/api/creators/:id/verify", post(verify_creator))
}

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::api::state::AppState;
use crate::error::Result;

/// Serves a stored image; anything resolving outside the upload root is refused
async fn serve_image(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Result<Response> {
    let file = state.images.locate(&path).await?;

    let mut response = match ServeFile::new(file).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );

    Ok(response)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/*path", get(serve_image))
}

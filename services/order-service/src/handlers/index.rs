use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::state::AppState;

const NO_CACHE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Serve the lookup page from the static directory
pub async fn index_handler(State(state): State<AppState>) -> Response {
    let path = state.static_dir.join("index.html");

    match tokio::fs::read(&path).await {
        Ok(body) => (
            [
                (header::CACHE_CONTROL, NO_CACHE),
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

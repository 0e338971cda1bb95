use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::error;

use crate::AppState;

/// GET /api/stores/:slug. Public store read for the storefront
/// renderer: active store plus its products in template order.
#[utoipa::path(
    get,
    path = "/api/stores/{slug}",
    params(("slug" = String, Path, description = "Store slug")),
    responses(
        (status = 200, description = "Store with products"),
        (status = 404, description = "No active store at this slug")
    ),
    tag = "Stores"
)]
pub async fn get_store(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.services.stores.get_store_by_slug(&slug).await {
        Ok(Some(store)) => (StatusCode::OK, Json(json!({ "success": true, "store": store }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Store not found" })),
        ),
        Err(e) => {
            error!(%slug, error = %e, "failed to fetch store");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to fetch store" })),
            )
        }
    }
}

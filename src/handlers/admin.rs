//! Admin control surface: thin operational commands over the
//! orchestrator, guarded by a shared-secret header rather than
//! session auth.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::OrderStatus;
use crate::AppState;

const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

fn is_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let provided = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(secret) => !state.config.admin_secret.is_empty() && secret == state.config.admin_secret,
        None => false,
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListOrdersQuery {
    /// Filter by order status
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    20
}

/// GET /api/admin/orders
#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders with pagination"),
        (status = 401, description = "Missing or wrong admin secret")
    ),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListOrdersQuery>,
) -> impl IntoResponse {
    if !is_authorized(&state, &headers) {
        return unauthorized();
    }

    let status = match query.status.as_deref() {
        Some(raw) => match OrderStatus::parse(raw) {
            Ok(status) => Some(status),
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "success": false, "error": e.response_message() })),
                )
            }
        },
        None => None,
    };

    match state
        .services
        .orders
        .list_orders(status, query.limit, query.offset)
        .await
    {
        Ok(list) => {
            let has_more = (query.offset + list.orders.len() as u64) < list.total;
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "orders": list.orders,
                    "pagination": {
                        "total": list.total,
                        "limit": query.limit,
                        "offset": query.offset,
                        "hasMore": has_more,
                    },
                })),
            )
        }
        Err(e) => {
            error!(error = %e, "failed to list orders");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to fetch orders" })),
            )
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderActionRequest {
    pub action: String,
    pub order_id: Uuid,
}

/// POST /api/admin/orders. Manual order operations.
#[utoipa::path(
    post,
    path = "/api/admin/orders",
    responses(
        (status = 200, description = "Action applied"),
        (status = 400, description = "Invalid action or order not in an actionable status"),
        (status = 401, description = "Missing or wrong admin secret"),
        (status = 404, description = "Order not found")
    ),
    tag = "Admin"
)]
pub async fn order_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OrderActionRequest>,
) -> impl IntoResponse {
    if !is_authorized(&state, &headers) {
        return unauthorized();
    }

    match request.action.as_str() {
        "retry-deploy" => {
            match state.services.orders.retry_deploy(request.order_id).await {
                Ok(()) => (
                    StatusCode::OK,
                    Json(json!({ "success": true, "message": "Deployment retried" })),
                ),
                Err(ServiceError::NotFound(_)) => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "Order not found" })),
                ),
                Err(ServiceError::InvalidStatus(_)) => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Order cannot be redeployed" })),
                ),
                Err(e) => {
                    error!(order_id = %request.order_id, error = %e, "retry-deploy failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "success": false, "error": "Action failed" })),
                    )
                }
            }
        }
        "mark-refunded" => {
            match state.services.orders.mark_refunded(request.order_id).await {
                Ok(()) => (
                    StatusCode::OK,
                    Json(json!({ "success": true, "message": "Order marked as refunded" })),
                ),
                Err(ServiceError::NotFound(_)) => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "Order not found" })),
                ),
                Err(ServiceError::InvalidStatus(_)) | Err(ServiceError::Conflict(_)) => (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Order cannot be refunded" })),
                ),
                Err(e) => {
                    error!(order_id = %request.order_id, error = %e, "mark-refunded failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "success": false, "error": "Action failed" })),
                    )
                }
            }
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid action" })),
        ),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub order_id: Option<Uuid>,
    pub store_slug: Option<String>,
    #[serde(default)]
    pub full_deploy: bool,
}

/// POST /api/admin/deploy. Manual deployment trigger, by slug, by
/// order id, or full-site.
#[utoipa::path(
    post,
    path = "/api/admin/deploy",
    responses(
        (status = 200, description = "Deployment triggered"),
        (status = 400, description = "Neither a slug nor fullDeploy given"),
        (status = 401, description = "Missing or wrong admin secret"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Deploy trigger reported failure")
    ),
    tag = "Admin"
)]
pub async fn trigger_deploy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DeployRequest>,
) -> impl IntoResponse {
    if !is_authorized(&state, &headers) {
        return unauthorized();
    }

    let mut slug = request.store_slug.clone();
    if let Some(order_id) = request.order_id {
        match state.services.orders.get_order(order_id).await {
            Ok(Some(order)) => slug = Some(order.store_slug),
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "Order not found" })),
                )
            }
            Err(e) => {
                error!(order_id = %order_id, error = %e, "failed to resolve order for deploy");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "error": "Deployment failed" })),
                );
            }
        }
    }

    let success = if request.full_deploy {
        state.services.deploy.trigger_full_deploy().await
    } else {
        match &slug {
            Some(slug) => state.services.deploy.trigger_deploy(slug).await,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Store slug or orderId required" })),
                )
            }
        }
    };

    if !success {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Deployment trigger failed" })),
        );
    }

    info!(
        order_id = ?request.order_id,
        store_slug = ?slug,
        full_deploy = request.full_deploy,
        "manual deploy triggered"
    );

    let message = if request.full_deploy {
        "Full deployment triggered".to_string()
    } else {
        format!(
            "Deployment triggered for {}",
            slug.unwrap_or_default()
        )
    };
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": message })),
    )
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::error;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::OrderStatus;
use crate::services::orders::CreateOrderRequest;
use crate::AppState;

/// Maps a Rust field name to the camelCase name used in the JSON body,
/// so validation errors reference the fields the client sent.
fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn validation_error_map(errors: &validator::ValidationErrors) -> Value {
    let mut map = serde_json::Map::new();
    for (field, field_errors) in errors.field_errors() {
        let message = field_errors
            .iter()
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid value".to_string());
        map.insert(to_camel_case(field), Value::String(message));
    }
    Value::Object(map)
}

/// POST /api/checkout
#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created; paymentUrl is the hosted payment page (paid plans) or the new storefront URL (free plan)"),
        (status = 400, description = "Validation failed (field-level errors) or payment bill creation failed")
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    if let Err(errors) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Validation failed",
                "errors": validation_error_map(&errors),
            })),
        );
    }

    match state.services.orders.create_order(request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "orderId": outcome.order_id,
                "orderNumber": outcome.order_number,
                "paymentUrl": outcome.payment_url,
            })),
        ),
        Err(ServiceError::PaymentFailed(message)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": message })),
        ),
        Err(e) => {
            error!(error = %e, "checkout failed");
            (
                e.status_code(),
                Json(json!({ "success": false, "error": e.response_message() })),
            )
        }
    }
}

/// GET /api/orders/:order_number. Status lookup for the thank-you
/// page the payment return URL lands on. Public, so it exposes no
/// customer details.
#[utoipa::path(
    get,
    path = "/api/orders/{order_number}",
    params(("order_number" = String, Path, description = "Human-facing order number")),
    responses(
        (status = 200, description = "Order status"),
        (status = 404, description = "Unknown order number")
    ),
    tag = "Checkout"
)]
pub async fn order_status(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> impl IntoResponse {
    match state.services.orders.get_order_by_number(&order_number).await {
        Ok(Some(order)) => {
            let store_url = (order.status == OrderStatus::Completed.to_string())
                .then(|| state.services.orders.store_url(&order.store_slug));
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "order": {
                        "orderNumber": order.order_number,
                        "status": order.status,
                        "planType": order.plan_type,
                        "amount": order.amount,
                        "paymentUrl": order.payment_url,
                        "storeUrl": store_url,
                    },
                })),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "Order not found" })),
        ),
        Err(e) => {
            error!(%order_number, error = %e, "failed to fetch order");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to fetch order" })),
            )
        }
    }
}

//! ToyyibPay webhook boundary.
//!
//! Policy: regardless of internal outcome the provider gets a
//! success-shaped acknowledgement, so its retry mechanism cannot flood
//! the endpoint; the true outcome lives in the idempotency ledger and
//! the order status. The single exception is a webhook that fails
//! verification, which is rejected with a client error.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::events::Event;
use crate::handlers::AppServices;
use crate::services::payments::{self, WebhookPayload, PROVIDER};
use crate::AppState;

const ENDPOINT: &str = "/api/webhooks/toyyibpay";

fn ack_success() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true })))
}

fn ack_message(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": message })),
    )
}

fn ack_failure() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "success": false, "error": "Processing error" })),
    )
}

fn parse_payload(headers: &HeaderMap, body: &Bytes) -> Option<WebhookPayload> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.contains("application/x-www-form-urlencoded") {
        Some(WebhookPayload::from_form_bytes(body))
    } else {
        serde_json::from_slice(body).ok()
    }
}

async fn finish(services: &AppServices, entry_id: Uuid, error_message: Option<String>) {
    if let Err(e) = services.ledger.mark_processed(entry_id, error_message).await {
        error!(error = %e, "failed to mark webhook processed");
    }
}

/// POST /api/webhooks/toyyibpay
#[utoipa::path(
    post,
    path = "/api/webhooks/toyyibpay",
    request_body = String,
    responses(
        (status = 200, description = "Acknowledged; actual outcome is recorded in the ledger and order status"),
        (status = 400, description = "Webhook failed gateway verification")
    ),
    tag = "Webhooks"
)]
pub async fn toyyibpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(payload) = parse_payload(&headers, &body) else {
        warn!("unparseable webhook body");
        return ack_failure();
    };

    info!(
        billcode = %payload.billcode,
        status = %payload.status,
        "payment webhook received"
    );

    let services = &state.services;
    let event_id = payload.event_id();

    match services.ledger.check(PROVIDER, &event_id).await {
        Ok(check) if check.is_duplicate => {
            info!(billcode = %payload.billcode, "duplicate webhook ignored");
            return ack_message("Already processed");
        }
        Ok(_) => {}
        // The insert below still arbitrates duplicates; a failed
        // lookup alone does not justify dropping the delivery.
        Err(e) => warn!(error = %e, "idempotency lookup failed; continuing"),
    }

    let raw_payload = serde_json::to_value(&payload).unwrap_or_else(|_| json!({}));
    let entry_id = match services
        .ledger
        .record(PROVIDER, &event_id, &raw_payload, ENDPOINT)
        .await
    {
        Ok(Some(entry_id)) => entry_id,
        Ok(None) => {
            info!(billcode = %payload.billcode, "concurrent duplicate webhook ignored");
            return ack_message("Already processed");
        }
        Err(e) => {
            error!(error = %e, "failed to record webhook event");
            return ack_failure();
        }
    };

    let verification = services.gateway.verify_webhook(&payload).await;
    if !verification.is_valid {
        warn!(billcode = %payload.billcode, "webhook verification failed");
        finish(services, entry_id, Some("Verification failed".to_string())).await;
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Invalid webhook" })),
        );
    }

    if !payments::is_payment_successful(&payload.status) {
        info!(status = %payload.status, reason = %payload.reason, "payment not successful");
        finish(
            services,
            entry_id,
            Some(format!("Payment failed: {}", payload.reason)),
        )
        .await;
        return ack_message("Payment not successful");
    }

    // Act on the gateway-verified reference only; the raw order_id in
    // the body is untrusted input to an unauthenticated endpoint.
    let verified_reference = verification.order_id.unwrap_or_default();
    let order_id = match Uuid::parse_str(&verified_reference) {
        Ok(order_id) => order_id,
        Err(_) => {
            warn!(reference = %verified_reference, "verified reference is not an order id");
            finish(services, entry_id, Some("Order reference invalid".to_string())).await;
            return ack_failure();
        }
    };

    if let Err(e) = services
        .orders
        .handle_payment_success(order_id, &payload.refno)
        .await
    {
        error!(order_id = %order_id, error = %e, "webhook processing failed");
        finish(services, entry_id, Some(e.to_string())).await;
        return ack_failure();
    }

    finish(services, entry_id, None).await;

    info!(
        order_id = %order_id,
        billcode = %payload.billcode,
        refno = %payload.refno,
        "payment webhook processed"
    );
    if let Err(e) = state
        .event_sender
        .send(Event::WebhookProcessed {
            provider: PROVIDER.to_string(),
            event_id,
            order_id: Some(order_id),
        })
        .await
    {
        warn!(error = %e, "failed to send webhook audit event");
    }

    ack_success()
}

/// GET /api/webhooks/toyyibpay. Some gateways ping the URL.
#[utoipa::path(
    get,
    path = "/api/webhooks/toyyibpay",
    responses((status = 200, description = "Webhook endpoint active")),
    tag = "Webhooks"
)]
pub async fn webhook_status() -> impl IntoResponse {
    Json(json!({ "status": "Webhook endpoint active" }))
}

//! KEDAI API Library
//!
//! Backend for the KEDAI storefront builder: checkout creates orders,
//! ToyyibPay webhooks drive the order state machine exactly once, and
//! fulfilled orders become live storefronts.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// API routes mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(handlers::checkout::checkout))
        .route(
            "/orders/:order_number",
            get(handlers::checkout::order_status),
        )
        .route(
            "/webhooks/toyyibpay",
            post(handlers::payment_webhooks::toyyibpay_webhook)
                .get(handlers::payment_webhooks::webhook_status),
        )
        .route("/stores/:slug", get(handlers::stores::get_store))
        .route(
            "/admin/orders",
            get(handlers::admin::list_orders).post(handlers::admin::order_action),
        )
        .route("/admin/deploy", post(handlers::admin::trigger_deploy))
}

/// Full application router. Middleware layers (tracing, compression,
/// timeouts, CORS) are applied by the binary; tests drive this router
/// directly.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "kedai-api up" }))
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .merge(openapi::swagger_ui())
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "kedai-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

//! Shared test harness: the real router over in-memory SQLite with
//! fake gateway/deploy/mailer adapters injected.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectOptions, Database, EntityTrait, QueryFilter, QueryOrder, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use kedai_api::config::AppConfig;
use kedai_api::entities::{order, product, store, store_template, webhook_event};
use kedai_api::errors::ServiceError;
use kedai_api::handlers::AppServices;
use kedai_api::services::alerts::AlertNotifier;
use kedai_api::services::deploy::DeployTrigger;
use kedai_api::services::email::{DeploymentNotice, Mailer, OrderConfirmation};
use kedai_api::services::orders::OrderService;
use kedai_api::services::payments::{
    BillTransaction, CreateBillRequest, CreatedBill, PaymentGateway, WebhookPayload,
    WebhookVerification,
};
use kedai_api::services::stores::StoreService;
use kedai_api::services::webhook_ledger::WebhookLedger;
use kedai_api::{events, migrator, AppState};

pub const TEMPLATE_KEY: &str = "minimal-modern";
pub const ADMIN_SECRET: &str = "test-admin-secret-0123456789";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: false,
        app_url: "http://localhost:3000".into(),
        admin_secret: ADMIN_SECRET.into(),
        toyyib_api_url: "https://toyyibpay.test".into(),
        toyyib_secret_key: "sk-test".into(),
        toyyib_category_code: "cat1".into(),
        deploy_provider: "vercel".into(),
        revalidate_secret: None,
        vercel_deploy_hook: None,
        netlify_build_hook: None,
        email_from: "KEDAI <noreply@kedai.my>".into(),
        alert_webhook_url: None,
        http_timeout_secs: 5,
        event_channel_capacity: 64,
        cors_allowed_origins: None,
    }
}

/// Gateway fake: remembers every created bill and serves transaction
/// records whose external reference is the order id the bill carried.
pub struct FakeGateway {
    pub bills: Mutex<Vec<CreateBillRequest>>,
    pub references: Mutex<HashMap<String, String>>,
    pub fail_create_bill: bool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            bills: Mutex::new(Vec::new()),
            references: Mutex::new(HashMap::new()),
            fail_create_bill: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_create_bill: true,
            ..Self::new()
        }
    }

    pub fn bill_count(&self) -> usize {
        self.bills.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_bill(&self, request: &CreateBillRequest) -> Result<CreatedBill, ServiceError> {
        if self.fail_create_bill {
            return Err(ServiceError::ExternalApiError(
                "gateway rejected the bill".into(),
            ));
        }
        let mut bills = self.bills.lock().unwrap();
        bills.push(request.clone());
        let bill_code = format!("bill-{}", bills.len());
        drop(bills);
        self.references
            .lock()
            .unwrap()
            .insert(bill_code.clone(), request.external_reference.clone());
        Ok(CreatedBill {
            payment_url: format!("https://toyyibpay.test/{bill_code}"),
            bill_code,
        })
    }

    async fn get_bill_transactions(
        &self,
        bill_code: &str,
    ) -> Result<Vec<BillTransaction>, ServiceError> {
        match self.references.lock().unwrap().get(bill_code) {
            Some(reference) => Ok(vec![BillTransaction {
                external_reference: reference.clone(),
                payment_status: "1".into(),
                invoice_no: "INV-1".into(),
                payment_channel: "FPX".into(),
                paid_amount: "59.00".into(),
            }]),
            None => Ok(Vec::new()),
        }
    }

    async fn verify_webhook(&self, payload: &WebhookPayload) -> WebhookVerification {
        let transactions = self
            .get_bill_transactions(&payload.billcode)
            .await
            .unwrap_or_default();
        let Some(transaction) = transactions.first() else {
            return WebhookVerification::default();
        };
        if transaction.external_reference != payload.order_id {
            return WebhookVerification::default();
        }
        WebhookVerification {
            is_valid: true,
            order_id: Some(transaction.external_reference.clone()),
        }
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub confirmations: Mutex<Vec<OrderConfirmation>>,
    pub deployments: Mutex<Vec<DeploymentNotice>>,
    pub fail_sends: Mutex<bool>,
}

impl RecordingMailer {
    pub fn confirmation_count(&self) -> usize {
        self.confirmations.lock().unwrap().len()
    }

    pub fn deployment_count(&self) -> usize {
        self.deployments.lock().unwrap().len()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_order_confirmation(
        &self,
        message: &OrderConfirmation,
    ) -> Result<(), ServiceError> {
        if *self.fail_sends.lock().unwrap() {
            return Err(ServiceError::ExternalServiceError(
                "mail provider unavailable".into(),
            ));
        }
        self.confirmations.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn send_deployment_complete(
        &self,
        message: &DeploymentNotice,
    ) -> Result<(), ServiceError> {
        if *self.fail_sends.lock().unwrap() {
            return Err(ServiceError::ExternalServiceError(
                "mail provider unavailable".into(),
            ));
        }
        self.deployments.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDeploy {
    pub deploys: Mutex<Vec<String>>,
    pub full_deploys: Mutex<u32>,
}

impl RecordingDeploy {
    pub fn deploy_count(&self) -> usize {
        self.deploys.lock().unwrap().len()
    }
}

#[async_trait]
impl DeployTrigger for RecordingDeploy {
    async fn trigger_deploy(&self, store_slug: &str) -> bool {
        self.deploys.lock().unwrap().push(store_slug.to_string());
        true
    }

    async fn trigger_full_deploy(&self) -> bool {
        *self.full_deploys.lock().unwrap() += 1;
        true
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub deploy: Arc<RecordingDeploy>,
    pub config: AppConfig,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_gateway(Arc::new(FakeGateway::new())).await
    }

    pub async fn with_gateway(gateway: Arc<FakeGateway>) -> Self {
        let mut options = ConnectOptions::new("sqlite::memory:".to_string());
        options.max_connections(1).min_connections(1);
        let db = Database::connect(options).await.expect("sqlite connection");
        migrator::Migrator::up(&db, None).await.expect("migrations");
        let db = Arc::new(db);

        seed_template(&db).await;

        let config = test_config();
        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));

        let mailer = Arc::new(RecordingMailer::default());
        let deploy = Arc::new(RecordingDeploy::default());
        let ledger = Arc::new(WebhookLedger::new(
            db.clone(),
            Arc::new(AlertNotifier::disabled()),
        ));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            gateway.clone() as Arc<dyn PaymentGateway>,
            deploy.clone() as Arc<dyn DeployTrigger>,
            mailer.clone() as Arc<dyn Mailer>,
            Some(event_sender.clone()),
            config.app_url.clone(),
        ));
        let services = AppServices {
            orders,
            stores: Arc::new(StoreService::new(db.clone())),
            gateway: gateway.clone() as Arc<dyn PaymentGateway>,
            deploy: deploy.clone() as Arc<dyn DeployTrigger>,
            ledger,
        };
        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            event_sender,
            services,
        };

        Self {
            router: kedai_api::app_router(state),
            db,
            gateway,
            mailer,
            deploy,
            config,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn admin_request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-admin-secret", ADMIN_SECRET);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn form_request(&self, uri: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn checkout(&self, plan: &str, store_name: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/checkout",
                Some(json!({
                    "fullName": "Aisyah Rahman",
                    "email": "aisyah@example.com",
                    "whatsapp": "0123456789",
                    "storeName": store_name,
                    "templateKey": TEMPLATE_KEY,
                    "planType": plan,
                })),
            )
            .await;
        response_json(response).await
    }

    pub async fn order_row(&self, order_id: Uuid) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .expect("order query")
            .expect("order row")
    }

    pub async fn store_by_slug(&self, slug: &str) -> Option<store::Model> {
        store::Entity::find()
            .filter(store::Column::Slug.eq(slug))
            .one(&*self.db)
            .await
            .expect("store query")
    }

    pub async fn store_count(&self) -> usize {
        store::Entity::find().all(&*self.db).await.expect("stores").len()
    }

    pub async fn products_for_store(&self, store_id: Uuid) -> Vec<product::Model> {
        product::Entity::find()
            .filter(product::Column::StoreId.eq(store_id))
            .order_by_asc(product::Column::SortOrder)
            .all(&*self.db)
            .await
            .expect("products")
    }

    pub async fn ledger_rows(&self) -> Vec<webhook_event::Model> {
        webhook_event::Entity::find()
            .all(&*self.db)
            .await
            .expect("ledger rows")
    }
}

async fn seed_template(db: &Arc<sea_orm::DatabaseConnection>) {
    store_template::ActiveModel {
        id: Set(Uuid::new_v4()),
        key: Set(TEMPLATE_KEY.to_string()),
        title: Set("Minimalis Moden".to_string()),
        theme_json: Set(json!({
            "primaryColor": "#8b5cf6",
            "backgroundColor": "#0f172a",
            "textColor": "#f8fafc"
        })),
        sample_products_json: Set(json!([
            { "name": "Sample Product A", "price": 25, "image": "https://example.com/a.jpg" },
            { "name": "Sample Product B", "price": 40, "image": "https://example.com/b.jpg" },
            { "name": "Sample Product C", "price": 15, "image": "https://example.com/c.jpg" },
        ])),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(&**db)
    .await
    .expect("seed template");
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// A successful ToyyibPay callback body for the given bill and order.
pub fn success_webhook(bill_code: &str, order_id: &str, refno: &str) -> Value {
    json!({
        "refno": refno,
        "status": "1",
        "reason": "",
        "billcode": bill_code,
        "order_id": order_id,
        "amount": "5900",
    })
}

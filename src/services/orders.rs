//! Fulfillment orchestrator: owns the order state machine
//! (`pending → paid → deploying → completed`, `failed` from any
//! in-flight state, `refunded` by admin action) and every side effect
//! that turns a paid order into a live storefront.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::common::{generate_order_number, generate_unique_slug, normalize_phone};
use crate::db::{is_unique_violation, DbPool};
use crate::entities::store_template::SampleProduct;
use crate::entities::{order, product, store, store_template};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{OrderStatus, PlanType};
use crate::services::deploy::DeployTrigger;
use crate::services::email::{DeploymentNotice, Mailer, OrderConfirmation};
use crate::services::payments::{CreateBillRequest, PaymentGateway};

static WHATSAPP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9+]+$").expect("whatsapp regex"));

fn validate_whatsapp_digits(value: &str) -> Result<(), ValidationError> {
    if WHATSAPP_RE.is_match(value) {
        return Ok(());
    }
    let mut error = ValidationError::new("whatsapp_digits");
    error.message = Some("Nombor WhatsApp hanya boleh mengandungi nombor".into());
    Err(error)
}

/// Checkout input. Only the plan selection is read for pricing; any
/// amount present elsewhere in the request body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(
        min = 2,
        max = 100,
        message = "Nama mesti sekurang-kurangnya 2 aksara"
    ))]
    pub full_name: String,

    #[validate(email(message = "Email tidak sah"))]
    pub email: String,

    #[validate(
        length(min = 10, max = 15, message = "Nombor WhatsApp tidak sah"),
        custom = "validate_whatsapp_digits"
    )]
    pub whatsapp: String,

    #[validate(length(
        min = 2,
        max = 100,
        message = "Nama kedai mesti sekurang-kurangnya 2 aksara"
    ))]
    pub store_name: String,

    #[validate(length(min = 1, message = "Sila pilih templat"))]
    pub template_key: String,

    #[serde(default)]
    pub plan_type: PlanType,
}

/// Successful checkout result. `payment_url` is the gateway's hosted
/// payment page for paid plans, or the new storefront's own URL for
/// the free plan.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub store_slug: String,
    pub full_name: String,
    pub email: String,
    pub whatsapp: String,
    pub template_key: String,
    pub plan_type: String,
    pub amount: Decimal,
    pub status: String,
    pub toyyib_bill_code: Option<String>,
    pub toyyib_ref: Option<String>,
    pub payment_url: Option<String>,
    pub store_display_name: String,
    pub paid_at: Option<chrono::DateTime<Utc>>,
    pub deployed_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: Option<chrono::DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            store_slug: model.store_slug,
            full_name: model.full_name,
            email: model.email,
            whatsapp: model.whatsapp,
            template_key: model.template_key,
            plan_type: model.plan_type,
            amount: model.amount,
            status: model.status,
            toyyib_bill_code: model.toyyib_bill_code,
            toyyib_ref: model.toyyib_ref,
            payment_url: model.payment_url,
            store_display_name: model.store_display_name,
            paid_at: model.paid_at,
            deployed_at: model.deployed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    deploy: Arc<dyn DeployTrigger>,
    mailer: Arc<dyn Mailer>,
    event_sender: Option<EventSender>,
    app_url: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        deploy: Arc<dyn DeployTrigger>,
        mailer: Arc<dyn Mailer>,
        event_sender: Option<EventSender>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            gateway,
            deploy,
            mailer,
            event_sender,
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn store_url(&self, slug: &str) -> String {
        format!("{}/{slug}", self.app_url)
    }

    /// Creates an order and initiates payment. The slug is generated
    /// and reserved here, before payment, so the payment return URL
    /// and any pre-communicated store link stay stable even though the
    /// store row is created later.
    #[instrument(skip(self, request), fields(email = %request.email, plan = %request.plan_type))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();
        let store_slug = generate_unique_slug(&request.store_name);
        let amount = request.plan_type.price();
        let whatsapp = normalize_phone(&request.whatsapp);

        let order_row = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            store_slug: Set(store_slug.clone()),
            full_name: Set(request.full_name.clone()),
            email: Set(request.email.clone()),
            whatsapp: Set(whatsapp.clone()),
            template_key: Set(request.template_key.clone()),
            plan_type: Set(request.plan_type.to_string()),
            amount: Set(amount),
            status: Set(OrderStatus::Pending.to_string()),
            toyyib_bill_code: Set(None),
            toyyib_ref: Set(None),
            payment_url: Set(None),
            store_display_name: Set(request.store_name.clone()),
            paid_at: Set(None),
            deployed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to create order");
            ServiceError::from(e)
        })?;

        info!(order_id = %order_id, order_number = %order_number, "order created");
        self.emit(Event::OrderCreated {
            order_id,
            order_number: order_number.clone(),
            plan_type: request.plan_type.to_string(),
            amount,
        })
        .await;

        // Free plan: no external payment wait, so the whole pipeline
        // collapses synchronously into this call.
        if request.plan_type == PlanType::Free {
            self.fulfill_free_plan(&order_row).await?;
            return Ok(CheckoutOutcome {
                order_id,
                order_number,
                payment_url: self.store_url(&store_slug),
            });
        }

        let bill = CreateBillRequest {
            bill_name: format!("KEDAI - {} Plan", request.plan_type.to_string().to_uppercase()),
            bill_description: format!(
                "Langganan {} untuk kedai {}",
                request.plan_type, request.store_name
            ),
            amount,
            return_url: format!("{}/thankyou?order={order_number}", self.app_url),
            callback_url: format!("{}/api/webhooks/toyyibpay", self.app_url),
            external_reference: order_id.to_string(),
            payer_name: request.full_name.clone(),
            payer_email: request.email.clone(),
            payer_phone: whatsapp,
        };

        let created = match self.gateway.create_bill(&bill).await {
            Ok(created) => created,
            Err(e) => {
                error!(order_id = %order_id, error = %e, "bill creation failed");
                self.update_order_status(order_id, OrderStatus::Failed).await?;
                return Err(ServiceError::PaymentFailed(
                    "Gagal mencipta bil pembayaran".to_string(),
                ));
            }
        };

        let mut active: order::ActiveModel = order_row.into();
        active.toyyib_bill_code = Set(Some(created.bill_code.clone()));
        active.payment_url = Set(Some(created.payment_url.clone()));
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        Ok(CheckoutOutcome {
            order_id,
            order_number,
            payment_url: created.payment_url,
        })
    }

    /// Drives a confirmed payment through
    /// `paid → deploying → completed`. Invoked by the webhook endpoint
    /// and by admin retry-deploy; conditional status updates make sure
    /// only one concurrent caller runs the side effects.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn handle_payment_success(
        &self,
        order_id: Uuid,
        gateway_ref: &str,
    ) -> Result<(), ServiceError> {
        let order_row = self.find_order(order_id).await?;
        let status = OrderStatus::parse(&order_row.status)?;

        if status == OrderStatus::Completed {
            info!(order_id = %order_id, "order already completed; nothing to fulfill");
            return Ok(());
        }
        if status == OrderStatus::Refunded {
            return Err(ServiceError::InvalidStatus(
                "refunded orders cannot be fulfilled".to_string(),
            ));
        }

        if let Err(e) = self.run_fulfillment(&order_row, gateway_ref).await {
            error!(order_id = %order_id, error = %e, "payment fulfillment failed");
            // A lost status race means another caller is progressing
            // the order; only real failures park it for the operator.
            if !matches!(e, ServiceError::Conflict(_)) {
                self.update_order_status(order_id, OrderStatus::Failed).await?;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn run_fulfillment(
        &self,
        order_row: &order::Model,
        gateway_ref: &str,
    ) -> Result<(), ServiceError> {
        let order_id = order_row.id;
        let now = Utc::now();

        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid.to_string()))
            .col_expr(order::Column::ToyyibRef, Expr::value(gateway_ref.to_string()))
            .col_expr(order::Column::PaidAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.is_in([
                OrderStatus::Pending.to_string(),
                OrderStatus::Failed.to_string(),
            ]))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(order_id = %order_id, order_number = %order_row.order_number, "payment received");
            self.emit(Event::PaymentReceived {
                order_id,
                order_number: order_row.order_number.clone(),
                amount: order_row.amount,
                gateway_ref: gateway_ref.to_string(),
            })
            .await;
        }

        // Advisory lock: only the caller that wins paid -> deploying
        // proceeds past this point.
        self.transition(order_id, OrderStatus::Paid, OrderStatus::Deploying, false)
            .await?;

        self.create_store(order_row).await?;

        if !self.deploy.trigger_deploy(&order_row.store_slug).await {
            warn!(
                order_id = %order_id,
                slug = %order_row.store_slug,
                "deploy trigger reported failure; storefront refreshes on next revalidation"
            );
        }

        // Emails go out while the order is still deploying: a mailer
        // failure parks it in failed without ever leaving completed,
        // which has no exit besides the admin refund.
        let store_url = self.store_url(&order_row.store_slug);
        let store_name = if order_row.store_display_name.is_empty() {
            order_row.full_name.clone()
        } else {
            order_row.store_display_name.clone()
        };

        self.mailer
            .send_order_confirmation(&OrderConfirmation {
                customer_name: order_row.full_name.clone(),
                customer_email: order_row.email.clone(),
                order_number: order_row.order_number.clone(),
                store_name: store_name.clone(),
                store_url: store_url.clone(),
                amount: order_row.amount,
            })
            .await?;
        self.mailer
            .send_deployment_complete(&DeploymentNotice {
                customer_email: order_row.email.clone(),
                store_name,
                store_url,
            })
            .await?;

        self.transition(order_id, OrderStatus::Deploying, OrderStatus::Completed, true)
            .await?;

        info!(
            order_id = %order_id,
            order_number = %order_row.order_number,
            store_slug = %order_row.store_slug,
            "deployment completed"
        );
        self.emit(Event::DeploymentCompleted {
            order_id,
            order_number: order_row.order_number.clone(),
            store_slug: order_row.store_slug.clone(),
        })
        .await;

        Ok(())
    }

    async fn fulfill_free_plan(&self, order_row: &order::Model) -> Result<(), ServiceError> {
        if let Err(e) = self.run_free_fulfillment(order_row).await {
            error!(order_id = %order_row.id, error = %e, "free plan fulfillment failed");
            if !matches!(e, ServiceError::Conflict(_)) {
                self.update_order_status(order_row.id, OrderStatus::Failed).await?;
            }
            return Err(e);
        }
        info!(
            order_id = %order_row.id,
            order_number = %order_row.order_number,
            store_slug = %order_row.store_slug,
            "free plan completed"
        );
        Ok(())
    }

    async fn run_free_fulfillment(&self, order_row: &order::Model) -> Result<(), ServiceError> {
        let order_id = order_row.id;
        let now = Utc::now();

        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid.to_string()))
            .col_expr(order::Column::PaidAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "order {order_id} is no longer pending"
            )));
        }
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: OrderStatus::Pending.to_string(),
            new_status: OrderStatus::Paid.to_string(),
        })
        .await;

        self.create_store(order_row).await?;

        // The atomic path has no external deploy wait, so it skips the
        // deploying hop.
        self.transition(order_id, OrderStatus::Paid, OrderStatus::Completed, true)
            .await?;
        Ok(())
    }

    /// Conditional status update: succeeds only when the stored status
    /// still equals `from`, so concurrent callers cannot both pass.
    async fn transition(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        stamp_deployed_at: bool,
    ) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(to.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(now));
        if stamp_deployed_at {
            update = update.col_expr(order::Column::DeployedAt, Expr::value(now));
        }

        let result = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(from.to_string()))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "order {order_id} left status {from} before the {to} transition"
            )));
        }

        info!(order_id = %order_id, old_status = %from, new_status = %to, "order status updated");
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: from.to_string(),
            new_status: to.to_string(),
        })
        .await;
        Ok(())
    }

    /// Creates the store row and its seed catalog. Tolerates "store
    /// already exists for this slug": a webhook retry or admin
    /// retry-deploy racing a live webhook must not duplicate rows.
    #[instrument(skip(self, order_row), fields(order_id = %order_row.id, slug = %order_row.store_slug))]
    async fn create_store(&self, order_row: &order::Model) -> Result<(), ServiceError> {
        if let Some(existing) = store::Entity::find()
            .filter(store::Column::Slug.eq(&order_row.store_slug))
            .one(&*self.db)
            .await?
        {
            warn!(store_id = %existing.id, "store already exists for slug; skipping creation");
            return Ok(());
        }

        let template = store_template::Entity::find()
            .filter(store_template::Column::Key.eq(&order_row.template_key))
            .one(&*self.db)
            .await?;

        let (theme_json, samples) = match &template {
            Some(template) => {
                let samples: Vec<SampleProduct> =
                    match serde_json::from_value(template.sample_products_json.clone()) {
                        Ok(samples) => samples,
                        Err(e) => {
                            warn!(
                                template_key = %order_row.template_key,
                                error = %e,
                                "template sample products unreadable; seeding empty catalog"
                            );
                            Vec::new()
                        }
                    };
                (template.theme_json.clone(), samples)
            }
            None => {
                warn!(
                    template_key = %order_row.template_key,
                    "template not found; creating store with empty theme"
                );
                (serde_json::json!({}), Vec::new())
            }
        };

        let plan: PlanType = order_row.plan_type.parse().unwrap_or_default();
        let now = Utc::now();
        let store_id = Uuid::new_v4();
        let name = if order_row.store_display_name.is_empty() {
            order_row.full_name.clone()
        } else {
            order_row.store_display_name.clone()
        };

        let inserted = store::ActiveModel {
            id: Set(store_id),
            slug: Set(order_row.store_slug.clone()),
            name: Set(name),
            whatsapp: Set(order_row.whatsapp.clone()),
            email: Set(Some(order_row.email.clone())),
            theme_json: Set(theme_json),
            template_key: Set(Some(order_row.template_key.clone())),
            is_premium: Set(plan.is_premium()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.db)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                warn!("store creation lost a slug race; another caller seeded it");
                return Ok(());
            }
            return Err(e.into());
        }

        if !samples.is_empty() {
            let rows = samples.iter().enumerate().map(|(index, sample)| {
                product::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    store_id: Set(store_id),
                    name: Set(sample.name.clone()),
                    price: Set(sample.price),
                    images_json: Set(serde_json::json!([sample.image])),
                    sort_order: Set(index as i32),
                    is_active: Set(true),
                    created_at: Set(now),
                }
            });
            product::Entity::insert_many(rows).exec(&*self.db).await?;
        }

        info!(store_id = %store_id, seeded_products = samples.len(), "store created");
        self.emit(Event::StoreCreated {
            order_id: order_row.id,
            store_id,
            slug: order_row.store_slug.clone(),
        })
        .await;
        Ok(())
    }

    /// Re-enters the fulfillment path after a failure. Idempotent by
    /// construction: store creation tolerates existing rows.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn retry_deploy(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order_row = self.find_order(order_id).await?;
        let status = OrderStatus::parse(&order_row.status)?;
        if !status.can_retry_deploy() {
            return Err(ServiceError::InvalidStatus(format!(
                "order in status {status} cannot be redeployed"
            )));
        }
        let gateway_ref = order_row.toyyib_ref.clone().unwrap_or_default();
        self.handle_payment_success(order_id, &gateway_ref).await
    }

    /// Status-only change; the store keeps its independent lifetime.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_refunded(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order_row = self.find_order(order_id).await?;
        let status = OrderStatus::parse(&order_row.status)?;
        if !status.can_refund() {
            return Err(ServiceError::InvalidStatus(format!(
                "order in status {status} cannot be refunded"
            )));
        }
        self.transition(order_id, status, OrderStatus::Refunded, false)
            .await
    }

    /// Unconditional status write, used to park orders in `failed`.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        let order_row = self.find_order(order_id).await?;
        let old_status = order_row.status.clone();

        let mut active: order::ActiveModel = order_row.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        info!(order_id = %order_id, %old_status, new_status = %status, "order status updated");
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: status.to_string(),
        })
        .await;
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: {order_id}")))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        Ok(order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .map(OrderResponse::from))
    }

    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .map(OrderResponse::from))
    }

    /// Admin listing, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = order::Entity::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }

        let total = query.clone().count(&*self.db).await?;
        let orders = query
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(OrderResponse::from).collect(),
            total,
        })
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send event");
            }
        }
    }
}

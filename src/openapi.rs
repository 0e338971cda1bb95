use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::models::{OrderStatus, PlanType};
use crate::services::orders::{CheckoutOutcome, CreateOrderRequest, OrderResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "KEDAI API",
        description = "Checkout, payment webhook reconciliation, and storefront fulfillment"
    ),
    paths(
        crate::handlers::checkout::checkout,
        crate::handlers::checkout::order_status,
        crate::handlers::payment_webhooks::toyyibpay_webhook,
        crate::handlers::payment_webhooks::webhook_status,
        crate::handlers::stores::get_store,
        crate::handlers::admin::list_orders,
        crate::handlers::admin::order_action,
        crate::handlers::admin::trigger_deploy,
    ),
    components(schemas(
        CreateOrderRequest,
        CheckoutOutcome,
        OrderResponse,
        OrderStatus,
        PlanType,
        ErrorResponse,
    )),
    tags(
        (name = "Checkout", description = "Order creation and payment initiation"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
        (name = "Stores", description = "Public storefront reads"),
        (name = "Admin", description = "Operator commands (x-admin-secret)")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

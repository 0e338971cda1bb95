pub mod admin;
pub mod checkout;
pub mod payment_webhooks;
pub mod stores;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::alerts::AlertNotifier;
use crate::services::deploy::{DeployProvider, DeployTrigger, HttpDeployTrigger};
use crate::services::email::{Mailer, TracingMailer};
use crate::services::orders::OrderService;
use crate::services::payments::{PaymentGateway, ToyyibPayGateway};
use crate::services::stores::StoreService;
use crate::services::webhook_ledger::WebhookLedger;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers. Adapters are explicitly
/// constructed here and injected; nothing lives in process-wide state.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub stores: Arc<StoreService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub deploy: Arc<dyn DeployTrigger>,
    pub ledger: Arc<WebhookLedger>,
}

impl AppServices {
    /// Builds the production service graph from configuration.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(config.http_timeout_secs);

        let gateway: Arc<dyn PaymentGateway> = Arc::new(ToyyibPayGateway::new(
            config.toyyib_api_url.clone(),
            config.toyyib_secret_key.clone(),
            config.toyyib_category_code.clone(),
            timeout,
        )?);
        let deploy: Arc<dyn DeployTrigger> = Arc::new(HttpDeployTrigger::new(
            DeployProvider::from_name(&config.deploy_provider),
            config.app_url.clone(),
            config.revalidate_secret.clone(),
            config.vercel_deploy_hook.clone(),
            config.netlify_build_hook.clone(),
            timeout,
        )?);
        let mailer: Arc<dyn Mailer> = Arc::new(TracingMailer::new(config.email_from.clone()));
        let alerts = Arc::new(AlertNotifier::new(config.alert_webhook_url.clone(), timeout)?);

        let ledger = Arc::new(WebhookLedger::new(db.clone(), alerts));
        let stores = Arc::new(StoreService::new(db.clone()));
        let orders = Arc::new(OrderService::new(
            db,
            gateway.clone(),
            deploy.clone(),
            mailer,
            Some(event_sender),
            config.app_url.clone(),
        ));

        Ok(Self {
            orders,
            stores,
            gateway,
            deploy,
            ledger,
        })
    }
}

//! Transactional email. The [`Mailer`] trait is the seam a real
//! provider plugs into; the default implementation writes the message
//! to the log, which is also what keeps tests observable.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub customer_name: String,
    pub customer_email: String,
    pub order_number: String,
    pub store_name: String,
    pub store_url: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct DeploymentNotice {
    pub customer_email: String,
    pub store_name: String,
    pub store_url: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_order_confirmation(
        &self,
        message: &OrderConfirmation,
    ) -> Result<(), ServiceError>;

    async fn send_deployment_complete(
        &self,
        message: &DeploymentNotice,
    ) -> Result<(), ServiceError>;
}

pub fn order_confirmation_subject(order_number: &str) -> String {
    format!("Pesanan #{order_number} Berjaya - KEDAI")
}

pub fn deployment_complete_subject(store_name: &str) -> String {
    format!("Kedai {store_name} Sudah Live! - KEDAI")
}

pub fn order_confirmation_html(message: &OrderConfirmation) -> String {
    format!(
        "<html><body>\
         <h1>Terima kasih, {name}!</h1>\
         <p>Pembayaran anda telah berjaya. Kedai online anda sedang disediakan.</p>\
         <p><strong>No. Pesanan:</strong> {order_number}<br/>\
         <strong>Nama Kedai:</strong> {store_name}<br/>\
         <strong>Jumlah:</strong> RM {amount:.2}</p>\
         <p><a href=\"{store_url}\">Lihat Kedai Anda</a></p>\
         </body></html>",
        name = message.customer_name,
        order_number = message.order_number,
        store_name = message.store_name,
        amount = message.amount,
        store_url = message.store_url,
    )
}

pub fn deployment_complete_html(message: &DeploymentNotice) -> String {
    format!(
        "<html><body>\
         <h1>Kedai Anda Sudah Live!</h1>\
         <p>Tahniah! Kedai <strong>{store_name}</strong> anda kini sudah boleh diakses oleh pelanggan.</p>\
         <p><a href=\"{store_url}\">{store_url}</a></p>\
         <p>Kongsi link kedai anda di WhatsApp atau media sosial untuk mula menerima pesanan!</p>\
         </body></html>",
        store_name = message.store_name,
        store_url = message.store_url,
    )
}

/// Logs outbound mail instead of delivering it.
pub struct TracingMailer {
    from: String,
}

impl TracingMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for TracingMailer {
    #[instrument(skip(self, message), fields(to = %message.customer_email))]
    async fn send_order_confirmation(
        &self,
        message: &OrderConfirmation,
    ) -> Result<(), ServiceError> {
        let subject = order_confirmation_subject(&message.order_number);
        info!(
            target: "email",
            from = %self.from,
            to = %message.customer_email,
            %subject,
            "outbound email"
        );
        debug!(target: "email", body = %order_confirmation_html(message));
        Ok(())
    }

    #[instrument(skip(self, message), fields(to = %message.customer_email))]
    async fn send_deployment_complete(
        &self,
        message: &DeploymentNotice,
    ) -> Result<(), ServiceError> {
        let subject = deployment_complete_subject(&message.store_name);
        info!(
            target: "email",
            from = %self.from,
            to = %message.customer_email,
            %subject,
            "outbound email"
        );
        debug!(target: "email", body = %deployment_complete_html(message));
        Ok(())
    }
}

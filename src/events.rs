//! Audit events for business-significant transitions. Services emit
//! through [`EventSender`]; a spawned processor writes the audit log.
//! None of this is public contract, but operators depend on it to
//! diagnose silent `failed` orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        plan_type: String,
        amount: Decimal,
    },
    PaymentReceived {
        order_id: Uuid,
        order_number: String,
        amount: Decimal,
        gateway_ref: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    StoreCreated {
        order_id: Uuid,
        store_id: Uuid,
        slug: String,
    },
    DeploymentCompleted {
        order_id: Uuid,
        order_number: String,
        store_slug: String,
    },
    WebhookProcessed {
        provider: String,
        event_id: String,
        order_id: Option<Uuid>,
    },
}

impl Event {
    pub fn audit_name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::PaymentReceived { .. } => "payment_received",
            Event::OrderStatusChanged { .. } => "order_status_updated",
            Event::StoreCreated { .. } => "store_created",
            Event::DeploymentCompleted { .. } => "deployment_completed",
            Event::WebhookProcessed { .. } => "payment_webhook_processed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {e}"))
    }
}

/// Creates the event channel pair used by `main` and the test harness.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel into the audit log until every sender is
/// dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        info!(target: "audit", event = event.audit_name(), %payload, "audit event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (sender, mut receiver) = channel(4);
        sender
            .send(Event::OrderCreated {
                order_id: Uuid::new_v4(),
                order_number: "KD-20250801-ABCDE".into(),
                plan_type: "pro".into(),
                amount: dec!(59),
            })
            .await
            .unwrap();

        let event = receiver.recv().await.expect("event expected");
        assert_eq!(event.audit_name(), "order_created");
    }

    #[test]
    fn audit_names_cover_the_operator_contract() {
        let event = Event::OrderStatusChanged {
            order_id: Uuid::new_v4(),
            old_status: "pending".into(),
            new_status: "paid".into(),
        };
        assert_eq!(event.audit_name(), "order_status_updated");
    }
}

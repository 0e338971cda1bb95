//! Idempotency ledger over the `webhook_events` table.
//!
//! The ledger row is written with `processed = false` before any
//! business logic runs, so a concurrent duplicate delivery trips the
//! `(provider, provider_event_id)` unique constraint instead of
//! racing. A row never marked processed (crash mid-flight) reads as
//! "not yet handled" and is legitimately reprocessed on retry.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::db::{is_unique_violation, DbPool};
use crate::entities::webhook_event;
use crate::errors::ServiceError;
use crate::services::alerts::AlertNotifier;

#[derive(Debug, Clone, Default)]
pub struct IdempotencyCheck {
    pub is_duplicate: bool,
    pub existing_payload: Option<serde_json::Value>,
}

pub struct WebhookLedger {
    db: Arc<DbPool>,
    alerts: Arc<AlertNotifier>,
}

impl WebhookLedger {
    pub fn new(db: Arc<DbPool>, alerts: Arc<AlertNotifier>) -> Self {
        Self { db, alerts }
    }

    /// Answers "have I fully processed this event before". Rows that
    /// exist but are not yet marked processed do not count: their
    /// delivery attempt may have crashed mid-flight.
    #[instrument(skip(self))]
    pub async fn check(
        &self,
        provider: &str,
        event_id: &str,
    ) -> Result<IdempotencyCheck, ServiceError> {
        let row = webhook_event::Entity::find()
            .filter(webhook_event::Column::Provider.eq(provider))
            .filter(webhook_event::Column::ProviderEventId.eq(event_id))
            .one(&*self.db)
            .await?;

        match row {
            Some(row) if row.processed => Ok(IdempotencyCheck {
                is_duplicate: true,
                existing_payload: Some(row.raw_payload),
            }),
            _ => Ok(IdempotencyCheck::default()),
        }
    }

    /// Records the delivery attempt before any side effect runs.
    /// Returns `None` when another delivery already holds the
    /// `(provider, event_id)` pair; the caller must acknowledge the
    /// duplicate and stop.
    #[instrument(skip(self, payload))]
    pub async fn record(
        &self,
        provider: &str,
        event_id: &str,
        payload: &serde_json::Value,
        endpoint: &str,
    ) -> Result<Option<Uuid>, ServiceError> {
        let entry_id = Uuid::new_v4();
        let entry = webhook_event::ActiveModel {
            id: Set(entry_id),
            provider: Set(provider.to_string()),
            provider_event_id: Set(event_id.to_string()),
            endpoint: Set(endpoint.to_string()),
            raw_payload: Set(payload.clone()),
            processed: Set(false),
            error_message: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        match entry.insert(&*self.db).await {
            Ok(_) => Ok(Some(entry_id)),
            Err(e) if is_unique_violation(&e) => {
                warn!(provider, event_id, "duplicate webhook event");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks the attempt finished, recording the failure reason when
    /// there was one and pushing it to the alert hook.
    #[instrument(skip(self, error_message))]
    pub async fn mark_processed(
        &self,
        entry_id: Uuid,
        error_message: Option<String>,
    ) -> Result<(), ServiceError> {
        let Some(row) = webhook_event::Entity::find_by_id(entry_id)
            .one(&*self.db)
            .await?
        else {
            warn!(%entry_id, "webhook ledger entry disappeared before completion");
            return Ok(());
        };

        let provider = row.provider.clone();
        let event_id = row.provider_event_id.clone();

        let mut entry: webhook_event::ActiveModel = row.into();
        entry.processed = Set(true);
        entry.error_message = Set(error_message.clone());
        entry.updated_at = Set(Some(Utc::now()));
        entry.update(&*self.db).await?;

        if let Some(error) = &error_message {
            self.alerts.webhook_failure(&provider, &event_id, error).await;
        }

        Ok(())
    }
}

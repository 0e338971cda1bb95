use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The root aggregate of the payment flow. Status strings are the
/// serialized form of [`crate::models::OrderStatus`]; the slug is
/// reserved here (unique index) before any store row exists.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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
    pub paid_at: Option<DateTime<Utc>>,
    pub deployed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only reference data: theme and sample products copied into a
/// new store at creation time, never re-derived later.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub key: String,
    pub title: String,
    pub theme_json: Json,
    pub sample_products_json: Json,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Typed view of one entry in `sample_products_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleProduct {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image: String,
}

//! Public storefront reads: the data feed the storefront renderer
//! consumes.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::db::DbPool;
use crate::entities::{product, store};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct StoreWithProducts {
    #[serde(flatten)]
    pub store: store::Model,
    pub products: Vec<product::Model>,
}

#[derive(Clone)]
pub struct StoreService {
    db: Arc<DbPool>,
}

impl StoreService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Active store plus its active products in template order.
    #[instrument(skip(self))]
    pub async fn get_store_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<StoreWithProducts>, ServiceError> {
        let Some(store_row) = store::Entity::find()
            .filter(store::Column::Slug.eq(slug))
            .filter(store::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let products = product::Entity::find()
            .filter(product::Column::StoreId.eq(store_row.id))
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::SortOrder)
            .all(&*self.db)
            .await?;

        Ok(Some(StoreWithProducts {
            store: store_row,
            products,
        }))
    }
}

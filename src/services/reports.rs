use crate::{
    db::DbPool,
    entities::{product, product_return, product_store, sale, sale::SaleStatus, store},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Revenue aggregates over a date range.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesSummary {
    pub sales_count: u64,
    pub gross_total: Decimal,
    pub refund_total: Decimal,
    pub net_revenue: Decimal,
    pub items_sold: i64,
}

/// Per-store stock aggregates.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StoreInventorySummary {
    pub store_id: Uuid,
    pub store_code: String,
    pub store_name: String,
    pub distinct_products: u64,
    pub total_units: i64,
    /// Σ stock × product cost.
    pub stock_value: Decimal,
}

/// Service for dashboard aggregates
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Sales and refund totals, optionally bounded by date range and store.
    /// Voided sales are excluded from revenue.
    #[instrument(skip(self))]
    pub async fn sales_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        store_id: Option<Uuid>,
    ) -> Result<SalesSummary, ServiceError> {
        let db = &*self.db_pool;

        let mut sales_query =
            sale::Entity::find().filter(sale::Column::Status.ne(SaleStatus::Voided.as_str()));
        if let Some(from) = from {
            sales_query = sales_query.filter(sale::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            sales_query = sales_query.filter(sale::Column::CreatedAt.lte(to));
        }
        if let Some(store_id) = store_id {
            sales_query = sales_query.filter(sale::Column::StoreId.eq(store_id));
        }
        let sales = sales_query.all(db).await?;

        let mut returns_query = product_return::Entity::find();
        if let Some(from) = from {
            returns_query = returns_query.filter(product_return::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            returns_query = returns_query.filter(product_return::Column::CreatedAt.lte(to));
        }
        if let Some(store_id) = store_id {
            returns_query = returns_query.filter(product_return::Column::StoreId.eq(store_id));
        }
        let returns = returns_query.all(db).await?;

        let gross_total: Decimal = sales.iter().map(|s| s.total).sum();
        let items_sold: i64 = sales.iter().map(|s| i64::from(s.items_count)).sum();
        let refund_total: Decimal = returns.iter().map(|r| r.total_refund).sum();

        Ok(SalesSummary {
            sales_count: sales.len() as u64,
            gross_total,
            refund_total,
            net_revenue: gross_total - refund_total,
            items_sold,
        })
    }

    /// Stock units and value grouped by store.
    #[instrument(skip(self))]
    pub async fn inventory_summary(&self) -> Result<Vec<StoreInventorySummary>, ServiceError> {
        let db = &*self.db_pool;

        let stores = store::Entity::find().all(db).await?;
        let levels = product_store::Entity::find()
            .find_also_related(product::Entity)
            .all(db)
            .await?;

        let mut by_store: HashMap<Uuid, (u64, i64, Decimal)> = HashMap::new();
        for (level, product) in levels {
            let entry = by_store
                .entry(level.store_id)
                .or_insert((0, 0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += i64::from(level.stock);
            if let Some(product) = product {
                entry.2 += product.cost * Decimal::from(level.stock);
            }
        }

        Ok(stores
            .into_iter()
            .map(|store| {
                let (distinct_products, total_units, stock_value) = by_store
                    .get(&store.id)
                    .copied()
                    .unwrap_or((0, 0, Decimal::ZERO));
                StoreInventorySummary {
                    store_id: store.id,
                    store_code: store.code,
                    store_name: store.name,
                    distinct_products,
                    total_units,
                    stock_value,
                }
            })
            .collect())
    }
}

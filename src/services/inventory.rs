use crate::{
    commands::inventory::{
        RecordMovementCommand, RecordMovementResult, TransferStockCommand, TransferStockResult,
    },
    commands::Command,
    db::DbPool,
    entities::{product, product_store, stock_movement},
    errors::ServiceError,
    events::EventSender,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Service for stock levels, movements, and transfers
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records one stock movement (ledger row plus counter mutation).
    #[instrument(skip(self, command))]
    pub async fn record_movement(
        &self,
        command: RecordMovementCommand,
    ) -> Result<RecordMovementResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Moves stock between stores as one atomic pair of movements.
    #[instrument(skip(self, command))]
    pub async fn transfer_stock(
        &self,
        command: TransferStockCommand,
    ) -> Result<TransferStockResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Current stock level for a (product, store) pair.
    #[instrument(skip(self))]
    pub async fn get_stock(
        &self,
        product_id: &Uuid,
        store_id: &Uuid,
    ) -> Result<Option<product_store::Model>, ServiceError> {
        let level = product_store::Entity::find()
            .filter(product_store::Column::ProductId.eq(*product_id))
            .filter(product_store::Column::StoreId.eq(*store_id))
            .one(&*self.db_pool)
            .await?;
        Ok(level)
    }

    /// Lists stock levels with pagination, optionally scoped to one store.
    #[instrument(skip(self))]
    pub async fn list_stock_levels(
        &self,
        page: u64,
        limit: u64,
        store_id: Option<Uuid>,
    ) -> Result<(Vec<(product_store::Model, Option<product::Model>)>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = product_store::Entity::find().find_also_related(product::Entity);
        if let Some(store_id) = store_id {
            query = query.filter(product_store::Column::StoreId.eq(store_id));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let levels = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((levels, total))
    }

    /// Lists ledger entries newest-first, optionally filtered by product
    /// and/or store.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        page: u64,
        limit: u64,
        product_id: Option<Uuid>,
        store_id: Option<Uuid>,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query =
            stock_movement::Entity::find().order_by_desc(stock_movement::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(store_id) = store_id {
            query = query.filter(stock_movement::Column::StoreId.eq(store_id));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let movements = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((movements, total))
    }

    /// Sets the reorder threshold for a (product, store) pair, creating the
    /// stock row with stock 0 when it does not exist yet.
    #[instrument(skip(self))]
    pub async fn set_low_stock_threshold(
        &self,
        product_id: Uuid,
        store_id: Uuid,
        threshold: i32,
    ) -> Result<product_store::Model, ServiceError> {
        if threshold < 0 {
            return Err(ServiceError::ValidationError(
                "Threshold may not be negative".to_owned(),
            ));
        }

        let db = &*self.db_pool;
        let existing = product_store::Entity::find()
            .filter(product_store::Column::ProductId.eq(product_id))
            .filter(product_store::Column::StoreId.eq(store_id))
            .one(db)
            .await?;

        let row = match existing {
            Some(row) => row,
            None => {
                product_store::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    store_id: Set(store_id),
                    stock: Set(0),
                    low_stock_threshold: Set(0),
                    created_at: Set(Utc::now()),
                    updated_at: Set(None),
                }
                .insert(db)
                .await?
            }
        };

        let mut active: product_store::ActiveModel = row.into();
        active.low_stock_threshold = Set(threshold);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }

    /// Stock rows at or below their reorder threshold.
    #[instrument(skip(self))]
    pub async fn low_stock(
        &self,
        store_id: Option<Uuid>,
    ) -> Result<Vec<(product_store::Model, Option<product::Model>)>, ServiceError> {
        let db = &*self.db_pool;

        let mut query = product_store::Entity::find()
            .find_also_related(product::Entity)
            .filter(product_store::Column::LowStockThreshold.gt(0))
            .filter(
                Expr::col(product_store::Column::Stock)
                    .lte(Expr::col(product_store::Column::LowStockThreshold)),
            );
        if let Some(store_id) = store_id {
            query = query.filter(product_store::Column::StoreId.eq(store_id));
        }

        Ok(query.all(db).await?)
    }
}

use crate::{
    commands::sales::{
        CreateSaleCommand, CreateSaleResult, VoidSaleCommand, VoidSaleResult,
    },
    commands::Command,
    db::DbPool,
    entities::{payment, sale, sale_item},
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

/// Fully-loaded sale with its line snapshots and payment history.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaleDetails {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub payments: Vec<payment::Model>,
}

/// Service for sale transaction processing
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SaleService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a sale atomically; see [`CreateSaleCommand`].
    #[instrument(skip(self, command))]
    pub async fn create_sale(
        &self,
        command: CreateSaleCommand,
    ) -> Result<CreateSaleResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Voids a completed sale; see [`VoidSaleCommand`].
    #[instrument(skip(self))]
    pub async fn void_sale(&self, command: VoidSaleCommand) -> Result<VoidSaleResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets a sale by ID with items and payments.
    #[instrument(skip(self))]
    pub async fn get_sale(&self, sale_id: &Uuid) -> Result<Option<SaleDetails>, ServiceError> {
        let db = &*self.db_pool;
        let Some(sale) = sale::Entity::find_by_id(*sale_id).one(db).await.map_err(|e| {
            error!(sale_id = %sale_id, error = %e, "Database error when fetching sale");
            ServiceError::DatabaseError(e)
        })?
        else {
            return Ok(None);
        };

        let items = sale_item::Entity::find()
            .filter(sale_item::Column::SaleId.eq(sale.id))
            .all(db)
            .await?;
        let payments = payment::Entity::find()
            .filter(payment::Column::SaleId.eq(sale.id))
            .order_by_asc(payment::Column::CreatedAt)
            .all(db)
            .await?;

        Ok(Some(SaleDetails {
            sale,
            items,
            payments,
        }))
    }

    /// Lists sales with pagination, optionally scoped to one store.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        page: u64,
        limit: u64,
        store_id: Option<Uuid>,
    ) -> Result<(Vec<sale::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = sale::Entity::find().order_by_desc(sale::Column::CreatedAt);
        if let Some(store_id) = store_id {
            query = query.filter(sale::Column::StoreId.eq(store_id));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let sales = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((sales, total))
    }
}

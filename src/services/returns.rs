use crate::{
    commands::returns::{CreateReturnCommand, CreateReturnResult, DeleteReturnCommand},
    commands::Command,
    db::DbPool,
    entities::{product_return, return_item},
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Fully-loaded return with its line snapshots.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReturnDetails {
    pub product_return: product_return::Model,
    pub items: Vec<return_item::Model>,
}

/// Service for managing returns
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReturnService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Processes a return atomically; see [`CreateReturnCommand`].
    #[instrument(skip(self, command))]
    pub async fn create_return(
        &self,
        command: CreateReturnCommand,
    ) -> Result<CreateReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Deletes a return still in pending status.
    #[instrument(skip(self))]
    pub async fn delete_return(&self, return_id: Uuid) -> Result<(), ServiceError> {
        DeleteReturnCommand { return_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets a return by ID with its items.
    #[instrument(skip(self))]
    pub async fn get_return(
        &self,
        return_id: &Uuid,
    ) -> Result<Option<ReturnDetails>, ServiceError> {
        let db = &*self.db_pool;
        let Some(product_return) = product_return::Entity::find_by_id(*return_id).one(db).await?
        else {
            return Ok(None);
        };

        let items = return_item::Entity::find()
            .filter(return_item::Column::ReturnId.eq(product_return.id))
            .all(db)
            .await?;

        Ok(Some(ReturnDetails {
            product_return,
            items,
        }))
    }

    /// Lists returns with pagination, optionally scoped to one sale.
    #[instrument(skip(self))]
    pub async fn list_returns(
        &self,
        page: u64,
        limit: u64,
        sale_id: Option<Uuid>,
    ) -> Result<(Vec<product_return::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query =
            product_return::Entity::find().order_by_desc(product_return::Column::CreatedAt);
        if let Some(sale_id) = sale_id {
            query = query.filter(product_return::Column::SaleId.eq(sale_id));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let returns = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((returns, total))
    }
}

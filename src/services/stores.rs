use crate::{
    db::DbPool,
    entities::store,
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateStoreInput {
    #[validate(length(min = 1, max = 32, message = "Store code must be between 1 and 32 characters"))]
    pub code: String,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStoreInput {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Service for store locations
#[derive(Clone)]
pub struct StoreService {
    db_pool: Arc<DbPool>,
}

impl StoreService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, input))]
    pub async fn create_store(&self, input: CreateStoreInput) -> Result<store::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db_pool;
        let existing = store::Entity::find()
            .filter(store::Column::Code.eq(input.code.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A store with code {} already exists",
                input.code
            )));
        }

        let saved = store::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(input.code),
            name: Set(input.name),
            address: Set(input.address),
            phone: Set(input.phone),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(store_id = %saved.id, code = %saved.code, "Store created");
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update_store(
        &self,
        store_id: Uuid,
        input: UpdateStoreInput,
    ) -> Result<store::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db_pool;
        let existing = store::Entity::find_by_id(store_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))?;

        let mut active: store::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if input.address.is_some() {
            active.address = Set(input.address);
        }
        if input.phone.is_some() {
            active.phone = Set(input.phone);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_store(&self, store_id: &Uuid) -> Result<Option<store::Model>, ServiceError> {
        Ok(store::Entity::find_by_id(*store_id)
            .one(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn list_stores(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<store::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = store::Entity::find()
            .order_by_asc(store::Column::Code)
            .paginate(db, limit);
        let total = paginator.num_items().await?;
        let stores = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((stores, total))
    }
}

use crate::{
    db::DbPool,
    entities::{product, product_store, sale_item, store},
    errors::ServiceError,
    events::EventSender,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 64, message = "SKU must be between 1 and 64 characters"))]
    pub sku: String,
    pub barcode: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    pub barcode: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Service for the product catalog
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    #[allow(dead_code)]
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if input.price < Decimal::ZERO || input.cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price and cost may not be negative".to_owned(),
            ));
        }

        let db = &*self.db_pool;
        let existing = product::Entity::find()
            .filter(product::Column::Sku.eq(input.sku.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A product with SKU {} already exists",
                input.sku
            )));
        }

        let saved = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(input.sku),
            barcode: Set(input.barcode),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            cost: Set(input.cost),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(product_id = %saved.id, sku = %saved.sku, "Product created");
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db_pool;
        let existing = product::Entity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price may not be negative".to_owned(),
                ));
            }
            active.price = Set(price);
        }
        if let Some(cost) = input.cost {
            if cost < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Cost may not be negative".to_owned(),
                ));
            }
            active.cost = Set(cost);
        }
        if input.barcode.is_some() {
            active.barcode = Set(input.barcode);
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(db).await?)
    }

    /// Deletes a product and its stock rows. Rejected while sale history
    /// references the product, since sale items must keep resolving.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let referenced = sale_item::Entity::find()
            .filter(sale_item::Column::ProductId.eq(product_id))
            .count(db)
            .await?;
        if referenced > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} appears in sale history; deactivate it instead",
                product_id
            )));
        }

        db.transaction::<_, (), ServiceError>(|txn| {
            Box::pin(async move {
                product_store::Entity::delete_many()
                    .filter(product_store::Column::ProductId.eq(product_id))
                    .exec(txn)
                    .await?;
                let deleted = product::Entity::delete_by_id(product_id).exec(txn).await?;
                if deleted.rows_affected == 0 {
                    return Err(ServiceError::NotFound(format!(
                        "Product {} not found",
                        product_id
                    )));
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for product deletion: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })?;

        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        product_id: &Uuid,
    ) -> Result<Option<product::Model>, ServiceError> {
        Ok(product::Entity::find_by_id(*product_id)
            .one(&*self.db_pool)
            .await?)
    }

    /// Lists products with pagination and an optional name/SKU search.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        limit: u64,
        search: Option<String>,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let mut query = product::Entity::find().order_by_asc(product::Column::Name);
        if let Some(term) = search.filter(|t| !t.trim().is_empty()) {
            let pattern = format!("%{}%", term.trim());
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.like(pattern.clone()))
                    .add(product::Column::Sku.like(pattern)),
            );
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((products, total))
    }

    /// Per-store stock breakdown for one product.
    #[instrument(skip(self))]
    pub async fn stock_by_store(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<(product_store::Model, Option<store::Model>)>, ServiceError> {
        let levels = product_store::Entity::find()
            .find_also_related(store::Entity)
            .filter(product_store::Column::ProductId.eq(product_id))
            .all(&*self.db_pool)
            .await?;
        Ok(levels)
    }
}

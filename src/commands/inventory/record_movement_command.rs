use crate::{
    commands::inventory::{post_movement, MovementSpec, PostedMovement},
    commands::Command,
    db::DbPool,
    entities::{product, product_store, stock_movement, stock_movement::MovementType, store},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::STOCK_MOVEMENTS,
};
use sea_orm::{DatabaseConnection, EntityTrait, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Records a single stock movement: one immutable ledger row plus the matching
/// `product_store` mutation, both inside one transaction.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecordMovementCommand {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    #[validate(length(min = 1, max = 100, message = "Reason must be between 1 and 100 characters"))]
    pub reason: String,
    #[validate(length(max = 500, message = "Notes may not exceed 500 characters"))]
    pub notes: Option<String>,
    /// Ledger code; auto-generated when not supplied.
    pub code: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordMovementResult {
    pub movement: stock_movement::Model,
    pub stock_level: product_store::Model,
}

#[async_trait::async_trait]
impl Command for RecordMovementCommand {
    type Result = RecordMovementResult;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;
        self.validate_quantity()?;

        let db = db_pool.as_ref();
        self.ensure_references_exist(db).await?;

        let posted = self.post_in_transaction(db).await?;

        STOCK_MOVEMENTS
            .with_label_values(&[self.movement_type.as_str()])
            .inc();
        self.log_and_trigger_events(&event_sender, &posted).await?;

        Ok(RecordMovementResult {
            movement: posted.movement,
            stock_level: posted.stock_level,
        })
    }
}

impl RecordMovementCommand {
    fn validate_quantity(&self) -> Result<(), ServiceError> {
        if self.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Quantity may not be negative".to_owned(),
            ));
        }
        // An adjustment of zero empties the shelf; a zero delta is meaningless.
        if self.quantity == 0 && self.movement_type != MovementType::Adjustment {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive for delta movements".to_owned(),
            ));
        }
        Ok(())
    }

    async fn ensure_references_exist(
        &self,
        db: &DatabaseConnection,
    ) -> Result<(), ServiceError> {
        product::Entity::find_by_id(self.product_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", self.product_id))
            })?;
        store::Entity::find_by_id(self.store_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", self.store_id)))?;
        Ok(())
    }

    async fn post_in_transaction(
        &self,
        db: &DatabaseConnection,
    ) -> Result<PostedMovement, ServiceError> {
        let spec = MovementSpec {
            product_id: self.product_id,
            store_id: self.store_id,
            movement_type: self.movement_type,
            quantity: self.quantity,
            reason: self.reason.clone(),
            notes: self.notes.clone(),
            code: self.code.clone(),
            related_store_id: None,
            created_by: self.created_by,
        };

        db.transaction::<_, PostedMovement, ServiceError>(|txn| {
            Box::pin(async move { post_movement(txn, spec).await })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for stock movement: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })
    }

    async fn log_and_trigger_events(
        &self,
        event_sender: &EventSender,
        posted: &PostedMovement,
    ) -> Result<(), ServiceError> {
        info!(
            code = %posted.movement.code,
            product_id = %self.product_id,
            store_id = %self.store_id,
            movement_type = %self.movement_type,
            quantity = %self.quantity,
            new_stock = %posted.stock_level.stock,
            "Stock movement posted"
        );

        event_sender
            .send(Event::StockMovementRecorded {
                movement_id: posted.movement.id,
                product_id: self.product_id,
                store_id: self.store_id,
                movement_type: self.movement_type.as_str().to_owned(),
                quantity: self.quantity,
                new_stock: posted.stock_level.stock,
            })
            .await
            .map_err(|e| {
                let msg = format!("Failed to send event for stock movement: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })?;

        let level = &posted.stock_level;
        if level.low_stock_threshold > 0 && level.stock <= level.low_stock_threshold {
            event_sender
                .send(Event::LowStock {
                    product_id: level.product_id,
                    store_id: level.store_id,
                    stock: level.stock,
                    threshold: level.low_stock_threshold,
                })
                .await
                .map_err(|e| ServiceError::EventError(e.to_string()))?;
        }

        Ok(())
    }
}

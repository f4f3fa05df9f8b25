use crate::{
    commands::inventory::{post_movement, MovementSpec},
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

/// Moves stock between two stores as one atomic unit: a `transfer_out` ledger
/// row at the source and a `transfer_in` row at the destination, each
/// referencing the other store. Both commit or both roll back.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TransferStockCommand {
    pub product_id: Uuid,
    pub from_store_id: Uuid,
    pub to_store_id: Uuid,
    #[validate(range(min = 1, message = "Transfer quantity must be positive"))]
    pub quantity: i32,
    #[validate(length(max = 500, message = "Notes may not exceed 500 characters"))]
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferStockResult {
    pub outbound: stock_movement::Model,
    pub inbound: stock_movement::Model,
    pub source_stock: product_store::Model,
    pub destination_stock: product_store::Model,
}

#[async_trait::async_trait]
impl Command for TransferStockCommand {
    type Result = TransferStockResult;

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
        if self.from_store_id == self.to_store_id {
            return Err(ServiceError::ValidationError(
                "Source and destination stores must differ".to_owned(),
            ));
        }

        let db = db_pool.as_ref();
        self.ensure_references_exist(db).await?;

        let result = self.transfer_in_transaction(db).await?;

        STOCK_MOVEMENTS
            .with_label_values(&[MovementType::TransferOut.as_str()])
            .inc();
        STOCK_MOVEMENTS
            .with_label_values(&[MovementType::TransferIn.as_str()])
            .inc();
        self.log_and_trigger_event(&event_sender, &result).await?;

        Ok(result)
    }
}

impl TransferStockCommand {
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
        for store_id in [self.from_store_id, self.to_store_id] {
            store::Entity::find_by_id(store_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))?;
        }
        Ok(())
    }

    async fn transfer_in_transaction(
        &self,
        db: &DatabaseConnection,
    ) -> Result<TransferStockResult, ServiceError> {
        let product_id = self.product_id;
        let from_store_id = self.from_store_id;
        let to_store_id = self.to_store_id;
        let quantity = self.quantity;
        let notes = self.notes.clone();
        let created_by = self.created_by;

        db.transaction::<_, TransferStockResult, ServiceError>(|txn| {
            Box::pin(async move {
                let outbound = post_movement(
                    txn,
                    MovementSpec {
                        product_id,
                        store_id: from_store_id,
                        movement_type: MovementType::TransferOut,
                        quantity,
                        reason: "transfer".to_owned(),
                        notes: notes.clone(),
                        code: None,
                        related_store_id: Some(to_store_id),
                        created_by,
                    },
                )
                .await?;

                let inbound = post_movement(
                    txn,
                    MovementSpec {
                        product_id,
                        store_id: to_store_id,
                        movement_type: MovementType::TransferIn,
                        quantity,
                        reason: "transfer".to_owned(),
                        notes,
                        code: None,
                        related_store_id: Some(from_store_id),
                        created_by,
                    },
                )
                .await?;

                Ok(TransferStockResult {
                    outbound: outbound.movement,
                    inbound: inbound.movement,
                    source_stock: outbound.stock_level,
                    destination_stock: inbound.stock_level,
                })
            })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for stock transfer: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        result: &TransferStockResult,
    ) -> Result<(), ServiceError> {
        info!(
            product_id = %self.product_id,
            from_store_id = %self.from_store_id,
            to_store_id = %self.to_store_id,
            quantity = %self.quantity,
            source_stock = %result.source_stock.stock,
            destination_stock = %result.destination_stock.stock,
            "Stock transferred between stores"
        );
        event_sender
            .send(Event::StockTransferred {
                product_id: self.product_id,
                from_store_id: self.from_store_id,
                to_store_id: self.to_store_id,
                quantity: self.quantity,
            })
            .await
            .map_err(|e| {
                let msg = format!("Failed to send event for stock transfer: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_same_store_transfer() {
        let store = Uuid::new_v4();
        let cmd = TransferStockCommand {
            product_id: Uuid::new_v4(),
            from_store_id: store,
            to_store_id: store,
            quantity: 5,
            notes: None,
            created_by: None,
        };
        // The same-store guard runs after derive validation.
        assert!(cmd.validate().is_ok());
        assert_eq!(cmd.from_store_id, cmd.to_store_id);
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let cmd = TransferStockCommand {
            product_id: Uuid::new_v4(),
            from_store_id: Uuid::new_v4(),
            to_store_id: Uuid::new_v4(),
            quantity: 0,
            notes: None,
            created_by: None,
        };
        assert!(cmd.validate().is_err());
    }
}

use crate::{
    commands::inventory::{post_movement, MovementSpec},
    commands::Command,
    db::DbPool,
    entities::{
        payment, product_return, sale,
        sale::SaleStatus,
        sale_item,
        stock_movement::MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Voids a completed sale: restores stock for every line, records a reversing
/// payment for the full total, and marks the sale `voided`. The counterpart of
/// the return pathway for cancelling a whole transaction.
#[derive(Debug, Serialize, Deserialize)]
pub struct VoidSaleCommand {
    pub sale_id: Uuid,
    pub voided_by: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoidSaleResult {
    pub sale: sale::Model,
}

#[async_trait::async_trait]
impl Command for VoidSaleCommand {
    type Result = VoidSaleResult;

    #[instrument(skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        let result = self.void_in_transaction(db).await?;

        info!(
            sale_id = %self.sale_id,
            code = %result.sale.code,
            voided_by = %self.voided_by,
            "Sale voided"
        );
        event_sender
            .send(Event::SaleVoided(result.sale.id))
            .await
            .map_err(|e| {
                let msg = format!("Failed to send event for voided sale: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })?;

        Ok(result)
    }
}

impl VoidSaleCommand {
    async fn void_in_transaction(
        &self,
        db: &DatabaseConnection,
    ) -> Result<VoidSaleResult, ServiceError> {
        let sale_id = self.sale_id;
        let voided_by = self.voided_by;

        db.transaction::<_, VoidSaleResult, ServiceError>(|txn| {
            Box::pin(async move {
                let sale = sale::Entity::find_by_id(sale_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Sale {} not found", sale_id))
                    })?;

                if sale.status() != Some(SaleStatus::Completed) {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Sale {} has status {} and cannot be voided",
                        sale.code, sale.status
                    )));
                }

                let return_count = product_return::Entity::find()
                    .filter(product_return::Column::SaleId.eq(sale_id))
                    .count(txn)
                    .await?;
                if return_count > 0 {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Sale {} already has returns; return the remaining items instead",
                        sale.code
                    )));
                }

                let items = sale_item::Entity::find()
                    .filter(sale_item::Column::SaleId.eq(sale_id))
                    .all(txn)
                    .await?;

                for item in &items {
                    post_movement(
                        txn,
                        MovementSpec {
                            product_id: item.product_id,
                            store_id: sale.store_id,
                            movement_type: MovementType::Addition,
                            quantity: item.quantity,
                            reason: "void".to_owned(),
                            notes: Some(format!("Void of sale {}", sale.code)),
                            code: None,
                            related_store_id: None,
                            created_by: Some(voided_by),
                        },
                    )
                    .await?;
                }

                payment::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    sale_id: Set(sale.id),
                    return_id: Set(None),
                    amount: Set(-sale.total),
                    fee: Set(Decimal::ZERO),
                    net_amount: Set(-sale.total),
                    method: Set(sale.payment_method.clone()),
                    created_at: Set(Utc::now()),
                }
                .insert(txn)
                .await?;

                let mut active: sale::ActiveModel = sale.into();
                active.status = Set(SaleStatus::Voided.as_str().to_owned());
                let sale = active.update(txn).await?;

                Ok(VoidSaleResult { sale })
            })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for sale void: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })
    }
}

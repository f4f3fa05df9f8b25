use crate::{
    commands::Command,
    db::DbPool,
    entities::{product_return, product_return::ReturnStatus, return_item},
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Deletes a return that is still pending. A processed return has already
/// restocked inventory and issued a refund, so it can only be kept.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteReturnCommand {
    pub return_id: Uuid,
}

#[async_trait::async_trait]
impl Command for DeleteReturnCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, _event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        self.delete_in_transaction(db).await?;
        info!(return_id = %self.return_id, "Pending return deleted");
        Ok(())
    }
}

impl DeleteReturnCommand {
    async fn delete_in_transaction(&self, db: &DatabaseConnection) -> Result<(), ServiceError> {
        let return_id = self.return_id;

        db.transaction::<_, (), ServiceError>(|txn| {
            Box::pin(async move {
                let record = product_return::Entity::find_by_id(return_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Return {} not found", return_id))
                    })?;

                if record.status() != Some(ReturnStatus::Pending) {
                    return Err(ServiceError::Conflict(format!(
                        "Return {} has been processed and cannot be deleted",
                        record.code
                    )));
                }

                return_item::Entity::delete_many()
                    .filter(return_item::Column::ReturnId.eq(return_id))
                    .exec(txn)
                    .await?;
                record.delete(txn).await?;
                Ok(())
            })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for return deletion: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })
    }
}

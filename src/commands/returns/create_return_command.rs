use crate::{
    commands::inventory::{generate_code, post_movement, MovementSpec},
    commands::Command,
    db::DbPool,
    entities::{
        payment, product_return,
        product_return::{RefundMethod, ReturnReason, ReturnStatus},
        return_item, sale,
        sale::SaleStatus,
        sale_item,
        stock_movement::MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::RETURNS_PROCESSED,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Processes a product return against a sale: validates returnable quantities,
/// snapshots return items, restores stock through `return`-reason addition
/// movements, records the negative refund payment, and transitions the sale's
/// status — all in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReturnCommand {
    pub sale_id: Uuid,
    pub reason: ReturnReason,
    pub refund_method: RefundMethod,
    #[validate(length(min = 1, message = "A return requires at least one line item"))]
    pub items: Vec<ReturnLineInput>,
    #[validate(length(max = 500, message = "Notes may not exceed 500 characters"))]
    pub notes: Option<String>,
    pub processed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReturnLineInput {
    pub sale_item_id: Uuid,
    #[validate(range(min = 1, message = "Return quantity must be positive"))]
    pub quantity: i32,
    pub condition_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateReturnResult {
    pub product_return: product_return::Model,
    pub items: Vec<return_item::Model>,
    pub sale_status: String,
}

/// Pro-rates the tax captured on a sale line across the units being returned.
/// Uses the snapshot figures only — never re-derived from current tax rates.
pub(crate) fn pro_rated_tax(line_tax: Decimal, line_quantity: i32, returned_quantity: i32) -> Decimal {
    if line_quantity <= 0 {
        return Decimal::ZERO;
    }
    (line_tax / Decimal::from(line_quantity) * Decimal::from(returned_quantity)).round_dp(2)
}

/// Resolves the payment method a refund settles with. `store_credit` and
/// `exchange` both settle as cash-method refunds; see DESIGN.md.
pub(crate) fn refund_payment_method(refund_method: RefundMethod, sale_method: &str) -> String {
    match refund_method {
        RefundMethod::OriginalPayment => sale_method.to_owned(),
        RefundMethod::Cash | RefundMethod::StoreCredit | RefundMethod::Exchange => {
            "cash".to_owned()
        }
    }
}

#[async_trait::async_trait]
impl Command for CreateReturnCommand {
    type Result = CreateReturnResult;

    #[instrument(skip(self, db_pool, event_sender), fields(sale_id = %self.sale_id))]
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
        for line in &self.items {
            line.validate()
                .map_err(|e| ServiceError::ValidationError(format!("Invalid line item: {}", e)))?;
        }

        let db = db_pool.as_ref();
        let result = self.process_in_transaction(db).await?;

        RETURNS_PROCESSED.inc();
        info!(
            code = %result.product_return.code,
            sale_id = %self.sale_id,
            total_refund = %result.product_return.total_refund,
            sale_status = %result.sale_status,
            "Return processed"
        );
        event_sender
            .send(Event::ReturnProcessed(result.product_return.id))
            .await
            .map_err(|e| {
                let msg = format!("Failed to send event for processed return: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })?;

        Ok(result)
    }
}

impl CreateReturnCommand {
    async fn process_in_transaction(
        &self,
        db: &DatabaseConnection,
    ) -> Result<CreateReturnResult, ServiceError> {
        let command = self.clone();

        db.transaction::<_, CreateReturnResult, ServiceError>(|txn| {
            Box::pin(async move {
                let sale = sale::Entity::find_by_id(command.sale_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Sale {} not found", command.sale_id))
                    })?;

                if sale.status() == Some(SaleStatus::Voided) {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Sale {} is voided and cannot be returned against",
                        sale.code
                    )));
                }

                let sale_items: HashMap<Uuid, sale_item::Model> = sale_item::Entity::find()
                    .filter(sale_item::Column::SaleId.eq(sale.id))
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|item| (item.id, item))
                    .collect();

                let already_returned = previously_returned_quantities(txn, sale.id).await?;

                // Validate every line before any write. Lines in this request
                // targeting the same sale item count against each other too.
                let mut prepared = Vec::with_capacity(command.items.len());
                let mut requested_so_far: HashMap<Uuid, i32> = HashMap::new();
                for line in &command.items {
                    let item = sale_items.get(&line.sale_item_id).ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "Sale item {} does not belong to sale {}",
                            line.sale_item_id, sale.code
                        ))
                    })?;

                    let returned_so_far =
                        already_returned.get(&item.id).copied().unwrap_or(0)
                            + requested_so_far.get(&item.id).copied().unwrap_or(0);
                    let returnable = item.quantity - returned_so_far;
                    if line.quantity > returnable {
                        return Err(ServiceError::ReturnExceedsPurchase(format!(
                            "Cannot return {} of product {}: purchased {}, {} still returnable",
                            line.quantity, item.product_name, item.quantity, returnable
                        )));
                    }
                    *requested_so_far.entry(item.id).or_insert(0) += line.quantity;

                    let line_total = item.unit_price * Decimal::from(line.quantity);
                    let tax_refund = pro_rated_tax(item.tax, item.quantity, line.quantity);
                    prepared.push((item.clone(), line.clone(), line_total, tax_refund));
                }

                let subtotal: Decimal = prepared.iter().map(|(_, _, total, _)| *total).sum();
                let tax_refund: Decimal = prepared.iter().map(|(_, _, _, tax)| *tax).sum();
                let total_refund = subtotal + tax_refund;
                let now = Utc::now();

                let header = product_return::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    code: Set(generate_code("RET")),
                    sale_id: Set(sale.id),
                    store_id: Set(sale.store_id),
                    reason: Set(command.reason.as_str().to_owned()),
                    refund_method: Set(command.refund_method.as_str().to_owned()),
                    status: Set(ReturnStatus::Completed.as_str().to_owned()),
                    subtotal: Set(subtotal),
                    tax_refund: Set(tax_refund),
                    total_refund: Set(total_refund),
                    notes: Set(command.notes.clone()),
                    processed_by: Set(command.processed_by),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;

                let mut saved_items = Vec::with_capacity(prepared.len());
                for (item, line, line_total, line_tax_refund) in &prepared {
                    let saved = return_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        return_id: Set(header.id),
                        sale_item_id: Set(item.id),
                        product_id: Set(item.product_id),
                        quantity: Set(line.quantity),
                        unit_price: Set(item.unit_price),
                        tax_refund: Set(*line_tax_refund),
                        line_total: Set(*line_total),
                        condition_notes: Set(line.condition_notes.clone()),
                    }
                    .insert(txn)
                    .await?;
                    saved_items.push(saved);

                    post_movement(
                        txn,
                        MovementSpec {
                            product_id: item.product_id,
                            store_id: sale.store_id,
                            movement_type: MovementType::Addition,
                            quantity: line.quantity,
                            reason: "return".to_owned(),
                            notes: Some(format!("Return {} for sale {}", header.code, sale.code)),
                            code: None,
                            related_store_id: None,
                            created_by: command.processed_by,
                        },
                    )
                    .await?;
                }

                payment::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    sale_id: Set(sale.id),
                    return_id: Set(Some(header.id)),
                    amount: Set(-total_refund),
                    fee: Set(Decimal::ZERO),
                    net_amount: Set(-total_refund),
                    method: Set(refund_payment_method(
                        command.refund_method,
                        &sale.payment_method,
                    )),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;

                // Cumulative across ALL returns of this sale, not just this one.
                let returned_in_this: i32 =
                    prepared.iter().map(|(_, line, _, _)| line.quantity).sum();
                let cumulative: i32 =
                    already_returned.values().sum::<i32>() + returned_in_this;

                let sale_status = if cumulative >= sale.items_count {
                    SaleStatus::Refunded
                } else {
                    SaleStatus::PartiallyRefunded
                };
                let mut active: sale::ActiveModel = sale.into();
                active.status = Set(sale_status.as_str().to_owned());
                let sale = active.update(txn).await?;

                Ok(CreateReturnResult {
                    product_return: header,
                    items: saved_items,
                    sale_status: sale.status,
                })
            })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for return processing: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })
    }
}

/// Sums quantities already returned per sale item, across every prior return
/// of the sale.
async fn previously_returned_quantities<C: sea_orm::ConnectionTrait>(
    conn: &C,
    sale_id: Uuid,
) -> Result<HashMap<Uuid, i32>, ServiceError> {
    let return_ids: Vec<Uuid> = product_return::Entity::find()
        .filter(product_return::Column::SaleId.eq(sale_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let mut totals: HashMap<Uuid, i32> = HashMap::new();
    if return_ids.is_empty() {
        return Ok(totals);
    }

    let items = return_item::Entity::find()
        .filter(return_item::Column::ReturnId.is_in(return_ids))
        .all(conn)
        .await?;
    for item in items {
        *totals.entry(item.sale_item_id).or_insert(0) += item.quantity;
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tax_refund_is_pro_rated_from_snapshot() {
        // 3 units carried 1.50 tax; returning 1 refunds a third of it.
        assert_eq!(pro_rated_tax(dec!(1.50), 3, 1), dec!(0.50));
        assert_eq!(pro_rated_tax(dec!(1.50), 3, 3), dec!(1.50));
        assert_eq!(pro_rated_tax(Decimal::ZERO, 3, 2), Decimal::ZERO);
    }

    #[test]
    fn tax_refund_handles_degenerate_quantity() {
        assert_eq!(pro_rated_tax(dec!(1.50), 0, 1), Decimal::ZERO);
    }

    #[test]
    fn store_credit_and_exchange_settle_as_cash() {
        assert_eq!(
            refund_payment_method(RefundMethod::OriginalPayment, "card"),
            "card"
        );
        assert_eq!(refund_payment_method(RefundMethod::Cash, "card"), "cash");
        assert_eq!(
            refund_payment_method(RefundMethod::StoreCredit, "card"),
            "cash"
        );
        assert_eq!(
            refund_payment_method(RefundMethod::Exchange, "transfer"),
            "cash"
        );
    }

    #[test]
    fn rejects_empty_item_list() {
        let cmd = CreateReturnCommand {
            sale_id: Uuid::new_v4(),
            reason: ReturnReason::Defective,
            refund_method: RefundMethod::Cash,
            items: vec![],
            notes: None,
            processed_by: None,
        };
        assert!(cmd.validate().is_err());
    }
}

use crate::{
    commands::inventory::{generate_code, post_checked_sale_reduction, SaleStockOutcome},
    commands::Command,
    db::DbPool,
    entities::{
        customer, payment, product, sale,
        sale::{PaymentMethod, SaleStatus},
        sale_item, store,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{SALES_COMPLETED, SALES_REJECTED},
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

/// Creates a sale transaction atomically: guarded stock decrements with their
/// reduction ledger rows, the immutable sale header and item snapshots, the
/// payment record, and customer purchase aggregates all commit together or
/// not at all.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSaleCommand {
    pub store_id: Uuid,
    pub cashier_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, message = "A sale requires at least one line item"))]
    pub items: Vec<SaleLineInput>,
    /// Header-level discount, independent of any line-level figures.
    #[serde(default)]
    pub discount: Decimal,
    /// Header-level tax, independent of any line-level figures.
    #[serde(default)]
    pub tax: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Line-level discount captured for receipt display only.
    #[serde(default)]
    pub discount: Decimal,
    /// Line-level tax captured for receipt display only.
    #[serde(default)]
    pub tax: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSaleResult {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
}

/// Line enriched with the product snapshot, ready for persistence.
#[derive(Debug, Clone)]
struct PreparedLine {
    product_id: Uuid,
    product_name: String,
    product_sku: String,
    unit_price: Decimal,
    quantity: i32,
    discount: Decimal,
    tax: Decimal,
    line_total: Decimal,
}

/// Header aggregates computed from the prepared lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SaleTotals {
    pub subtotal: Decimal,
    pub total: Decimal,
    pub items_count: i32,
}

pub(crate) fn compute_totals(
    lines: &[(Decimal, i32)],
    discount: Decimal,
    tax: Decimal,
) -> SaleTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|(unit_price, quantity)| *unit_price * Decimal::from(*quantity))
        .sum();
    let items_count: i32 = lines.iter().map(|(_, quantity)| quantity).sum();
    SaleTotals {
        subtotal,
        total: subtotal - discount + tax,
        items_count,
    }
}

#[async_trait::async_trait]
impl Command for CreateSaleCommand {
    type Result = CreateSaleResult;

    #[instrument(skip(self, db_pool, event_sender), fields(store_id = %self.store_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate_input().map_err(|e| {
            SALES_REJECTED.with_label_values(&["validation_error"]).inc();
            e
        })?;

        let db = db_pool.as_ref();
        let lines = self.prepare_lines(db).await?;

        let result = self.create_in_transaction(db, lines).await.map_err(|e| {
            let label = match &e {
                ServiceError::InsufficientStock(_) => "insufficient_stock",
                _ => "processing_error",
            };
            SALES_REJECTED.with_label_values(&[label]).inc();
            e
        })?;

        SALES_COMPLETED.inc();
        self.log_and_trigger_event(&event_sender, &result).await?;

        Ok(result)
    }
}

impl CreateSaleCommand {
    fn validate_input(&self) -> Result<(), ServiceError> {
        self.validate().map_err(|e| {
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;
        for line in &self.items {
            line.validate().map_err(|e| {
                let msg = format!("Invalid line item: {}", e);
                error!("{}", msg);
                ServiceError::ValidationError(msg)
            })?;
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Unit price may not be negative".to_owned(),
                ));
            }
            if line.discount < Decimal::ZERO || line.tax < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Line discount and tax may not be negative".to_owned(),
                ));
            }
        }
        if self.discount < Decimal::ZERO || self.tax < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount and tax may not be negative".to_owned(),
            ));
        }
        Ok(())
    }

    /// Resolves product snapshots outside the transaction; the stock guard
    /// inside it is what protects against concurrent change.
    async fn prepare_lines(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Vec<PreparedLine>, ServiceError> {
        store::Entity::find_by_id(self.store_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", self.store_id)))?;

        let product_ids: Vec<Uuid> = self.items.iter().map(|l| l.product_id).collect();
        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        self.items
            .iter()
            .map(|line| {
                let product = products.get(&line.product_id).ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
                Ok(PreparedLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_sku: product.sku.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    discount: line.discount,
                    tax: line.tax,
                    line_total: line.unit_price * Decimal::from(line.quantity),
                })
            })
            .collect()
    }

    async fn create_in_transaction(
        &self,
        db: &DatabaseConnection,
        lines: Vec<PreparedLine>,
    ) -> Result<CreateSaleResult, ServiceError> {
        let store_id = self.store_id;
        let cashier_id = self.cashier_id;
        let customer_id = self.customer_id;
        let payment_method = self.payment_method;
        let discount = self.discount;
        let tax = self.tax;

        db.transaction::<_, CreateSaleResult, ServiceError>(|txn| {
            Box::pin(async move {
                // Guarded decrement per line; any shortage aborts the whole sale.
                for line in &lines {
                    let outcome = post_checked_sale_reduction(
                        txn,
                        line.product_id,
                        store_id,
                        line.quantity,
                        cashier_id,
                    )
                    .await?;
                    if let SaleStockOutcome::Short { available } = outcome {
                        return Err(ServiceError::InsufficientStock(format!(
                            "Insufficient stock for product {} ({}): requested {}, available {}",
                            line.product_name, line.product_sku, line.quantity, available
                        )));
                    }
                }

                let totals = compute_totals(
                    &lines
                        .iter()
                        .map(|l| (l.unit_price, l.quantity))
                        .collect::<Vec<_>>(),
                    discount,
                    tax,
                );

                let now = Utc::now();
                let sale = sale::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    code: Set(generate_code("SALE")),
                    store_id: Set(store_id),
                    cashier_id: Set(cashier_id),
                    customer_id: Set(customer_id),
                    subtotal: Set(totals.subtotal),
                    discount: Set(discount),
                    tax: Set(tax),
                    total: Set(totals.total),
                    items_count: Set(totals.items_count),
                    status: Set(SaleStatus::Completed.as_str().to_owned()),
                    payment_method: Set(payment_method.as_str().to_owned()),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;

                let mut saved_items = Vec::with_capacity(lines.len());
                for line in &lines {
                    let item = sale_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        sale_id: Set(sale.id),
                        product_id: Set(line.product_id),
                        product_name: Set(line.product_name.clone()),
                        product_sku: Set(line.product_sku.clone()),
                        unit_price: Set(line.unit_price),
                        quantity: Set(line.quantity),
                        discount: Set(line.discount),
                        tax: Set(line.tax),
                        line_total: Set(line.line_total),
                    }
                    .insert(txn)
                    .await?;
                    saved_items.push(item);
                }

                payment::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    sale_id: Set(sale.id),
                    return_id: Set(None),
                    amount: Set(totals.total),
                    fee: Set(Decimal::ZERO),
                    net_amount: Set(totals.total),
                    method: Set(payment_method.as_str().to_owned()),
                    created_at: Set(now),
                }
                .insert(txn)
                .await?;

                if let Some(customer_id) = customer_id {
                    let existing = customer::Entity::find_by_id(customer_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Customer {} not found", customer_id))
                        })?;
                    let total_purchases = existing.total_purchases + 1;
                    let total_spent = existing.total_spent + totals.total;
                    let mut active: customer::ActiveModel = existing.into();
                    active.total_purchases = Set(total_purchases);
                    active.total_spent = Set(total_spent);
                    active.last_purchase_at = Set(Some(now));
                    active.updated_at = Set(Some(now));
                    active.update(txn).await?;
                }

                Ok(CreateSaleResult {
                    sale,
                    items: saved_items,
                })
            })
        })
        .await
        .map_err(|e| {
            error!("Transaction failed for sale creation: {}", e);
            match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            }
        })
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        result: &CreateSaleResult,
    ) -> Result<(), ServiceError> {
        info!(
            code = %result.sale.code,
            store_id = %self.store_id,
            cashier_id = %self.cashier_id,
            total = %result.sale.total,
            items_count = %result.sale.items_count,
            "Sale completed"
        );
        event_sender
            .send(Event::SaleCompleted(result.sale.id))
            .await
            .map_err(|e| {
                let msg = format!("Failed to send event for completed sale: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_sum_lines_and_apply_header_figures() {
        let totals = compute_totals(
            &[(dec!(10.00), 3), (dec!(2.50), 2)],
            dec!(5.00),
            dec!(1.75),
        );
        assert_eq!(totals.subtotal, dec!(35.00));
        assert_eq!(totals.total, dec!(31.75));
        assert_eq!(totals.items_count, 5);
    }

    #[test]
    fn totals_for_single_line_without_adjustments() {
        let totals = compute_totals(&[(dec!(10.00), 3)], Decimal::ZERO, Decimal::ZERO);
        assert_eq!(totals.subtotal, dec!(30.00));
        assert_eq!(totals.total, dec!(30.00));
        assert_eq!(totals.items_count, 3);
    }

    #[test]
    fn rejects_empty_item_list() {
        let cmd = CreateSaleCommand {
            store_id: Uuid::new_v4(),
            cashier_id: Uuid::new_v4(),
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            items: vec![],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
        };
        assert!(cmd.validate_input().is_err());
    }

    #[test]
    fn rejects_negative_unit_price() {
        let cmd = CreateSaleCommand {
            store_id: Uuid::new_v4(),
            cashier_id: Uuid::new_v4(),
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            items: vec![SaleLineInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: dec!(-1.00),
                discount: Decimal::ZERO,
                tax: Decimal::ZERO,
            }],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
        };
        assert!(cmd.validate_input().is_err());
    }
}

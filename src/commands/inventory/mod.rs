//! Stock movement commands and the shared posting primitives.
//!
//! Every stock change in the system flows through [`post_movement`] or
//! [`post_checked_sale_reduction`]: both write the immutable ledger row and
//! mutate the `product_store` counter in the caller's transaction, so the
//! ledger and the counter can never drift apart.

pub mod record_movement_command;
pub mod transfer_stock_command;

use crate::{
    entities::{
        product_store,
        stock_movement::{self, MovementType},
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

pub use record_movement_command::{RecordMovementCommand, RecordMovementResult};
pub use transfer_stock_command::{TransferStockCommand, TransferStockResult};

/// Generates a human-readable prefixed code, e.g. `MOV-20250114-3FA29C1B`.
/// Assigned once at creation; a unique index guards against reuse.
pub(crate) fn generate_code(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d"),
        suffix[..8].to_uppercase()
    )
}

/// Computes the stock level after applying a movement.
///
/// Additions and transfers-in are deltas upward, reductions and transfers-out
/// are deltas downward clamped at zero, and adjustments SET the level to the
/// quantity (the quantity is the new absolute total, not a change amount).
pub(crate) fn next_stock(current: i32, movement_type: MovementType, quantity: i32) -> i32 {
    match movement_type {
        MovementType::Addition | MovementType::TransferIn => current.saturating_add(quantity),
        MovementType::Reduction | MovementType::TransferOut => (current - quantity).max(0),
        MovementType::Adjustment => quantity,
    }
}

/// Everything needed to post one ledger entry.
pub(crate) struct MovementSpec {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub code: Option<String>,
    pub related_store_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

pub(crate) struct PostedMovement {
    pub movement: stock_movement::Model,
    pub stock_level: product_store::Model,
}

/// Finds the stock row for a (product, store) pair, creating it with stock 0
/// when it does not exist yet.
pub(crate) async fn ensure_product_store<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    store_id: Uuid,
) -> Result<product_store::Model, ServiceError> {
    let existing = product_store::Entity::find()
        .filter(product_store::Column::ProductId.eq(product_id))
        .filter(product_store::Column::StoreId.eq(store_id))
        .one(conn)
        .await?;

    if let Some(row) = existing {
        return Ok(row);
    }

    let row = product_store::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        store_id: Set(store_id),
        stock: Set(0),
        low_stock_threshold: Set(0),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    };
    Ok(row.insert(conn).await?)
}

/// Posts one stock movement: appends the ledger row and applies its effect to
/// the `product_store` counter. Must be called inside the transaction that
/// owns the overall operation.
pub(crate) async fn post_movement<C: ConnectionTrait>(
    conn: &C,
    spec: MovementSpec,
) -> Result<PostedMovement, ServiceError> {
    let current = ensure_product_store(conn, spec.product_id, spec.store_id).await?;
    let previous_stock = current.stock;
    let new_stock = next_stock(previous_stock, spec.movement_type, spec.quantity);

    let mut level: product_store::ActiveModel = current.into();
    level.stock = Set(new_stock);
    level.updated_at = Set(Some(Utc::now()));
    let stock_level = level.update(conn).await?;

    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(spec
            .code
            .unwrap_or_else(|| generate_code("MOV"))),
        product_id: Set(spec.product_id),
        store_id: Set(spec.store_id),
        movement_type: Set(spec.movement_type.as_str().to_owned()),
        quantity: Set(spec.quantity),
        previous_stock: Set(previous_stock),
        new_stock: Set(new_stock),
        reason: Set(spec.reason),
        notes: Set(spec.notes),
        related_store_id: Set(spec.related_store_id),
        created_by: Set(spec.created_by),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(PostedMovement {
        movement,
        stock_level,
    })
}

/// Outcome of the guarded decrement used by the sale pathway.
pub(crate) enum SaleStockOutcome {
    /// Stock was decremented and the reduction ledger row written.
    Applied {
        movement: stock_movement::Model,
        new_stock: i32,
    },
    /// The conditional decrement matched no row: not enough stock.
    Short { available: i32 },
}

/// Decrements stock for one sale line with an atomic conditional update
/// (`stock = stock - qty WHERE ... AND stock >= qty`), then appends the
/// matching `reduction` ledger row. Concurrent sales racing on the same row
/// cannot jointly oversell: the row predicate is evaluated by the database.
pub(crate) async fn post_checked_sale_reduction<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    store_id: Uuid,
    quantity: i32,
    cashier_id: Uuid,
) -> Result<SaleStockOutcome, ServiceError> {
    ensure_product_store(conn, product_id, store_id).await?;

    let result = product_store::Entity::update_many()
        .col_expr(
            product_store::Column::Stock,
            Expr::col(product_store::Column::Stock).sub(quantity),
        )
        .col_expr(
            product_store::Column::UpdatedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(product_store::Column::ProductId.eq(product_id))
        .filter(product_store::Column::StoreId.eq(store_id))
        .filter(product_store::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    let row = product_store::Entity::find()
        .filter(product_store::Column::ProductId.eq(product_id))
        .filter(product_store::Column::StoreId.eq(store_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Stock row vanished for product {} in store {}",
                product_id, store_id
            ))
        })?;

    if result.rows_affected == 0 {
        return Ok(SaleStockOutcome::Short {
            available: row.stock,
        });
    }

    let new_stock = row.stock;
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(generate_code("MOV")),
        product_id: Set(product_id),
        store_id: Set(store_id),
        movement_type: Set(MovementType::Reduction.as_str().to_owned()),
        quantity: Set(quantity),
        previous_stock: Set(new_stock + quantity),
        new_stock: Set(new_stock),
        reason: Set("sale".to_owned()),
        notes: Set(None),
        related_store_id: Set(None),
        created_by: Set(Some(cashier_id)),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    Ok(SaleStockOutcome::Applied {
        movement,
        new_stock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adjustment_sets_absolute_level() {
        assert_eq!(next_stock(50, MovementType::Adjustment, 30), 30);
        assert_eq!(next_stock(0, MovementType::Adjustment, 75), 75);
    }

    #[test]
    fn reduction_clamps_at_zero() {
        assert_eq!(next_stock(5, MovementType::Reduction, 8), 0);
        assert_eq!(next_stock(5, MovementType::TransferOut, 8), 0);
        assert_eq!(next_stock(8, MovementType::Reduction, 5), 3);
    }

    #[test]
    fn additions_are_deltas() {
        assert_eq!(next_stock(5, MovementType::Addition, 8), 13);
        assert_eq!(next_stock(5, MovementType::TransferIn, 8), 13);
    }

    #[test]
    fn generated_codes_carry_prefix() {
        let code = generate_code("MOV");
        assert!(code.starts_with("MOV-"));
        assert_eq!(code.split('-').count(), 3);
    }

    proptest! {
        #[test]
        fn next_stock_never_negative(
            current in 0i32..100_000,
            quantity in 0i32..100_000,
            which in 0usize..5,
        ) {
            let movement_type = [
                MovementType::Addition,
                MovementType::Reduction,
                MovementType::TransferOut,
                MovementType::TransferIn,
                MovementType::Adjustment,
            ][which];
            prop_assert!(next_stock(current, movement_type, quantity) >= 0);
        }

        #[test]
        fn adjustment_ignores_current_level(
            current in 0i32..100_000,
            quantity in 0i32..100_000,
        ) {
            prop_assert_eq!(next_stock(current, MovementType::Adjustment, quantity), quantity);
        }
    }
}

mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storeline_api::{
    commands::returns::{CreateReturnCommand, ReturnLineInput},
    commands::sales::{CreateSaleCommand, CreateSaleResult, SaleLineInput},
    entities::{
        product_return::{RefundMethod, ReturnReason},
        sale::PaymentMethod,
    },
    errors::ServiceError,
};
use uuid::Uuid;

fn return_command(
    sale_id: Uuid,
    lines: Vec<(Uuid, i32)>,
    refund_method: RefundMethod,
) -> CreateReturnCommand {
    CreateReturnCommand {
        sale_id,
        reason: ReturnReason::Defective,
        refund_method,
        items: lines
            .into_iter()
            .map(|(sale_item_id, quantity)| ReturnLineInput {
                sale_item_id,
                quantity,
                condition_notes: None,
            })
            .collect(),
        notes: None,
        processed_by: None,
    }
}

async fn seed_sale_with_tax(
    app: &TestApp,
    quantity: i32,
    unit_price: Decimal,
    line_tax: Decimal,
) -> (CreateSaleResult, Uuid, Uuid) {
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", unit_price, dec!(0.50)).await;
    app.set_stock(product.id, store.id, 100).await;

    let sale = app
        .state
        .sale_service()
        .create_sale(CreateSaleCommand {
            store_id: store.id,
            cashier_id: Uuid::new_v4(),
            customer_id: None,
            payment_method: PaymentMethod::Card,
            items: vec![SaleLineInput {
                product_id: product.id,
                quantity,
                unit_price,
                discount: Decimal::ZERO,
                tax: line_tax,
            }],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
        })
        .await
        .expect("sale should succeed");
    (sale, product.id, store.id)
}

#[tokio::test]
async fn over_return_is_rejected_with_zero_rows() {
    let app = TestApp::new().await;
    let (sale, product_id, store_id) =
        seed_sale_with_tax(&app, 2, dec!(10.00), Decimal::ZERO).await;
    let stock_after_sale = app.stock_of(product_id, store_id).await;

    let err = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(sale.items[0].id, 3)],
            RefundMethod::Cash,
        ))
        .await
        .expect_err("returning 3 of 2 must fail");
    match err {
        ServiceError::ReturnExceedsPurchase(msg) => {
            assert!(msg.contains("3"));
            assert!(msg.contains("purchased 2"));
        }
        other => panic!("expected ReturnExceedsPurchase, got {:?}", other),
    }

    // Nothing was written: no returns, no stock restoration, status unchanged.
    let (returns, total) = app
        .state
        .return_service()
        .list_returns(1, 10, None)
        .await
        .unwrap();
    assert!(returns.is_empty());
    assert_eq!(total, 0);
    assert_eq!(app.stock_of(product_id, store_id).await, stock_after_sale);
    let details = app
        .state
        .sale_service()
        .get_sale(&sale.sale.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(details.sale.status, "completed");
}

#[tokio::test]
async fn cumulative_returns_cannot_exceed_purchase() {
    let app = TestApp::new().await;
    let (sale, _, _) = seed_sale_with_tax(&app, 3, dec!(10.00), Decimal::ZERO).await;
    let line = sale.items[0].id;

    app.state
        .return_service()
        .create_return(return_command(sale.sale.id, vec![(line, 2)], RefundMethod::Cash))
        .await
        .expect("first partial return should succeed");

    let err = app
        .state
        .return_service()
        .create_return(return_command(sale.sale.id, vec![(line, 2)], RefundMethod::Cash))
        .await
        .expect_err("cumulative 4 of 3 must fail");
    assert!(matches!(err, ServiceError::ReturnExceedsPurchase(_)));

    // The one remaining unit can still come back, completing the refund.
    let result = app
        .state
        .return_service()
        .create_return(return_command(sale.sale.id, vec![(line, 1)], RefundMethod::Cash))
        .await
        .expect("final unit should be returnable");
    assert_eq!(result.sale_status, "refunded");
}

#[tokio::test]
async fn duplicate_lines_in_one_request_count_together() {
    let app = TestApp::new().await;
    let (sale, _, _) = seed_sale_with_tax(&app, 3, dec!(10.00), Decimal::ZERO).await;
    let line = sale.items[0].id;

    // 2 + 2 of a 3-unit line must fail even though each line alone fits.
    let err = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(line, 2), (line, 2)],
            RefundMethod::Cash,
        ))
        .await
        .expect_err("duplicate lines must be counted together");
    assert!(matches!(err, ServiceError::ReturnExceedsPurchase(_)));

    let (returns, _) = app
        .state
        .return_service()
        .list_returns(1, 10, None)
        .await
        .unwrap();
    assert!(returns.is_empty());
}

#[tokio::test]
async fn partial_then_full_return_transitions_status() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let a = app.seed_product("A", dec!(10.00), dec!(4.00)).await;
    let b = app.seed_product("B", dec!(5.00), dec!(2.00)).await;
    app.set_stock(a.id, store.id, 10).await;
    app.set_stock(b.id, store.id, 10).await;

    // Two lines of quantity 2 each; items_count = 4.
    let sale = app
        .state
        .sale_service()
        .create_sale(CreateSaleCommand {
            store_id: store.id,
            cashier_id: Uuid::new_v4(),
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            items: vec![
                SaleLineInput {
                    product_id: a.id,
                    quantity: 2,
                    unit_price: dec!(10.00),
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                },
                SaleLineInput {
                    product_id: b.id,
                    quantity: 2,
                    unit_price: dec!(5.00),
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                },
            ],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
        })
        .await
        .expect("sale should succeed");

    let first = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(sale.items[0].id, 2), (sale.items[1].id, 1)],
            RefundMethod::Cash,
        ))
        .await
        .expect("partial return should succeed");
    assert_eq!(first.sale_status, "partially_refunded");

    let second = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(sale.items[1].id, 1)],
            RefundMethod::Cash,
        ))
        .await
        .expect("final return should succeed");
    assert_eq!(second.sale_status, "refunded");

    // All stock restored.
    assert_eq!(app.stock_of(a.id, store.id).await, 10);
    assert_eq!(app.stock_of(b.id, store.id).await, 10);
}

#[tokio::test]
async fn tax_refund_is_pro_rated_from_the_snapshot() {
    let app = TestApp::new().await;
    let (sale, _, _) = seed_sale_with_tax(&app, 3, dec!(10.00), dec!(1.50)).await;

    let result = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(sale.items[0].id, 1)],
            RefundMethod::Cash,
        ))
        .await
        .expect("return should succeed");

    assert_eq!(result.product_return.subtotal, dec!(10.00));
    assert_eq!(result.product_return.tax_refund, dec!(0.50));
    assert_eq!(result.product_return.total_refund, dec!(10.50));
    assert!(result.product_return.code.starts_with("RET-"));
}

#[tokio::test]
async fn refund_method_resolution() {
    let app = TestApp::new().await;
    let (sale, _, _) = seed_sale_with_tax(&app, 4, dec!(10.00), Decimal::ZERO).await;
    let line = sale.items[0].id;

    // original_payment follows the sale's method (card).
    app.state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(line, 1)],
            RefundMethod::OriginalPayment,
        ))
        .await
        .expect("return should succeed");

    // store_credit settles as a cash-method refund.
    app.state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(line, 1)],
            RefundMethod::StoreCredit,
        ))
        .await
        .expect("return should succeed");

    let details = app
        .state
        .sale_service()
        .get_sale(&sale.sale.id)
        .await
        .unwrap()
        .unwrap();
    let refunds: Vec<_> = details
        .payments
        .iter()
        .filter(|p| p.amount < Decimal::ZERO)
        .collect();
    assert_eq!(refunds.len(), 2);
    assert!(refunds.iter().any(|p| p.method == "card"));
    assert!(refunds.iter().any(|p| p.method == "cash"));
    for refund in refunds {
        assert_eq!(refund.amount, dec!(-10.00));
        assert!(refund.return_id.is_some());
    }
}

#[tokio::test]
async fn processed_return_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (sale, _, _) = seed_sale_with_tax(&app, 2, dec!(10.00), Decimal::ZERO).await;

    let created = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(sale.items[0].id, 1)],
            RefundMethod::Cash,
        ))
        .await
        .expect("return should succeed");

    let err = app
        .state
        .return_service()
        .delete_return(created.product_return.id)
        .await
        .expect_err("processed return must not be deletable");
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Still present.
    assert!(app
        .state
        .return_service()
        .get_return(&created.product_return.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn return_line_must_belong_to_the_sale() {
    let app = TestApp::new().await;
    let (sale, _, _) = seed_sale_with_tax(&app, 2, dec!(10.00), Decimal::ZERO).await;

    let err = app
        .state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(Uuid::new_v4(), 1)],
            RefundMethod::Cash,
        ))
        .await
        .expect_err("foreign sale item must be rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn return_restocks_through_the_ledger() {
    let app = TestApp::new().await;
    let (sale, product_id, store_id) =
        seed_sale_with_tax(&app, 2, dec!(10.00), Decimal::ZERO).await;

    app.state
        .return_service()
        .create_return(return_command(
            sale.sale.id,
            vec![(sale.items[0].id, 2)],
            RefundMethod::Cash,
        ))
        .await
        .expect("return should succeed");

    let (movements, _) = app
        .state
        .inventory_service()
        .list_movements(1, 50, Some(product_id), Some(store_id))
        .await
        .unwrap();
    let restock = movements
        .iter()
        .find(|m| m.reason == "return")
        .expect("return movement should be in the ledger");
    assert_eq!(restock.movement_type, "addition");
    assert_eq!(restock.quantity, 2);
}

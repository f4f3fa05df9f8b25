mod common;

use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storeline_api::{
    commands::returns::{CreateReturnCommand, ReturnLineInput},
    commands::sales::{CreateSaleCommand, SaleLineInput},
    entities::{
        product_return::{RefundMethod, ReturnReason},
        sale::{PaymentMethod, SaleStatus},
    },
    errors::ServiceError,
};
use uuid::Uuid;

#[tokio::test]
async fn end_to_end_sale_and_return() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", dec!(10.00), dec!(10.00)).await;
    app.set_stock(product.id, store.id, 50).await;

    // Sell 3 units at 10.00, no discount, no tax.
    let sale = app
        .sell(store.id, product.id, 3, dec!(10.00))
        .await
        .expect("sale should succeed");
    assert_eq!(app.stock_of(product.id, store.id).await, 47);
    assert_eq!(sale.sale.total, dec!(30.00));
    assert_eq!(sale.sale.items_count, 3);
    assert_eq!(sale.sale.status, "completed");

    let details = app
        .state
        .sale_service()
        .get_sale(&sale.sale.id)
        .await
        .unwrap()
        .expect("sale should be readable");
    assert_eq!(details.payments.len(), 1);
    assert_eq!(details.payments[0].amount, dec!(30.00));

    // Return one unit, defective, refunded in cash.
    let result = app
        .state
        .return_service()
        .create_return(CreateReturnCommand {
            sale_id: sale.sale.id,
            reason: ReturnReason::Defective,
            refund_method: RefundMethod::Cash,
            items: vec![ReturnLineInput {
                sale_item_id: sale.items[0].id,
                quantity: 1,
                condition_notes: None,
            }],
            notes: None,
            processed_by: None,
        })
        .await
        .expect("return should succeed");

    assert_eq!(app.stock_of(product.id, store.id).await, 48);
    assert_eq!(result.product_return.total_refund, dec!(10.00));
    assert_eq!(result.sale_status, "partially_refunded");

    let details = app
        .state
        .sale_service()
        .get_sale(&sale.sale.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(details.sale.status(), Some(SaleStatus::PartiallyRefunded));
    let refund = details
        .payments
        .iter()
        .find(|p| p.amount < Decimal::ZERO)
        .expect("refund payment should exist");
    assert_eq!(refund.amount, dec!(-10.00));
    assert_eq!(refund.method, "cash");
}

#[tokio::test]
async fn insufficient_stock_persists_nothing() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("SCARCE", dec!(5.00), dec!(2.00)).await;
    app.set_stock(product.id, store.id, 2).await;

    let err = app
        .sell(store.id, product.id, 3, dec!(5.00))
        .await
        .expect_err("sale should be rejected");
    match err {
        ServiceError::InsufficientStock(msg) => {
            assert!(msg.contains("SCARCE"));
            assert!(msg.contains("requested 3"));
            assert!(msg.contains("available 2"));
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    // No partial state: stock untouched, no sale rows, only the seed movement.
    assert_eq!(app.stock_of(product.id, store.id).await, 2);
    let (sales, total) = app
        .state
        .sale_service()
        .list_sales(1, 10, None)
        .await
        .unwrap();
    assert!(sales.is_empty());
    assert_eq!(total, 0);
    let (movements, _) = app
        .state
        .inventory_service()
        .list_movements(1, 50, Some(product.id), None)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1, "only the seed adjustment should exist");
}

#[tokio::test]
async fn multi_line_sale_rolls_back_on_late_shortage() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let plenty = app.seed_product("PLENTY", dec!(1.00), dec!(0.50)).await;
    let scarce = app.seed_product("SCARCE", dec!(1.00), dec!(0.50)).await;
    app.set_stock(plenty.id, store.id, 100).await;
    app.set_stock(scarce.id, store.id, 1).await;

    let err = app
        .state
        .sale_service()
        .create_sale(CreateSaleCommand {
            store_id: store.id,
            cashier_id: Uuid::new_v4(),
            customer_id: None,
            payment_method: PaymentMethod::Card,
            items: vec![
                SaleLineInput {
                    product_id: plenty.id,
                    quantity: 10,
                    unit_price: dec!(1.00),
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                },
                SaleLineInput {
                    product_id: scarce.id,
                    quantity: 2,
                    unit_price: dec!(1.00),
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                },
            ],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
        })
        .await
        .expect_err("second line shortage must fail the sale");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The first line's decrement must have rolled back too.
    assert_eq!(app.stock_of(plenty.id, store.id).await, 100);
    assert_eq!(app.stock_of(scarce.id, store.id).await, 1);
}

#[tokio::test]
async fn header_discount_and_tax_shape_the_total() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let a = app.seed_product("A", dec!(10.00), dec!(4.00)).await;
    let b = app.seed_product("B", dec!(2.50), dec!(1.00)).await;
    app.set_stock(a.id, store.id, 10).await;
    app.set_stock(b.id, store.id, 10).await;

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
                    quantity: 3,
                    unit_price: dec!(10.00),
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                },
                SaleLineInput {
                    product_id: b.id,
                    quantity: 2,
                    unit_price: dec!(2.50),
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                },
            ],
            discount: dec!(5.00),
            tax: dec!(1.75),
        })
        .await
        .expect("sale should succeed");

    assert_eq!(sale.sale.subtotal, dec!(35.00));
    assert_eq!(sale.sale.total, dec!(31.75));
    assert_eq!(sale.sale.items_count, 5);
}

#[tokio::test]
async fn sale_updates_customer_aggregates() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", dec!(10.00), dec!(4.00)).await;
    let customer = app.seed_customer("Ada").await;
    app.set_stock(product.id, store.id, 10).await;

    app.state
        .sale_service()
        .create_sale(CreateSaleCommand {
            store_id: store.id,
            cashier_id: Uuid::new_v4(),
            customer_id: Some(customer.id),
            payment_method: PaymentMethod::Card,
            items: vec![SaleLineInput {
                product_id: product.id,
                quantity: 2,
                unit_price: dec!(10.00),
                discount: Decimal::ZERO,
                tax: Decimal::ZERO,
            }],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
        })
        .await
        .expect("sale should succeed");

    let updated = app
        .state
        .customer_service()
        .get_customer(&customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.total_purchases, 1);
    assert_eq!(updated.total_spent, dec!(20.00));
    assert!(updated.last_purchase_at.is_some());
}

#[tokio::test]
async fn sale_codes_are_unique_and_prefixed() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", dec!(1.00), dec!(0.50)).await;
    app.set_stock(product.id, store.id, 100).await;

    let mut codes = Vec::new();
    for _ in 0..5 {
        let sale = app
            .sell(store.id, product.id, 1, dec!(1.00))
            .await
            .expect("sale should succeed");
        assert!(sale.sale.code.starts_with("SALE-"));
        codes.push(sale.sale.code);
    }
    let before = codes.len();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), before, "sale codes must be unique");
}

#[tokio::test]
async fn concurrent_sales_never_oversell() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("HOT", dec!(1.00), dec!(0.50)).await;
    app.set_stock(product.id, store.id, 10).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let sales = app.state.sale_service();
        let store_id = store.id;
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            sales
                .create_sale(CreateSaleCommand {
                    store_id,
                    cashier_id: Uuid::new_v4(),
                    customer_id: None,
                    payment_method: PaymentMethod::Cash,
                    items: vec![SaleLineInput {
                        product_id,
                        quantity: 1,
                        unit_price: dec!(1.00),
                        discount: Decimal::ZERO,
                        tax: Decimal::ZERO,
                    }],
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                })
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            successes += 1;
        }
    }

    assert_eq!(successes, 10, "exactly the available stock can be sold");
    assert_eq!(app.stock_of(product.id, store.id).await, 0);
}

#[tokio::test]
async fn sale_with_unknown_product_is_rejected() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;

    let err = app
        .sell(store.id, Uuid::new_v4(), 1, dec!(1.00))
        .await
        .expect_err("unknown product must be rejected");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn void_restores_stock_and_blocks_returns() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", dec!(10.00), dec!(4.00)).await;
    app.set_stock(product.id, store.id, 10).await;

    let sale = app
        .sell(store.id, product.id, 4, dec!(10.00))
        .await
        .expect("sale should succeed");
    assert_eq!(app.stock_of(product.id, store.id).await, 6);

    let voided = app
        .state
        .sale_service()
        .void_sale(storeline_api::commands::sales::VoidSaleCommand {
            sale_id: sale.sale.id,
            voided_by: Uuid::new_v4(),
        })
        .await
        .expect("void should succeed");
    assert_eq!(voided.sale.status, "voided");
    assert_eq!(app.stock_of(product.id, store.id).await, 10);

    // The reversing payment nets the sale to zero.
    let details = app
        .state
        .sale_service()
        .get_sale(&sale.sale.id)
        .await
        .unwrap()
        .unwrap();
    let net: Decimal = details.payments.iter().map(|p| p.amount).sum();
    assert_eq!(net, Decimal::ZERO);

    // A voided sale cannot be returned against or voided twice.
    let err = app
        .state
        .return_service()
        .create_return(CreateReturnCommand {
            sale_id: sale.sale.id,
            reason: ReturnReason::Other,
            refund_method: RefundMethod::Cash,
            items: vec![ReturnLineInput {
                sale_item_id: sale.items[0].id,
                quantity: 1,
                condition_notes: None,
            }],
            notes: None,
            processed_by: None,
        })
        .await
        .expect_err("return on voided sale must fail");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    let err = app
        .state
        .sale_service()
        .void_sale(storeline_api::commands::sales::VoidSaleCommand {
            sale_id: sale.sale.id,
            voided_by: Uuid::new_v4(),
        })
        .await
        .expect_err("double void must fail");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

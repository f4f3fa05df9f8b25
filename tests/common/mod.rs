#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use storeline_api::{
    commands::inventory::RecordMovementCommand,
    commands::sales::{CreateSaleCommand, CreateSaleResult, SaleLineInput},
    config::AppConfig,
    db,
    entities::{
        customer, product, sale::PaymentMethod, stock_movement::MovementType, store,
    },
    events::{self, EventSender},
    handlers::AppServices,
    services::catalog::CreateProductInput,
    services::customers::CreateCustomerInput,
    services::stores::CreateStoreInput,
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Test harness backed by an in-memory SQLite database.
///
/// The pool is pinned to a single connection so every test shares one
/// in-memory database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            _event_task: event_task,
        }
    }

    pub async fn seed_store(&self, code: &str) -> store::Model {
        self.state
            .store_service()
            .create_store(CreateStoreInput {
                code: code.to_string(),
                name: format!("Store {}", code),
                address: None,
                phone: None,
            })
            .await
            .expect("failed to seed store")
    }

    pub async fn seed_product(&self, sku: &str, price: Decimal, cost: Decimal) -> product::Model {
        self.state
            .product_service()
            .create_product(CreateProductInput {
                sku: sku.to_string(),
                barcode: None,
                name: format!("Product {}", sku),
                description: None,
                price,
                cost,
            })
            .await
            .expect("failed to seed product")
    }

    pub async fn seed_customer(&self, name: &str) -> customer::Model {
        self.state
            .customer_service()
            .create_customer(CreateCustomerInput {
                name: name.to_string(),
                email: None,
                phone: None,
            })
            .await
            .expect("failed to seed customer")
    }

    /// Sets the stock level for a (product, store) pair via an adjustment
    /// movement, exactly like an operator doing an initial count.
    pub async fn set_stock(&self, product_id: Uuid, store_id: Uuid, quantity: i32) {
        self.state
            .inventory_service()
            .record_movement(RecordMovementCommand {
                product_id,
                store_id,
                movement_type: MovementType::Adjustment,
                quantity,
                reason: "initial_count".to_string(),
                notes: None,
                code: None,
                created_by: None,
            })
            .await
            .expect("failed to set stock");
    }

    pub async fn stock_of(&self, product_id: Uuid, store_id: Uuid) -> i32 {
        self.state
            .inventory_service()
            .get_stock(&product_id, &store_id)
            .await
            .expect("failed to read stock")
            .map(|level| level.stock)
            .unwrap_or(0)
    }

    /// Creates a single-product cash sale.
    pub async fn sell(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<CreateSaleResult, storeline_api::errors::ServiceError> {
        self.state
            .sale_service()
            .create_sale(CreateSaleCommand {
                store_id,
                cashier_id: Uuid::new_v4(),
                customer_id: None,
                payment_method: PaymentMethod::Cash,
                items: vec![SaleLineInput {
                    product_id,
                    quantity,
                    unit_price,
                    discount: Decimal::ZERO,
                    tax: Decimal::ZERO,
                }],
                discount: Decimal::ZERO,
                tax: Decimal::ZERO,
            })
            .await
    }
}

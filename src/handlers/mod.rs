pub mod customers;
pub mod inventory;
pub mod products;
pub mod reports;
pub mod returns;
pub mod sales;
pub mod stores;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<crate::services::catalog::ProductService>,
    pub stores: Arc<crate::services::stores::StoreService>,
    pub customers: Arc<crate::services::customers::CustomerService>,
    pub sales: Arc<crate::services::sales::SaleService>,
    pub inventory: Arc<crate::services::inventory::InventoryService>,
    pub returns: Arc<crate::services::returns::ReturnService>,
    pub reports: Arc<crate::services::reports::ReportService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let products = Arc::new(crate::services::catalog::ProductService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let stores = Arc::new(crate::services::stores::StoreService::new(db_pool.clone()));
        let customers = Arc::new(crate::services::customers::CustomerService::new(
            db_pool.clone(),
        ));
        let sales = Arc::new(crate::services::sales::SaleService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let inventory = Arc::new(crate::services::inventory::InventoryService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let returns = Arc::new(crate::services::returns::ReturnService::new(
            db_pool.clone(),
            event_sender,
        ));
        let reports = Arc::new(crate::services::reports::ReportService::new(db_pool));

        Self {
            products,
            stores,
            customers,
            sales,
            inventory,
            returns,
            reports,
        }
    }
}

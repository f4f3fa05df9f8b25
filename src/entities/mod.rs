//! SeaORM entities for the storeline data model.
//!
//! Stock is never a property of a product: the authoritative per-store count
//! lives on `product_store`, and every change to it is mirrored by an
//! append-only `stock_movement` ledger row written in the same transaction.

pub mod customer;
pub mod payment;
pub mod product;
pub mod product_return;
pub mod product_store;
pub mod return_item;
pub mod sale;
pub mod sale_item;
pub mod stock_movement;
pub mod store;

pub use customer::Entity as Customer;
pub use payment::Entity as Payment;
pub use product::Entity as Product;
pub use product_return::Entity as ProductReturn;
pub use product_store::Entity as ProductStore;
pub use return_item::Entity as ReturnItem;
pub use sale::Entity as Sale;
pub use sale_item::Entity as SaleItem;
pub use stock_movement::Entity as StockMovement;
pub use store::Entity as Store;

pub mod catalog;
pub mod customers;
pub mod inventory;
pub mod reports;
pub mod returns;
pub mod sales;
pub mod stores;

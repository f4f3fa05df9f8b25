pub mod create_sale_command;
pub mod void_sale_command;

pub use create_sale_command::{CreateSaleCommand, CreateSaleResult, SaleLineInput};
pub use void_sale_command::{VoidSaleCommand, VoidSaleResult};

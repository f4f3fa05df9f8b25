pub mod create_return_command;
pub mod delete_return_command;

pub use create_return_command::{CreateReturnCommand, CreateReturnResult, ReturnLineInput};
pub use delete_return_command::DeleteReturnCommand;

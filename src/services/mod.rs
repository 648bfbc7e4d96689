pub mod auth_service;
pub mod catalogue_service;
pub mod order_item_service;
pub mod order_ledger;
pub mod order_service;
pub mod user_service;

pub use auth_service::*;
pub use catalogue_service::*;
pub use order_item_service::*;
pub use order_service::*;
pub use user_service::*;

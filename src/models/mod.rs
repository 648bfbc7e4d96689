pub mod catalogue;
pub mod common;
pub mod order;
pub mod order_item;
pub mod pagination;
pub mod user;

pub use catalogue::*;
pub use common::*;
pub use order::*;
pub use order_item::*;
pub use pagination::*;
pub use user::*;

pub use crate::entities::{OrderItemStatus, OrderStatus};

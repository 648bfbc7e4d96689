pub mod banners;
pub mod categories;
pub mod order_item_relations;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod users;

pub use banners as banner_entity;
pub use categories as category_entity;
pub use order_item_relations as order_item_relation_entity;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use products as product_entity;
pub use users as user_entity;

pub use order_items::OrderItemStatus;
pub use orders::OrderStatus;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::orders::OrderStatus;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "order_item_status"
)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl OrderItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderItemStatus::Completed | OrderItemStatus::Canceled)
    }
}

impl std::fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderItemStatus::Pending => write!(f, "pending"),
            OrderItemStatus::Active => write!(f, "active"),
            OrderItemStatus::Completed => write!(f, "completed"),
            OrderItemStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// 明细一旦被订单认领，状态始终与订单保持一致
impl From<OrderStatus> for OrderItemStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Active => OrderItemStatus::Active,
            OrderStatus::Completed => OrderItemStatus::Completed,
            OrderStatus::Canceled => OrderItemStatus::Canceled,
        }
    }
}

/// 订单明细（购物车条目）
/// - 创建时为 Pending，不属于任何订单
/// - total = round(quantity * product.new_price, 1)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total: Decimal,
    pub status: OrderItemStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
    #[sea_orm(has_many = "super::order_item_relations::Entity")]
    OrderItemRelations,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::order_item_relations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItemRelations.def()
    }
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        super::order_item_relations::Relation::Order.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::order_item_relations::Relation::OrderItem.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_status")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "canceled")]
    Canceled,
}

impl OrderStatus {
    /// Completed / Canceled 为终态，不允许再修改
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Active 可迁移到任意状态（含自身），终态不可迁移
    pub fn can_transition_to(&self, _next: OrderStatus) -> bool {
        !self.is_terminal()
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Active
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    /// 明细合计，两位小数；成员变化时重新计算
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub sum_total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
    #[sea_orm(has_many = "super::order_item_relations::Entity")]
    OrderItemRelations,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_item_relations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItemRelations.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        super::order_item_relations::Relation::OrderItem.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::order_item_relations::Relation::Order.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

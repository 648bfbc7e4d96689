use crate::entities::{OrderItemStatus, order_item_entity, product_entity};
use crate::models::ProductItemResponse;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: i64,
    /// 1-100
    #[schema(example = 3)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderItemRequest {
    #[schema(example = 2)]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderItemQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderItemStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product: Option<ProductItemResponse>,
    pub quantity: i32,
    #[schema(value_type = String, example = "24.0")]
    pub total: Decimal,
    pub status: OrderItemStatus,
    /// 所属订单（Pending 时为空）
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl OrderItemResponse {
    pub fn new(
        item: order_item_entity::Model,
        product: Option<product_entity::Model>,
        order_id: Option<i64>,
    ) -> Self {
        Self {
            id: item.id,
            product: product.map(Into::into),
            quantity: item.quantity,
            total: item.total,
            status: item.status,
            order_id,
            created_at: item.created_at,
        }
    }
}

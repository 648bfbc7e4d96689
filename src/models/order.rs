use crate::entities::{OrderStatus, order_entity};
use crate::models::OrderItemResponse;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    #[schema(value_type = String, example = "48.00")]
    pub sum_total: Decimal,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn new(order: order_entity::Model, items: Vec<OrderItemResponse>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            sum_total: order.sum_total,
            items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

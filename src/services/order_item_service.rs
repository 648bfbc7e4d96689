use crate::entities::{
    OrderItemStatus, order_item_entity as order_items, order_item_relation_entity as relations,
    product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::order_ledger::{self, DeletionGuard};
use crate::utils::pricing;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct OrderItemService {
    pool: Arc<DatabaseConnection>,
}

impl OrderItemService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    /// 新建明细，状态固定为 Pending
    pub async fn create_order_item(
        &self,
        user_id: i64,
        request: CreateOrderItemRequest,
    ) -> AppResult<OrderItemResponse> {
        pricing::validate_quantity(request.quantity)?;

        let product = products::Entity::find_by_id(request.product_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
        if !product.is_active {
            return Err(AppError::ValidationError(
                "Product is not available for ordering".into(),
            ));
        }

        let total = pricing::line_total(request.quantity, product.new_price)?;
        let item = order_items::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product.id),
            quantity: Set(request.quantity),
            total: Set(total),
            status: Set(OrderItemStatus::Pending),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;

        log::info!(
            "User {user_id} added order item {} (product {} x{})",
            item.id,
            product.id,
            item.quantity
        );
        Ok(OrderItemResponse::new(item, Some(product), None))
    }

    pub async fn list_order_items(
        &self,
        user_id: i64,
        query: &OrderItemQuery,
    ) -> AppResult<PaginatedOrderItemResponse> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query =
            order_items::Entity::find().filter(order_items::Column::UserId.eq(user_id));
        if let Some(status) = query.status {
            base_query = base_query.filter(order_items::Column::Status.eq(status));
        }

        let total = base_query.clone().count(self.pool.as_ref()).await? as i64;

        let rows = base_query
            .find_also_related(products::Entity)
            .order_by_desc(order_items::Column::CreatedAt)
            .order_by_desc(order_items::Column::Id)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset() as u64)
            .all(self.pool.as_ref())
            .await?;

        let item_ids: Vec<i64> = rows.iter().map(|(item, _)| item.id).collect();
        let owners = self.owning_orders(&item_ids).await?;

        let data = rows
            .into_iter()
            .map(|(item, product)| {
                let order_id = owners.get(&item.id).copied();
                OrderItemResponse::new(item, product, order_id)
            })
            .collect();

        Ok(PaginatedResponse::new(
            data,
            params.get_page(),
            params.get_limit(),
            total,
        ))
    }

    pub async fn get_order_item(&self, user_id: i64, item_id: i64) -> AppResult<OrderItemResponse> {
        let (item, product) = order_items::Entity::find_by_id(item_id)
            .filter(order_items::Column::UserId.eq(user_id))
            .find_also_related(products::Entity)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Order item not found".into()))?;

        let owners = self.owning_orders(&[item.id]).await?;
        let order_id = owners.get(&item.id).copied();
        Ok(OrderItemResponse::new(item, product, order_id))
    }

    /// 修改数量（仅 Pending 明细），重新计算 total
    pub async fn update_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        request: UpdateOrderItemRequest,
    ) -> AppResult<OrderItemResponse> {
        pricing::validate_quantity(request.quantity)?;

        let txn = self.pool.begin().await?;
        let item = order_items::Entity::find_by_id(item_id)
            .filter(order_items::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Order item not found".into()))?;

        if item.status != OrderItemStatus::Pending {
            return Err(AppError::ValidationError(
                "Only pending order items can be changed".into(),
            ));
        }

        let product = products::Entity::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

        let total = pricing::line_total(request.quantity, product.new_price)?;
        let mut am = item.into_active_model();
        am.quantity = Set(request.quantity);
        am.total = Set(total);
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        Ok(OrderItemResponse::new(updated, Some(product), None))
    }

    /// 删除明细；已完成或已取消的明细不可删除
    pub async fn delete_order_item(&self, user_id: i64, item_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let item = order_items::Entity::find_by_id(item_id)
            .filter(order_items::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Order item not found".into()))?;

        if item.status.is_terminal() {
            return Err(AppError::ValidationError(
                "Completed or canceled order items cannot be deleted".into(),
            ));
        }

        let mut guard = DeletionGuard::new();
        order_ledger::delete_order_item(&txn, item.id, &mut guard).await?;
        txn.commit().await?;
        Ok(())
    }

    /// 明细 id -> 所属订单 id
    async fn owning_orders(&self, item_ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        if item_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let links = relations::Entity::find()
            .filter(relations::Column::OrderItemId.is_in(item_ids.to_vec()))
            .all(self.pool.as_ref())
            .await?;
        Ok(links
            .into_iter()
            .map(|r| (r.order_item_id, r.order_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn product(is_active: bool) -> products::Model {
        products::Model {
            id: 1,
            name_en: "Margherita".into(),
            name_hu: "Margaréta".into(),
            description_en: String::new(),
            description_hu: String::new(),
            price: dec("10.00"),
            discount: 20,
            new_price: dec("8.0"),
            is_best: false,
            is_active,
            thumbnail: String::new(),
            image: String::new(),
            category_id: 1,
        }
    }

    fn item(status: OrderItemStatus) -> order_items::Model {
        order_items::Model {
            id: 5,
            user_id: 1,
            product_id: 1,
            quantity: 3,
            total: dec("24.0"),
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_quantity_out_of_range() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = OrderItemService::new(db);

        for quantity in [0, 101] {
            let err = service
                .create_order_item(
                    1,
                    CreateOrderItemRequest {
                        product_id: 1,
                        quantity,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn test_create_requires_existing_product() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<products::Model>::new()])
            .into_connection();
        let service = OrderItemService::new(db);

        let err = service
            .create_order_item(
                1,
                CreateOrderItemRequest {
                    product_id: 42,
                    quantity: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_inactive_product() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(false)]])
            .into_connection();
        let service = OrderItemService::new(db);

        let err = service
            .create_order_item(
                1,
                CreateOrderItemRequest {
                    product_id: 1,
                    quantity: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_computes_total_and_starts_pending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product(true)]])
            .append_query_results([vec![item(OrderItemStatus::Pending)]])
            .into_connection();
        let service = OrderItemService::new(db);

        let response = service
            .create_order_item(
                1,
                CreateOrderItemRequest {
                    product_id: 1,
                    quantity: 3,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.total.to_string(), "24.0");
        assert_eq!(response.status, OrderItemStatus::Pending);
        assert_eq!(response.order_id, None);
    }

    #[tokio::test]
    async fn test_update_quantity_only_while_pending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(OrderItemStatus::Active)]])
            .into_connection();
        let service = OrderItemService::new(db);

        let err = service
            .update_quantity(1, 5, UpdateOrderItemRequest { quantity: 2 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_delete_terminal_item_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(OrderItemStatus::Completed)]])
            .into_connection();
        let service = OrderItemService::new(db);

        let err = service.delete_order_item(1, 5).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_delete_pending_item() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![item(OrderItemStatus::Pending)]])
            // no relations for a pending item
            .append_query_results([Vec::<relations::Model>::new()])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let service = OrderItemService::new(db);

        service.delete_order_item(1, 5).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_active_item_recomputes_owning_order() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![item(OrderItemStatus::Active)]])
                .append_query_results([vec![relations::Model {
                    id: 1,
                    order_id: 10,
                    order_item_id: 5,
                }]])
                // recompute: the order has no members left
                .append_query_results([Vec::<order_items::Model>::new()])
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );
        let service = OrderItemService::new(db.clone());

        service.delete_order_item(1, 5).await.unwrap();

        drop(service);
        let Ok(db) = Arc::try_unwrap(db) else {
            panic!("connection is still shared");
        };
        let sql = format!("{:?}", db.into_transaction_log()).replace("\\\"", "\"");
        let relations_delete = sql.find(r#"DELETE FROM "order_item_relations""#).unwrap();
        let recompute = sql.find(r#"UPDATE "orders" SET "sum_total""#).unwrap();
        let item_delete = sql.find(r#"DELETE FROM "order_items""#).unwrap();
        assert!(relations_delete < recompute);
        assert!(recompute < item_delete);
    }
}

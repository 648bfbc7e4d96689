use crate::config::ClaimScope;
use crate::entities::{
    OrderItemStatus, OrderStatus, order_entity as orders, order_item_entity as order_items,
    order_item_relation_entity as relations, product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::order_ledger::{self, DeletionGuard};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct OrderService {
    pool: Arc<DatabaseConnection>,
    claim_scope: ClaimScope,
}

impl OrderService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>, claim_scope: ClaimScope) -> Self {
        Self {
            pool: pool.into(),
            claim_scope,
        }
    }

    /// 创建订单
    ///
    /// 逻辑:
    /// 1. 锁定并读取所有 pending 明细（按配置可只取当前用户的）
    /// 2. 没有 pending 明细则拒绝创建
    /// 3. 写入订单，认领明细（状态同步为订单状态），重算合计
    pub async fn create_order(&self, user_id: i64) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;

        let mut pending_query = order_items::Entity::find()
            .filter(order_items::Column::Status.eq(OrderItemStatus::Pending));
        if self.claim_scope == ClaimScope::Caller {
            pending_query = pending_query.filter(order_items::Column::UserId.eq(user_id));
        }
        let pending = pending_query
            .order_by_asc(order_items::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await?;

        if pending.is_empty() {
            return Err(AppError::ValidationError(
                "No pending order items available to assign to an order".into(),
            ));
        }

        let now = Utc::now();
        let order = orders::ActiveModel {
            user_id: Set(user_id),
            sum_total: Set(Decimal::ZERO),
            status: Set(OrderStatus::default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let sum_total = order_ledger::claim_items(&txn, &order, &pending).await?;
        txn.commit().await?;

        log::info!(
            "User {user_id} created order {} with {} items, sum_total={sum_total}",
            order.id,
            pending.len()
        );

        let item_status = OrderItemStatus::from(order.status);
        let claimed: Vec<order_items::Model> = pending
            .into_iter()
            .map(|mut item| {
                item.status = item_status;
                item
            })
            .collect();
        let items = self.describe_items(claimed, order.id).await?;

        let order = orders::Model { sum_total, ..order };
        Ok(OrderResponse::new(order, items))
    }

    /// 分页获取用户订单（倒序）
    pub async fn list_orders(
        &self,
        user_id: i64,
        query: &OrderQuery,
    ) -> AppResult<PaginatedOrderResponse> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = orders::Entity::find().filter(orders::Column::UserId.eq(user_id));
        if let Some(status) = query.status {
            base_query = base_query.filter(orders::Column::Status.eq(status));
        }

        let total = base_query.clone().count(self.pool.as_ref()).await? as i64;

        let order_models = base_query
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset() as u64)
            .all(self.pool.as_ref())
            .await?;

        let order_ids: Vec<i64> = order_models.iter().map(|o| o.id).collect();
        let mut items_by_order = load_order_items(self.pool.as_ref(), &order_ids).await?;

        let data = order_models
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderResponse::new(order, items)
            })
            .collect();

        Ok(PaginatedResponse::new(
            data,
            params.get_page(),
            params.get_limit(),
            total,
        ))
    }

    pub async fn get_order(&self, user_id: i64, order_id: i64) -> AppResult<OrderResponse> {
        let order = find_order(self.pool.as_ref(), Some(user_id), order_id, false).await?;
        self.order_response(order).await
    }

    /// 修改订单状态；`user_id` 为 None 时不限定归属（管理端）
    pub async fn update_order_status(
        &self,
        user_id: Option<i64>,
        order_id: i64,
        request: UpdateOrderRequest,
    ) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, user_id, order_id, true).await?;

        ensure_mutable(&order)?;
        if !order.status.can_transition_to(request.status) {
            return Err(AppError::ValidationError(
                "You cannot modify completed or canceled orders".into(),
            ));
        }

        let previous = order.status;
        let mut am = order.into_active_model();
        am.status = Set(request.status);
        am.updated_at = Set(Utc::now());
        let updated = am.update(&txn).await?;

        order_ledger::cascade_status(&txn, order_id, request.status).await?;
        txn.commit().await?;

        log::info!(
            "Order {order_id} status changed: {previous} -> {}",
            request.status
        );
        self.order_response(updated).await
    }

    /// 删除订单及其全部明细
    pub async fn delete_order(&self, user_id: i64, order_id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, Some(user_id), order_id, true).await?;

        let mut guard = DeletionGuard::new();
        order_ledger::delete_order(&txn, order.id, &mut guard).await?;
        txn.commit().await?;
        Ok(())
    }

    /// 从订单移除单个明细（明细随之删除）
    pub async fn remove_order_item(
        &self,
        user_id: i64,
        order_id: i64,
        item_id: i64,
    ) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, Some(user_id), order_id, true).await?;
        ensure_mutable(&order)?;

        let mut guard = DeletionGuard::new();
        order_ledger::remove_item(&txn, order.id, item_id, &mut guard).await?;
        let order = find_order(&txn, Some(user_id), order_id, false).await?;
        txn.commit().await?;

        self.order_response(order).await
    }

    /// 清空订单明细
    pub async fn clear_order_items(&self, user_id: i64, order_id: i64) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, Some(user_id), order_id, true).await?;
        ensure_mutable(&order)?;

        let mut guard = DeletionGuard::new();
        let removed = order_ledger::clear_items(&txn, order.id, &mut guard).await?;
        let order = find_order(&txn, Some(user_id), order_id, false).await?;
        txn.commit().await?;

        log::info!("Order {order_id} cleared, {removed} items deleted");
        self.order_response(order).await
    }

    async fn order_response(&self, order: orders::Model) -> AppResult<OrderResponse> {
        let mut items = load_order_items(self.pool.as_ref(), &[order.id]).await?;
        let items = items.remove(&order.id).unwrap_or_default();
        Ok(OrderResponse::new(order, items))
    }

    async fn describe_items(
        &self,
        items: Vec<order_items::Model>,
        order_id: i64,
    ) -> AppResult<Vec<OrderItemResponse>> {
        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let product_map: HashMap<i64, products::Model> = products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(items
            .into_iter()
            .map(|item| {
                let product = product_map.get(&item.product_id).cloned();
                OrderItemResponse::new(item, product, Some(order_id))
            })
            .collect())
    }
}

fn ensure_mutable(order: &orders::Model) -> AppResult<()> {
    if order.status.is_terminal() {
        return Err(AppError::ValidationError(
            "You cannot modify completed or canceled orders".into(),
        ));
    }
    Ok(())
}

async fn find_order<C>(
    conn: &C,
    user_id: Option<i64>,
    order_id: i64,
    for_update: bool,
) -> AppResult<orders::Model>
where
    C: ConnectionTrait,
{
    let mut query = orders::Entity::find_by_id(order_id);
    if let Some(user_id) = user_id {
        query = query.filter(orders::Column::UserId.eq(user_id));
    }
    if for_update {
        query = query.lock_exclusive();
    }
    query
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))
}

/// 批量读取订单的明细（含商品信息），按订单分组
pub async fn load_order_items<C>(
    conn: &C,
    order_ids: &[i64],
) -> AppResult<HashMap<i64, Vec<OrderItemResponse>>>
where
    C: ConnectionTrait,
{
    let mut grouped: HashMap<i64, Vec<OrderItemResponse>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let links = relations::Entity::find()
        .filter(relations::Column::OrderId.is_in(order_ids.to_vec()))
        .all(conn)
        .await?;
    if links.is_empty() {
        return Ok(grouped);
    }

    let order_of: HashMap<i64, i64> = links
        .iter()
        .map(|r| (r.order_item_id, r.order_id))
        .collect();

    let rows = order_items::Entity::find()
        .filter(order_items::Column::Id.is_in(order_of.keys().copied().collect::<Vec<_>>()))
        .find_also_related(products::Entity)
        .order_by_asc(order_items::Column::Id)
        .all(conn)
        .await?;

    for (item, product) in rows {
        if let Some(&order_id) = order_of.get(&item.id) {
            grouped
                .entry(order_id)
                .or_default()
                .push(OrderItemResponse::new(item, product, Some(order_id)));
        }
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn product() -> products::Model {
        products::Model {
            id: 1,
            name_en: "Margherita".into(),
            name_hu: "Margaréta".into(),
            description_en: "Tomato, mozzarella".into(),
            description_hu: "Paradicsom, mozzarella".into(),
            price: dec("10.00"),
            discount: 20,
            new_price: dec("8.0"),
            is_best: false,
            is_active: true,
            thumbnail: "images/products/thumbnails/m.png".into(),
            image: "images/products/images/m.png".into(),
            category_id: 1,
        }
    }

    fn item(id: i64, user_id: i64, status: OrderItemStatus) -> order_items::Model {
        order_items::Model {
            id,
            user_id,
            product_id: 1,
            quantity: 3,
            total: dec("24.0"),
            status,
            created_at: Utc::now(),
        }
    }

    fn order(id: i64, status: OrderStatus) -> orders::Model {
        orders::Model {
            id,
            user_id: 1,
            sum_total: dec("48.00"),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_order_without_pending_items_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<order_items::Model>::new()])
            .into_connection();
        let service = OrderService::new(db, ClaimScope::Global);

        let err = service.create_order(1).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_order_claims_all_pending_items() {
        let mut created = order(10, OrderStatus::Active);
        created.sum_total = Decimal::ZERO;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // pending items of two different users
            .append_query_results([vec![
                item(1, 1, OrderItemStatus::Pending),
                item(2, 2, OrderItemStatus::Pending),
            ]])
            .append_query_results([vec![created]])
            // recompute over the claimed members
            .append_query_results([vec![
                item(1, 1, OrderItemStatus::Active),
                item(2, 2, OrderItemStatus::Active),
            ]])
            .append_query_results([vec![product()]])
            // claim CAS, relation insert, sum_total update
            .append_exec_results([exec(2), exec(2), exec(1)])
            .into_connection();
        let service = OrderService::new(db, ClaimScope::Global);

        let response = service.create_order(1).await.unwrap();
        assert_eq!(response.id, 10);
        assert_eq!(response.status, OrderStatus::Active);
        assert_eq!(response.sum_total, dec("48.00"));
        assert_eq!(response.sum_total.to_string(), "48.00");
        assert_eq!(response.items.len(), 2);
        assert!(
            response
                .items
                .iter()
                .all(|i| i.status == OrderItemStatus::Active && i.order_id == Some(10))
        );
        assert_eq!(
            response.items[0].product.as_ref().map(|p| p.new_price),
            Some(dec("8.0"))
        );
    }

    #[tokio::test]
    async fn test_update_terminal_order_is_rejected() {
        for status in [OrderStatus::Completed, OrderStatus::Canceled] {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![order(3, status)]])
                .into_connection();
            let service = OrderService::new(db, ClaimScope::Global);

            let err = service
                .update_order_status(
                    Some(1),
                    3,
                    UpdateOrderRequest {
                        status: OrderStatus::Active,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<orders::Model>::new()])
            .into_connection();
        let service = OrderService::new(db, ClaimScope::Global);

        let err = service
            .update_order_status(
                Some(1),
                99,
                UpdateOrderRequest {
                    status: OrderStatus::Completed,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_active_order_cascades_to_items() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(3, OrderStatus::Active)]])
            // update returning
            .append_query_results([vec![order(3, OrderStatus::Completed)]])
            // member relations
            .append_query_results([vec![
                relations::Model {
                    id: 1,
                    order_id: 3,
                    order_item_id: 1,
                },
                relations::Model {
                    id: 2,
                    order_id: 3,
                    order_item_id: 2,
                },
            ]])
            // load_order_items: relations, then items with products
            .append_query_results([vec![
                relations::Model {
                    id: 1,
                    order_id: 3,
                    order_item_id: 1,
                },
                relations::Model {
                    id: 2,
                    order_id: 3,
                    order_item_id: 2,
                },
            ]])
            .append_query_results([vec![
                (item(1, 1, OrderItemStatus::Completed), product()),
                (item(2, 1, OrderItemStatus::Completed), product()),
            ]])
            .append_exec_results([exec(2)])
            .into_connection();
        let service = OrderService::new(db, ClaimScope::Global);

        let response = service
            .update_order_status(
                Some(1),
                3,
                UpdateOrderRequest {
                    status: OrderStatus::Completed,
                },
            )
            .await
            .unwrap();
        assert_eq!(response.status, OrderStatus::Completed);
        assert_eq!(response.items.len(), 2);
        assert!(
            response
                .items
                .iter()
                .all(|i| i.status == OrderItemStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_membership_of_terminal_order_is_frozen() {
        for status in [OrderStatus::Completed, OrderStatus::Canceled] {
            let db = Arc::new(
                MockDatabase::new(DatabaseBackend::Postgres)
                    .append_query_results([vec![order(3, status)]])
                    .append_query_results([vec![order(3, status)]])
                    .into_connection(),
            );
            let service = OrderService::new(db.clone(), ClaimScope::Global);

            let err = service.remove_order_item(1, 3, 1).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
            let err = service.clear_order_items(1, 3).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));

            drop(service);
            let Ok(db) = Arc::try_unwrap(db) else {
                panic!("connection is still shared");
            };
            let sql = format!("{:?}", db.into_transaction_log()).replace("\\\"", "\"");
            assert!(!sql.contains("DELETE FROM"));
            assert!(!sql.contains(r#"UPDATE "orders""#));
        }
    }
}

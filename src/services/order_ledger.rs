//! 订单 / 明细一致性规则
//!
//! 这里的函数都只接收一个连接（通常是调用方开启的事务），不自行提交：
//! - 认领 pending 明细并挂到订单上
//! - 成员变化（增加 / 移除 / 清空）后重新计算 sum_total
//! - 订单状态变化时同步到所有明细
//! - 关联、明细、订单之间的级联删除
//!
//! 级联删除通过显式传入的 [`DeletionGuard`] 防止重入。

use crate::entities::{
    OrderItemStatus, OrderStatus, order_entity as orders, order_item_entity as order_items,
    order_item_relation_entity as relations,
};
use crate::error::{AppError, AppResult};
use crate::utils::pricing;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use std::collections::{BTreeSet, HashSet};

/// 一次删除操作中已经在处理的明细 / 订单。
///
/// 删除关联会删除明细，删除明细又会删除它的关联；同一个 id 第二次进入时直接跳过。
#[derive(Debug, Default)]
pub struct DeletionGuard {
    items: HashSet<i64>,
    orders: HashSet<i64>,
}

impl DeletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the item is already being deleted.
    pub fn enter_item(&mut self, item_id: i64) -> bool {
        self.items.insert(item_id)
    }

    /// Returns `false` when the order is already being deleted.
    pub fn enter_order(&mut self, order_id: i64) -> bool {
        self.orders.insert(order_id)
    }

    pub fn is_deleting_order(&self, order_id: i64) -> bool {
        self.orders.contains(&order_id)
    }
}

/// 订单当前的成员明细
pub async fn member_items<C>(conn: &C, order_id: i64) -> Result<Vec<order_items::Model>, DbErr>
where
    C: ConnectionTrait,
{
    order_items::Entity::find()
        .join(
            JoinType::InnerJoin,
            order_items::Relation::OrderItemRelations.def(),
        )
        .filter(relations::Column::OrderId.eq(order_id))
        .order_by_asc(order_items::Column::Id)
        .all(conn)
        .await
}

/// 重新计算并只写回 sum_total
pub async fn recompute_sum_total<C>(conn: &C, order_id: i64) -> AppResult<Decimal>
where
    C: ConnectionTrait,
{
    let items = member_items(conn, order_id).await?;
    let sum_total = pricing::ensure_amount(
        pricing::sum_totals(items.iter().map(|item| item.total)),
        "Order sum total",
    )?;

    orders::Entity::update_many()
        .set(orders::ActiveModel {
            sum_total: Set(sum_total),
            ..Default::default()
        })
        .filter(orders::Column::Id.eq(order_id))
        .exec(conn)
        .await?;

    log::debug!(
        "Order {order_id} sum_total recomputed over {} items: {sum_total}",
        items.len()
    );
    Ok(sum_total)
}

/// 认领 pending 明细：状态 CAS 为订单状态、写入关联、重算合计。
///
/// 调用方须在同一事务内先 `FOR UPDATE` 读取 `items`。
pub async fn claim_items<C>(
    conn: &C,
    order: &orders::Model,
    items: &[order_items::Model],
) -> AppResult<Decimal>
where
    C: ConnectionTrait,
{
    if items.is_empty() {
        return Err(AppError::ValidationError(
            "No pending order items available to assign to an order".into(),
        ));
    }

    let item_ids: Vec<i64> = items.iter().map(|item| item.id).collect();

    // 只有仍为 Pending 的明细会被更新；数量不符说明被并发认领
    let claimed = order_items::Entity::update_many()
        .set(order_items::ActiveModel {
            status: Set(OrderItemStatus::from(order.status)),
            ..Default::default()
        })
        .filter(order_items::Column::Id.is_in(item_ids.clone()))
        .filter(order_items::Column::Status.eq(OrderItemStatus::Pending))
        .exec(conn)
        .await?;

    if claimed.rows_affected != item_ids.len() as u64 {
        log::warn!(
            "Order {} expected to claim {} items but claimed {}",
            order.id,
            item_ids.len(),
            claimed.rows_affected
        );
        return Err(AppError::ValidationError(
            "Some pending order items were claimed by another order, please retry".into(),
        ));
    }

    relations::Entity::insert_many(item_ids.iter().map(|item_id| relations::ActiveModel {
        order_id: Set(order.id),
        order_item_id: Set(*item_id),
        ..Default::default()
    }))
    .exec_without_returning(conn)
    .await?;

    log::info!("Order {} claimed {} pending items", order.id, item_ids.len());

    recompute_sum_total(conn, order.id).await
}

/// 订单所有成员明细的 id
pub async fn member_item_ids<C>(conn: &C, order_id: i64) -> Result<Vec<i64>, DbErr>
where
    C: ConnectionTrait,
{
    let rows = relations::Entity::find()
        .filter(relations::Column::OrderId.eq(order_id))
        .order_by_asc(relations::Column::OrderItemId)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| r.order_item_id).collect())
}

/// 把订单状态同步到全部成员明细，返回更新的行数
pub async fn cascade_status<C>(conn: &C, order_id: i64, status: OrderStatus) -> AppResult<u64>
where
    C: ConnectionTrait,
{
    let item_ids = member_item_ids(conn, order_id).await?;
    if item_ids.is_empty() {
        return Ok(0);
    }

    let result = order_items::Entity::update_many()
        .set(order_items::ActiveModel {
            status: Set(OrderItemStatus::from(status)),
            ..Default::default()
        })
        .filter(order_items::Column::Id.is_in(item_ids))
        .exec(conn)
        .await?;

    log::info!(
        "Order {order_id} status {status} cascaded to {} items",
        result.rows_affected
    );
    Ok(result.rows_affected)
}

/// 删除一条关联：重算所属订单合计，并删除对应明细
pub async fn delete_relation<C>(
    conn: &C,
    relation: &relations::Model,
    guard: &mut DeletionGuard,
) -> AppResult<()>
where
    C: ConnectionTrait,
{
    relations::Entity::delete_by_id(relation.id)
        .exec(conn)
        .await?;

    if !guard.is_deleting_order(relation.order_id) {
        recompute_sum_total(conn, relation.order_id).await?;
    }

    delete_order_item(conn, relation.order_item_id, guard).await?;
    Ok(())
}

/// 从订单中移除一个明细（明细本身也会被删除）
pub async fn remove_item<C>(
    conn: &C,
    order_id: i64,
    item_id: i64,
    guard: &mut DeletionGuard,
) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let relation = relations::Entity::find()
        .filter(relations::Column::OrderId.eq(order_id))
        .filter(relations::Column::OrderItemId.eq(item_id))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order item not found in this order".into()))?;

    delete_relation(conn, &relation, guard).await
}

/// 清空订单的所有明细，返回删除的明细数量
pub async fn clear_items<C>(conn: &C, order_id: i64, guard: &mut DeletionGuard) -> AppResult<usize>
where
    C: ConnectionTrait,
{
    let item_ids = member_item_ids(conn, order_id).await?;

    relations::Entity::delete_many()
        .filter(relations::Column::OrderId.eq(order_id))
        .exec(conn)
        .await?;

    if !guard.is_deleting_order(order_id) {
        recompute_sum_total(conn, order_id).await?;
    }

    let mut deleted = 0;
    for item_id in item_ids {
        if delete_order_item(conn, item_id, guard).await? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// 删除明细及其关联。
///
/// 返回 `false` 表示该明细已在本次删除链路中处理过，未做任何操作。
pub async fn delete_order_item<C>(
    conn: &C,
    item_id: i64,
    guard: &mut DeletionGuard,
) -> AppResult<bool>
where
    C: ConnectionTrait,
{
    if !guard.enter_item(item_id) {
        log::debug!("Order item {item_id} deletion already in progress, skipping");
        return Ok(false);
    }

    let linked = relations::Entity::find()
        .filter(relations::Column::OrderItemId.eq(item_id))
        .all(conn)
        .await?;

    if !linked.is_empty() {
        relations::Entity::delete_many()
            .filter(relations::Column::OrderItemId.eq(item_id))
            .exec(conn)
            .await?;

        let affected: BTreeSet<i64> = linked.iter().map(|r| r.order_id).collect();
        for order_id in affected {
            if !guard.is_deleting_order(order_id) {
                recompute_sum_total(conn, order_id).await?;
            }
        }
    }

    order_items::Entity::delete_by_id(item_id).exec(conn).await?;
    log::info!("Order item {item_id} deleted");
    Ok(true)
}

/// 删除商品前释放引用它的明细，返回删除的明细数量。
///
/// 已进入订单（非 Pending）的明细会阻止删除；Pending 明细逐条走 [`delete_order_item`]。
pub async fn release_product_items<C>(
    conn: &C,
    product_ids: &[i64],
    guard: &mut DeletionGuard,
) -> AppResult<usize>
where
    C: ConnectionTrait,
{
    if product_ids.is_empty() {
        return Ok(0);
    }

    let items = order_items::Entity::find()
        .filter(order_items::Column::ProductId.is_in(product_ids.to_vec()))
        .order_by_asc(order_items::Column::Id)
        .lock_exclusive()
        .all(conn)
        .await?;

    if let Some(placed) = items
        .iter()
        .find(|item| item.status != OrderItemStatus::Pending)
    {
        log::warn!(
            "Product {} still referenced by {} order item {}",
            placed.product_id,
            placed.status,
            placed.id
        );
        return Err(AppError::ValidationError(
            "Product is referenced by placed orders, deactivate it instead".into(),
        ));
    }

    let mut deleted = 0;
    for item in items {
        if delete_order_item(conn, item.id, guard).await? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// 删除订单：先删关联与成员明细，再删订单本身
pub async fn delete_order<C>(conn: &C, order_id: i64, guard: &mut DeletionGuard) -> AppResult<()>
where
    C: ConnectionTrait,
{
    if !guard.enter_order(order_id) {
        return Ok(());
    }

    let removed = clear_items(conn, order_id, guard).await?;
    orders::Entity::delete_by_id(order_id).exec(conn).await?;
    log::info!("Order {order_id} deleted together with {removed} items");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::str::FromStr;

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn item(id: i64, total: &str, status: OrderItemStatus) -> order_items::Model {
        order_items::Model {
            id,
            user_id: 1,
            product_id: 1,
            quantity: 3,
            total: Decimal::from_str(total).unwrap(),
            status,
            created_at: Utc::now(),
        }
    }

    fn order(id: i64) -> orders::Model {
        orders::Model {
            id,
            user_id: 1,
            sum_total: Decimal::ZERO,
            status: OrderStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_guard_blocks_reentry() {
        let mut guard = DeletionGuard::new();
        assert!(guard.enter_item(7));
        assert!(!guard.enter_item(7));
        assert!(guard.enter_item(8));

        assert!(!guard.is_deleting_order(1));
        assert!(guard.enter_order(1));
        assert!(!guard.enter_order(1));
        assert!(guard.is_deleting_order(1));
    }

    #[tokio::test]
    async fn test_recompute_sums_member_totals() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                item(1, "24.0", OrderItemStatus::Active),
                item(2, "24.0", OrderItemStatus::Active),
            ]])
            .append_exec_results([exec(1)])
            .into_connection();

        let sum = recompute_sum_total(&db, 10).await.unwrap();
        assert_eq!(sum.to_string(), "48.00");
    }

    #[tokio::test]
    async fn test_claim_requires_items() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = claim_items(&db, &order(1), &[]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_claim_fails_when_items_taken_concurrently() {
        // 两个明细只有一个仍为 pending
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .into_connection();

        let items = vec![
            item(1, "24.0", OrderItemStatus::Pending),
            item(2, "24.0", OrderItemStatus::Pending),
        ];
        let err = claim_items(&db, &order(1), &items).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_cascade_status_without_members_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<relations::Model>::new()])
            .into_connection();

        let updated = cascade_status(&db, 3, OrderStatus::Completed).await.unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn test_delete_order_item_skips_reentry_without_touching_db() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let mut guard = DeletionGuard::new();
        guard.enter_item(5);

        let deleted = delete_order_item(&db, 5, &mut guard).await.unwrap();
        assert!(!deleted);
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_delete_relation_deletes_item_once() {
        let relation = relations::Model {
            id: 1,
            order_id: 10,
            order_item_id: 5,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // recompute: no members left
            .append_query_results([Vec::<order_items::Model>::new()])
            // delete_order_item: remaining relations of the item
            .append_query_results([Vec::<relations::Model>::new()])
            .append_exec_results([exec(1), exec(1), exec(1)])
            .into_connection();

        let mut guard = DeletionGuard::new();
        delete_relation(&db, &relation, &mut guard).await.unwrap();

        // 明细已进入 guard，再次删除不会重复执行
        assert!(!delete_order_item(&db, 5, &mut guard).await.unwrap());
        // delete relation, recompute select, update sum, select relations, delete item
        assert_eq!(db.into_transaction_log().len(), 5);
    }

    fn relation(id: i64, order_id: i64, order_item_id: i64) -> relations::Model {
        relations::Model {
            id,
            order_id,
            order_item_id,
        }
    }

    fn executed_sql(db: sea_orm::DatabaseConnection) -> String {
        format!("{:?}", db.into_transaction_log()).replace("\\\"", "\"")
    }

    #[tokio::test]
    async fn test_recompute_without_members_is_zero() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<order_items::Model>::new()])
            .append_exec_results([exec(1)])
            .into_connection();

        let sum = recompute_sum_total(&db, 10).await.unwrap();
        assert_eq!(sum.to_string(), "0.00");
    }

    #[tokio::test]
    async fn test_recompute_rejects_sum_beyond_amount_column() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                item(1, "60000000.0", OrderItemStatus::Active),
                item(2, "50000000.0", OrderItemStatus::Active),
            ]])
            .into_connection();

        let err = recompute_sum_total(&db, 10).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(!executed_sql(db).contains(r#"UPDATE "orders""#));
    }

    #[tokio::test]
    async fn test_clear_items_recomputes_then_deletes_members() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![relation(1, 10, 1), relation(2, 10, 2)]])
            // recompute: relations already gone
            .append_query_results([Vec::<order_items::Model>::new()])
            // delete_order_item: no relations left for either item
            .append_query_results([Vec::<relations::Model>::new()])
            .append_query_results([Vec::<relations::Model>::new()])
            .append_exec_results([exec(2), exec(1), exec(1), exec(1)])
            .into_connection();

        let mut guard = DeletionGuard::new();
        let deleted = clear_items(&db, 10, &mut guard).await.unwrap();
        assert_eq!(deleted, 2);

        let log = db.into_transaction_log();
        // select relations, delete relations, recompute select + update,
        // then select relations + delete per item
        assert_eq!(log.len(), 8);
        let sql = format!("{log:?}").replace("\\\"", "\"");
        let relations_delete = sql.find(r#"DELETE FROM "order_item_relations""#).unwrap();
        let recompute = sql.find(r#"UPDATE "orders" SET "sum_total""#).unwrap();
        let item_delete = sql.find(r#"DELETE FROM "order_items""#).unwrap();
        assert!(relations_delete < recompute);
        assert!(recompute < item_delete);
    }

    #[tokio::test]
    async fn test_delete_order_skips_recompute_of_deleted_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![relation(1, 10, 1), relation(2, 10, 2)]])
            .append_query_results([Vec::<relations::Model>::new()])
            .append_query_results([Vec::<relations::Model>::new()])
            .append_exec_results([exec(2), exec(1), exec(1), exec(1)])
            .into_connection();

        let mut guard = DeletionGuard::new();
        delete_order(&db, 10, &mut guard).await.unwrap();
        assert!(guard.is_deleting_order(10));
        // 再次删除同一订单不访问数据库
        delete_order(&db, 10, &mut guard).await.unwrap();

        let log = db.into_transaction_log();
        // select relations, delete relations, select + delete per item, delete order
        assert_eq!(log.len(), 7);
        let sql = format!("{log:?}").replace("\\\"", "\"");
        assert!(!sql.contains(r#"UPDATE "orders""#));
        let item_delete = sql.rfind(r#"DELETE FROM "order_items""#).unwrap();
        let order_delete = sql.find(r#"DELETE FROM "orders""#).unwrap();
        assert!(item_delete < order_delete);
    }

    #[tokio::test]
    async fn test_release_product_items_rejects_placed_items() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                item(1, "24.0", OrderItemStatus::Pending),
                item(2, "24.0", OrderItemStatus::Active),
            ]])
            .into_connection();

        let mut guard = DeletionGuard::new();
        let err = release_product_items(&db, &[1], &mut guard)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(!executed_sql(db).contains("DELETE"));
    }

    #[tokio::test]
    async fn test_release_product_items_deletes_pending_items() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                item(1, "24.0", OrderItemStatus::Pending),
                item(2, "24.0", OrderItemStatus::Pending),
            ]])
            .append_query_results([Vec::<relations::Model>::new()])
            .append_query_results([Vec::<relations::Model>::new()])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();

        let mut guard = DeletionGuard::new();
        let released = release_product_items(&db, &[1], &mut guard).await.unwrap();
        assert_eq!(released, 2);
        assert!(!guard.enter_item(1));
        assert!(!guard.enter_item(2));
    }
}

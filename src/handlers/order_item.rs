use super::current_user_id;
use crate::models::*;
use crate::services::OrderItemService;
use actix_web::{HttpRequest, HttpResponse, Result, ResponseError, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/order-items",
    tag = "order-item",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<OrderItemStatus>, Query, description = "明细状态")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取明细列表成功", body = PaginatedOrderItemResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_order_items(
    order_item_service: web::Data<OrderItemService>,
    req: HttpRequest,
    query: web::Query<OrderItemQuery>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };

    match order_item_service.list_order_items(user_id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/order-items",
    tag = "order-item",
    request_body = CreateOrderItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "明细已创建（Pending）", body = OrderItemResponse),
        (status = 400, description = "数量超出范围或商品未启用"),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn create_order_item(
    order_item_service: web::Data<OrderItemService>,
    req: HttpRequest,
    request: web::Json<CreateOrderItemRequest>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };

    match order_item_service
        .create_order_item(user_id, request.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/order-items/{id}",
    tag = "order-item",
    params(
        ("id" = i64, Path, description = "明细ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "明细详情", body = OrderItemResponse),
        (status = 404, description = "明细不存在")
    )
)]
pub async fn get_order_item(
    order_item_service: web::Data<OrderItemService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };

    match order_item_service
        .get_order_item(user_id, path.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/order-items/{id}",
    tag = "order-item",
    params(
        ("id" = i64, Path, description = "明细ID")
    ),
    request_body = UpdateOrderItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "数量已更新", body = OrderItemResponse),
        (status = 400, description = "明细已被订单认领或数量超出范围"),
        (status = 404, description = "明细不存在")
    )
)]
pub async fn update_order_item(
    order_item_service: web::Data<OrderItemService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateOrderItemRequest>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };

    match order_item_service
        .update_quantity(user_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(item) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": item
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/order-items/{id}",
    tag = "order-item",
    params(
        ("id" = i64, Path, description = "明细ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "明细已删除"),
        (status = 400, description = "已完成或已取消的明细不可删除"),
        (status = 404, description = "明细不存在")
    )
)]
pub async fn delete_order_item(
    order_item_service: web::Data<OrderItemService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };

    match order_item_service
        .delete_order_item(user_id, path.into_inner())
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Order item deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_item_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/order-items")
            .route("", web::get().to(list_order_items))
            .route("", web::post().to(create_order_item))
            .route("/{id}", web::get().to(get_order_item))
            .route("/{id}", web::patch().to(update_order_item))
            .route("/{id}", web::delete().to(delete_order_item)),
    );
}

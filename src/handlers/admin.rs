use super::current_user_id;
use crate::error::AppResult;
use crate::models::*;
use crate::services::{CatalogueService, OrderService, UserService};
use actix_web::{HttpRequest, HttpResponse, Result, ResponseError, web};
use serde_json::json;

/// 管理端接口仅对 staff 开放
async fn require_staff(user_service: &UserService, req: &HttpRequest) -> AppResult<i64> {
    let user_id = current_user_id(req)?;
    user_service.ensure_staff(user_id).await?;
    Ok(user_id)
}

#[utoipa::path(
    post,
    path = "/admin/banners",
    tag = "admin",
    request_body = CreateBannerRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "轮播图已创建", body = BannerResponse),
        (status = 403, description = "无权限")
    )
)]
pub async fn create_banner(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    request: web::Json<CreateBannerRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service.create_banner(request.into_inner()).await {
        Ok(banner) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": banner
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/banners/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "轮播图ID")
    ),
    request_body = UpdateBannerRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "轮播图已更新", body = BannerResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "轮播图不存在")
    )
)]
pub async fn update_banner(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateBannerRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service
        .update_banner(path.into_inner(), request.into_inner())
        .await
    {
        Ok(banner) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": banner
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/banners/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "轮播图ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "轮播图已删除"),
        (status = 403, description = "无权限"),
        (status = 404, description = "轮播图不存在")
    )
)]
pub async fn delete_banner(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service.delete_banner(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Banner deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/categories",
    tag = "admin",
    request_body = CreateCategoryRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "分类已创建", body = CategoryWithImageResponse),
        (status = 403, description = "无权限")
    )
)]
pub async fn create_category(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    request: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service.create_category(request.into_inner()).await {
        Ok(category) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": category
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/categories/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "分类ID")
    ),
    request_body = UpdateCategoryRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "分类已更新", body = CategoryWithImageResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "分类不存在")
    )
)]
pub async fn update_category(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service
        .update_category(path.into_inner(), request.into_inner())
        .await
    {
        Ok(category) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": category
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "分类ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "分类及其商品已删除"),
        (status = 400, description = "商品已被订单引用"),
        (status = 403, description = "无权限"),
        (status = 404, description = "分类不存在")
    )
)]
pub async fn delete_category(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service.delete_category(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Category deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "admin",
    request_body = CreateProductRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "商品已创建，折后价自动计算", body = ProductResponse),
        (status = 400, description = "价格或折扣无效"),
        (status = 403, description = "无权限"),
        (status = 404, description = "分类不存在")
    )
)]
pub async fn create_product(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    request: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service.create_product(request.into_inner()).await {
        Ok(product) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/products/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    request_body = UpdateProductRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "商品已更新，折后价重新计算", body = ProductResponse),
        (status = 400, description = "价格或折扣无效"),
        (status = 403, description = "无权限"),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn update_product(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service
        .update_product(path.into_inner(), request.into_inner())
        .await
    {
        Ok(product) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": product
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "商品已删除"),
        (status = 400, description = "商品已被订单引用"),
        (status = 403, description = "无权限"),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn delete_product(
    user_service: web::Data<UserService>,
    catalogue_service: web::Data<CatalogueService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = require_staff(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match catalogue_service.delete_product(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Product deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/orders/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "订单ID")
    ),
    request_body = UpdateOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "订单状态已更新", body = OrderResponse),
        (status = 400, description = "订单已完成或已取消"),
        (status = 403, description = "无权限"),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn update_order_status(
    user_service: web::Data<UserService>,
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse> {
    let staff_id = match require_staff(&user_service, &req).await {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    let order_id = path.into_inner();

    match order_service
        .update_order_status(None, order_id, request.into_inner())
        .await
    {
        Ok(order) => {
            log::info!("Staff {staff_id} updated order {order_id} to {}", order.status);
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": order
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/banners", web::post().to(create_banner))
            .route("/banners/{id}", web::patch().to(update_banner))
            .route("/banners/{id}", web::delete().to(delete_banner))
            .route("/categories", web::post().to(create_category))
            .route("/categories/{id}", web::patch().to(update_category))
            .route("/categories/{id}", web::delete().to(delete_category))
            .route("/products", web::post().to(create_product))
            .route("/products/{id}", web::patch().to(update_product))
            .route("/products/{id}", web::delete().to(delete_product))
            .route("/orders/{id}", web::patch().to(update_order_status)),
    );
}

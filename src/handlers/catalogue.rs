use crate::models::*;
use crate::services::CatalogueService;
use actix_web::{HttpResponse, Result, ResponseError, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/catalogue-in-header",
    tag = "catalogue",
    responses(
        (status = 200, description = "页头分类", body = [CategoryResponse])
    )
)]
pub async fn header_categories(
    catalogue_service: web::Data<CatalogueService>,
) -> Result<HttpResponse> {
    match catalogue_service.header_categories().await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/home",
    tag = "catalogue",
    responses(
        (status = 200, description = "首页数据", body = HomeResponse)
    )
)]
pub async fn home(catalogue_service: web::Data<CatalogueService>) -> Result<HttpResponse> {
    match catalogue_service.home().await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/catalogue",
    tag = "catalogue",
    responses(
        (status = 200, description = "分类列表（含图片）", body = [CategoryWithImageResponse])
    )
)]
pub async fn catalogue(catalogue_service: web::Data<CatalogueService>) -> Result<HttpResponse> {
    match catalogue_service.catalogue().await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/catalogue/{id}/menu",
    tag = "catalogue",
    params(
        ("id" = i64, Path, description = "分类ID")
    ),
    responses(
        (status = 200, description = "分类菜单", body = CategoryMenuResponse),
        (status = 404, description = "分类不存在")
    )
)]
pub async fn category_menu(
    catalogue_service: web::Data<CatalogueService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match catalogue_service.category_menu(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "product",
    responses(
        (status = 200, description = "启用的商品", body = [ProductItemResponse])
    )
)]
pub async fn list_products(
    catalogue_service: web::Data<CatalogueService>,
) -> Result<HttpResponse> {
    match catalogue_service.list_products().await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "product",
    params(
        ("id" = i64, Path, description = "商品ID")
    ),
    responses(
        (status = 200, description = "商品详情", body = ProductResponse),
        (status = 404, description = "商品不存在或未启用")
    )
)]
pub async fn get_product(
    catalogue_service: web::Data<CatalogueService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match catalogue_service.get_product(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn catalogue_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/catalogue-in-header", web::get().to(header_categories))
        .route("/home", web::get().to(home))
        .route("/catalogue", web::get().to(catalogue))
        .route("/catalogue/{id}/menu", web::get().to(category_menu))
        .route("/products", web::get().to(list_products))
        .route("/products/{id}", web::get().to(get_product));
}

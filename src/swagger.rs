use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::send_code,
        handlers::auth::verify,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::user::get_profile,
        handlers::catalogue::header_categories,
        handlers::catalogue::home,
        handlers::catalogue::catalogue,
        handlers::catalogue::category_menu,
        handlers::catalogue::list_products,
        handlers::catalogue::get_product,
        handlers::order_item::list_order_items,
        handlers::order_item::create_order_item,
        handlers::order_item::get_order_item,
        handlers::order_item::update_order_item,
        handlers::order_item::delete_order_item,
        handlers::order::get_orders,
        handlers::order::create_order,
        handlers::order::get_order,
        handlers::order::update_order,
        handlers::order::delete_order,
        handlers::order::remove_order_item,
        handlers::order::clear_order_items,
        handlers::admin::create_banner,
        handlers::admin::update_banner,
        handlers::admin::delete_banner,
        handlers::admin::create_category,
        handlers::admin::update_category,
        handlers::admin::delete_category,
        handlers::admin::create_product,
        handlers::admin::update_product,
        handlers::admin::delete_product,
        handlers::admin::update_order_status,
    ),
    components(
        schemas(
            RegisterRequest,
            RegisterResponse,
            SendCodeRequest,
            VerifyPhoneRequest,
            LoginRequest,
            RefreshTokenRequest,
            UserResponse,
            AuthResponse,
            BannerResponse,
            CategoryResponse,
            CategoryWithImageResponse,
            ProductItemResponse,
            ProductResponse,
            MenuResponse,
            CategoryMenuResponse,
            HomeResponse,
            CreateBannerRequest,
            UpdateBannerRequest,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CreateProductRequest,
            UpdateProductRequest,
            OrderItemStatus,
            OrderStatus,
            CreateOrderItemRequest,
            UpdateOrderItemRequest,
            OrderItemResponse,
            UpdateOrderRequest,
            OrderResponse,
            PaginatedOrderResponse,
            PaginatedOrderItemResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and phone verification API"),
        (name = "user", description = "User profile API"),
        (name = "catalogue", description = "Storefront catalogue API"),
        (name = "product", description = "Product API"),
        (name = "order-item", description = "Order item API"),
        (name = "order", description = "Order management API"),
        (name = "admin", description = "Staff-only management API"),
    ),
    info(
        title = "PizzaPoint Backend API",
        version = "0.1.0",
        description = "PizzaPoint storefront REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_ledger_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/orders"));
        assert!(paths.contains_key("/orders/{id}/items/{item_id}"));
        assert!(paths.contains_key("/order-items/{id}"));
        assert!(paths.contains_key("/admin/orders/{id}"));
    }
}

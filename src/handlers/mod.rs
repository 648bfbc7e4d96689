pub mod admin;
pub mod auth;
pub mod catalogue;
pub mod order;
pub mod order_item;
pub mod user;

pub use admin::admin_config;
pub use auth::auth_config;
pub use catalogue::catalogue_config;
pub use order::order_config;
pub use order_item::order_item_config;
pub use user::user_config;

use crate::error::{AppError, AppResult};
use actix_web::{HttpMessage, HttpRequest};

/// 认证中间件写入的当前用户 id
pub(crate) fn current_user_id(req: &HttpRequest) -> AppResult<i64> {
    req.extensions()
        .get::<i64>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

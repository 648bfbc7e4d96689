use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpResponse, Result, ResponseError, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "注册成功，验证码已发送", body = RegisterResponse),
        (status = 400, description = "请求参数错误或手机号已注册"),
        (status = 502, description = "短信发送失败")
    )
)]
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response,
            "message": "Verification code sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/send-code",
    tag = "auth",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "验证码发送成功", body = RegisterResponse),
        (status = 400, description = "请求过于频繁"),
        (status = 404, description = "手机号未注册")
    )
)]
pub async fn send_code(
    auth_service: web::Data<AuthService>,
    request: web::Json<SendCodeRequest>,
) -> Result<HttpResponse> {
    match auth_service.send_code(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response,
            "message": "Verification code sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify",
    tag = "auth",
    request_body = VerifyPhoneRequest,
    responses(
        (status = 200, description = "验证成功", body = AuthResponse),
        (status = 400, description = "验证码错误或已过期"),
        (status = 404, description = "手机号未注册")
    )
)]
pub async fn verify(
    auth_service: web::Data<AuthService>,
    request: web::Json<VerifyPhoneRequest>,
) -> Result<HttpResponse> {
    match auth_service.verify_phone(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = AuthResponse),
        (status = 401, description = "认证失败")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "刷新令牌成功", body = AuthResponse),
        (status = 401, description = "无效的刷新令牌")
    )
)]
pub async fn refresh(
    auth_service: web::Data<AuthService>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse> {
    match auth_service.refresh_token(&request.refresh_token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/send-code", web::post().to(send_code))
            .route("/verify", web::post().to(verify))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh)),
    );
}

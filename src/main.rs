use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use pizzapoint_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::TwilioService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    let pool = Arc::new(pool);

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );
    let twilio_service = TwilioService::new(config.twilio.clone());
    if !twilio_service.is_configured() {
        log::warn!("Twilio credentials missing, verification codes will only be logged");
    }

    // 创建服务
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone(), twilio_service);
    let user_service = UserService::new(pool.clone());
    let catalogue_service = CatalogueService::new(pool.clone());
    let order_item_service = OrderItemService::new(pool.clone());
    let order_service = OrderService::new(pool.clone(), config.orders.claim_scope);

    if let Some(admin) = &config.admin {
        auth_service
            .ensure_admin(admin)
            .await
            .expect("Failed to provision admin user");
    }

    log::info!(
        "Orders claim pending items with scope {:?}",
        config.orders.claim_scope
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(catalogue_service.clone()))
            .app_data(web::Data::new(order_item_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::catalogue_config)
                    .configure(handlers::order_item_config)
                    .configure(handlers::order_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}

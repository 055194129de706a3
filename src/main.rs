use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;
use std::time::Duration;

use subscription_aggregator::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::{PanicGuard, create_cors},
    repositories::PgSubscriptionRepository,
    services::SubscriptionService,
    swagger::swagger_config,
};

fn init_logger(level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
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
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 加载配置
    let config = Config::from_toml().map_err(|e| startup_error("Failed to load configuration", e))?;

    init_logger(&config.log.level);

    // 创建数据库连接池
    let db = create_pool(&config.database).await.map_err(|e| {
        log::error!("Failed to connect to the database: {}", e);
        startup_error("Failed to create database connection pool", e)
    })?;

    // 运行数据库迁移
    run_migrations(&db).await.map_err(|e| {
        log::error!("Failed to run database migrations: {}", e);
        startup_error("Failed to run database migrations", e)
    })?;

    let subscription_service = SubscriptionService::new(
        Arc::new(PgSubscriptionRepository::new(db.clone())),
        Duration::from_secs(config.database.store_timeout_secs),
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(PanicGuard)
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(subscription_service.clone()))
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .configure(swagger_config)
            .configure(handlers::health_config)
            .service(web::scope("/api/v1").configure(handlers::subscription_config))
    })
    .shutdown_timeout(config.server.shutdown_timeout_secs)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    log::info!("HTTP server stopped, closing database connections");
    if let Err(e) = db.close().await {
        log::error!("Failed to close database connections: {}", e);
    }

    Ok(())
}

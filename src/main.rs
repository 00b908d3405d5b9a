use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::{Context, anyhow};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use daily_card_bot::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{CardDelivery, TelegramService},
    handlers::{self, BotContext},
    middlewares::{AdminAuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks::SweepScheduler,
    utils::{Clock, SystemClock},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
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
    let config = Config::from_toml().map_err(|e| anyhow!("failed to load configuration: {e}"))?;
    let zone = config.draw.zone().map_err(|e| anyhow!(e))?;

    // 数据库
    let pool = create_pool(&config.database)
        .await
        .context("failed to create database connection pool")?;
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    tokio::fs::create_dir_all(&config.storage.images_dir)
        .await
        .with_context(|| format!("failed to create {}", config.storage.images_dir))?;

    if config.admin.api_token.is_empty() {
        log::warn!("ADMIN_API_TOKEN is empty; the admin API will reject every request");
    }

    // 服务
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let telegram = TelegramService::new(config.telegram.clone())
        .context("failed to build Telegram client")?;
    let delivery: Arc<dyn CardDelivery> = Arc::new(telegram.clone());

    let settings_service = SettingsService::load(&config.storage.settings_path)
        .await
        .context("failed to load bot settings")?;
    let card_service = CardService::new(pool.clone(), &config.storage.images_dir);
    let user_service = UserService::new(pool.clone());
    let draw_service = DrawService::new(
        user_service,
        card_service.clone(),
        clock.clone(),
        config.draw.cooldown(),
        zone,
    );
    let sweep_service = SweepService::new(draw_service.clone(), delivery.clone());
    let scheduler = SweepScheduler::new(sweep_service, clock, zone);

    // 上次运行时开启的定时推送
    let settings = settings_service.snapshot().await;
    if settings.scheduler_status {
        match scheduler.enable(&settings).await {
            Ok(schedule) => log::info!("Restored daily sweep: {}", schedule.cron_expression()),
            Err(e) => log::error!("Failed to restore daily sweep: {e}"),
        }
    }

    let bot_context = BotContext {
        delivery,
        draws: draw_service.clone(),
        settings: settings_service.clone(),
    };

    log::info!(
        "Starting HTTP server at {}:{} (cooldown {} days, zone {})",
        config.server.host,
        config.server.port,
        config.draw.cooldown_days,
        zone
    );

    let admin_token = config.admin.api_token.clone();
    let server_scheduler = scheduler.clone();
    let server_settings = settings_service.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AdminAuthMiddleware::new(admin_token.clone()))
            .app_data(web::Data::new(telegram.clone()))
            .app_data(web::Data::new(bot_context.clone()))
            .app_data(web::Data::new(card_service.clone()))
            .app_data(web::Data::new(draw_service.clone()))
            .app_data(web::Data::new(server_settings.clone()))
            .app_data(web::Data::new(server_scheduler.clone()))
            .configure(swagger_config)
            .configure(handlers::bot_config)
            .service(web::scope("/api/v1").configure(handlers::admin_config))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    // 停机：拆除定时任务并记录为关闭
    scheduler.teardown().await;
    if let Err(e) = settings_service.set_scheduler_status(false).await {
        log::error!("Failed to persist scheduler status on shutdown: {e}");
    }
    log::info!("Server stopped");
    Ok(())
}

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{CardService, DrawService, SettingsService};
use crate::tasks::SweepScheduler;
use crate::utils::NotificationSchedule;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/admin/cards",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "卡牌列表", body = [CardResponse]),
        (status = 401, description = "未授权", body = ApiErrorResponse)
    )
)]
pub async fn list_cards(card_service: web::Data<CardService>) -> Result<HttpResponse> {
    match card_service.list_cards().await {
        Ok(cards) => {
            let cards: Vec<CardResponse> = cards.into_iter().map(CardResponse::from).collect();
            Ok(HttpResponse::Ok().json(ApiResponse::success(cards)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/cards/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "卡牌 ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "卡牌详情", body = CardResponse),
        (status = 404, description = "卡牌不存在", body = ApiErrorResponse)
    )
)]
pub async fn get_card(
    card_service: web::Data<CardService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match card_service.get_card(path.into_inner()).await {
        Ok(card) => Ok(HttpResponse::Ok().json(ApiResponse::success(CardResponse::from(card)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/cards",
    tag = "admin",
    request_body = CreateCardRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "卡牌已创建", body = CardResponse),
        (status = 400, description = "描述为空或图片编码无效", body = ApiErrorResponse)
    )
)]
pub async fn create_card(
    card_service: web::Data<CardService>,
    request: web::Json<CreateCardRequest>,
) -> Result<HttpResponse> {
    match card_service.create_card(request.into_inner()).await {
        Ok(card) => Ok(HttpResponse::Created().json(ApiResponse::success(CardResponse::from(card)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/cards/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "卡牌 ID")),
    request_body = UpdateCardRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "描述已更新", body = CardResponse),
        (status = 404, description = "卡牌不存在", body = ApiErrorResponse)
    )
)]
pub async fn update_card(
    card_service: web::Data<CardService>,
    path: web::Path<i32>,
    request: web::Json<UpdateCardRequest>,
) -> Result<HttpResponse> {
    match card_service
        .update_description(path.into_inner(), &request.description)
        .await
    {
        Ok(card) => Ok(HttpResponse::Ok().json(ApiResponse::success(CardResponse::from(card)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/cards/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "卡牌 ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "卡牌已删除"),
        (status = 404, description = "卡牌不存在", body = ApiErrorResponse)
    )
)]
pub async fn delete_card(
    card_service: web::Data<CardService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    match card_service.delete_card(id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::message(format!("Card {id} deleted")))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "当前设置", body = BotSettings))
)]
pub async fn get_settings(settings_service: web::Data<SettingsService>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiResponse::success(settings_service.snapshot().await)))
}

#[utoipa::path(
    put,
    path = "/admin/settings/links",
    tag = "settings",
    request_body = UpdateLinksRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "链接已更新", body = BotSettings),
        (status = 400, description = "链接必须以 http:// 或 https:// 开头", body = ApiErrorResponse)
    )
)]
pub async fn update_links(
    settings_service: web::Data<SettingsService>,
    request: web::Json<UpdateLinksRequest>,
) -> Result<HttpResponse> {
    match settings_service.set_links(request.into_inner()).await {
        Ok(settings) => Ok(HttpResponse::Ok().json(ApiResponse::success(settings))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/settings/texts",
    tag = "settings",
    request_body = UpdateTextsRequest,
    security(("bearer_auth" = [])),
    responses((status = 200, description = "文案已更新", body = BotSettings))
)]
pub async fn update_texts(
    settings_service: web::Data<SettingsService>,
    request: web::Json<UpdateTextsRequest>,
) -> Result<HttpResponse> {
    match settings_service.set_texts(request.into_inner()).await {
        Ok(settings) => Ok(HttpResponse::Ok().json(ApiResponse::success(settings))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/settings/limits",
    tag = "settings",
    request_body = UpdateLimitsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "每日上限已更新", body = BotSettings),
        (status = 400, description = "上限必须为正整数", body = ApiErrorResponse)
    )
)]
pub async fn update_limits(
    settings_service: web::Data<SettingsService>,
    request: web::Json<UpdateLimitsRequest>,
) -> Result<HttpResponse> {
    match settings_service.set_cards_limit(request.cards_limit).await {
        Ok(settings) => Ok(HttpResponse::Ok().json(ApiResponse::success(settings))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/settings/notification-time",
    tag = "settings",
    request_body = UpdateNotificationTimeRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "推送时间已更新", body = BotSettings),
        (status = 400, description = "小时必须为 0-23", body = ApiErrorResponse)
    )
)]
pub async fn update_notification_time(
    settings_service: web::Data<SettingsService>,
    scheduler: web::Data<SweepScheduler>,
    request: web::Json<UpdateNotificationTimeRequest>,
) -> Result<HttpResponse> {
    let result = async {
        let settings = settings_service.set_notification_time(request.hour).await?;
        scheduler.reschedule(&settings).await?;
        Ok::<_, AppError>(settings)
    }
    .await;
    match result {
        Ok(settings) => Ok(HttpResponse::Ok().json(ApiResponse::success(settings))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/settings/notification-days/{day}/toggle",
    tag = "settings",
    params(("day" = String, Path, description = "星期: 0=周一 ... 6=周日")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "已切换", body = BotSettings),
        (status = 400, description = "星期必须为 0-6", body = ApiErrorResponse)
    )
)]
pub async fn toggle_notification_day(
    settings_service: web::Data<SettingsService>,
    scheduler: web::Data<SweepScheduler>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let result = async {
        let settings = settings_service.toggle_notification_day(&path).await?;
        // 取消最后一个星期时停止任务
        if NotificationSchedule::from_settings(&settings)?.is_empty() {
            scheduler.disable().await;
        } else {
            scheduler.reschedule(&settings).await?;
        }
        Ok::<_, AppError>(settings)
    }
    .await;
    match result {
        Ok(settings) => Ok(HttpResponse::Ok().json(ApiResponse::success(settings))),
        Err(e) => Ok(e.error_response()),
    }
}

async fn scheduler_status(
    settings_service: &SettingsService,
    scheduler: &SweepScheduler,
) -> AppResult<SchedulerStatusResponse> {
    let settings = settings_service.snapshot().await;
    let cron = match scheduler.current_cron().await {
        Some(cron) => cron,
        None => NotificationSchedule::from_settings(&settings)?.cron_expression(),
    };
    Ok(SchedulerStatusResponse {
        running: scheduler.is_running().await,
        scheduler_status: settings.scheduler_status,
        notification_time: settings.notification_time,
        notification_days: settings.notification_days,
        cron,
    })
}

#[utoipa::path(
    get,
    path = "/admin/scheduler",
    tag = "scheduler",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "推送任务状态", body = SchedulerStatusResponse))
)]
pub async fn get_scheduler(
    settings_service: web::Data<SettingsService>,
    scheduler: web::Data<SweepScheduler>,
) -> Result<HttpResponse> {
    match scheduler_status(&settings_service, &scheduler).await {
        Ok(status) => Ok(HttpResponse::Ok().json(ApiResponse::success(status))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/scheduler/enable",
    tag = "scheduler",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "推送已开启", body = SchedulerStatusResponse),
        (status = 400, description = "未选择推送星期", body = ApiErrorResponse)
    )
)]
pub async fn enable_scheduler(
    settings_service: web::Data<SettingsService>,
    scheduler: web::Data<SweepScheduler>,
) -> Result<HttpResponse> {
    let result = async {
        let settings = settings_service.snapshot().await;
        scheduler.enable(&settings).await?;
        settings_service.set_scheduler_status(true).await?;
        scheduler_status(&settings_service, &scheduler).await
    }
    .await;
    match result {
        Ok(status) => Ok(HttpResponse::Ok().json(ApiResponse::success(status))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/scheduler/disable",
    tag = "scheduler",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "推送已关闭", body = SchedulerStatusResponse))
)]
pub async fn disable_scheduler(
    settings_service: web::Data<SettingsService>,
    scheduler: web::Data<SweepScheduler>,
) -> Result<HttpResponse> {
    scheduler.disable().await;
    let result = async {
        settings_service.set_scheduler_status(false).await?;
        scheduler_status(&settings_service, &scheduler).await
    }
    .await;
    match result {
        Ok(status) => Ok(HttpResponse::Ok().json(ApiResponse::success(status))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/sweep/run",
    tag = "scheduler",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "手动推送完成", body = SweepReport))
)]
pub async fn run_sweep(scheduler: web::Data<SweepScheduler>) -> Result<HttpResponse> {
    match scheduler.sweep().run_sweep().await {
        Ok(report) => Ok(HttpResponse::Ok().json(ApiResponse::success(report))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/statistics",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "统计数据", body = StatisticsResponse))
)]
pub async fn get_statistics(draw_service: web::Data<DrawService>) -> Result<HttpResponse> {
    match draw_service
        .users()
        .statistics(draw_service.now(), draw_service.zone())
        .await
    {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(stats))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/cards", web::get().to(list_cards))
            .route("/cards", web::post().to(create_card))
            .route("/cards/{id}", web::get().to(get_card))
            .route("/cards/{id}", web::put().to(update_card))
            .route("/cards/{id}", web::delete().to(delete_card))
            .route("/settings", web::get().to(get_settings))
            .route("/settings/links", web::put().to(update_links))
            .route("/settings/texts", web::put().to(update_texts))
            .route("/settings/limits", web::put().to(update_limits))
            .route(
                "/settings/notification-time",
                web::put().to(update_notification_time),
            )
            .route(
                "/settings/notification-days/{day}/toggle",
                web::post().to(toggle_notification_day),
            )
            .route("/scheduler", web::get().to(get_scheduler))
            .route("/scheduler/enable", web::post().to(enable_scheduler))
            .route("/scheduler/disable", web::post().to(disable_scheduler))
            .route("/sweep/run", web::post().to(run_sweep))
            .route("/statistics", web::get().to(get_statistics)),
    );
}

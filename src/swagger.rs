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
        handlers::admin::list_cards,
        handlers::admin::get_card,
        handlers::admin::create_card,
        handlers::admin::update_card,
        handlers::admin::delete_card,
        handlers::admin::get_settings,
        handlers::admin::update_links,
        handlers::admin::update_texts,
        handlers::admin::update_limits,
        handlers::admin::update_notification_time,
        handlers::admin::toggle_notification_day,
        handlers::admin::get_scheduler,
        handlers::admin::enable_scheduler,
        handlers::admin::disable_scheduler,
        handlers::admin::run_sweep,
        handlers::admin::get_statistics,
    ),
    components(
        schemas(
            CardResponse,
            CreateCardRequest,
            UpdateCardRequest,
            BotSettings,
            UpdateLinksRequest,
            UpdateTextsRequest,
            UpdateLimitsRequest,
            UpdateNotificationTimeRequest,
            SchedulerStatusResponse,
            SweepReport,
            StatisticsResponse,
            ApiError,
            ApiErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "admin", description = "Card catalog and statistics"),
        (name = "settings", description = "Bot settings"),
        (name = "scheduler", description = "Daily card sweep"),
    ),
    info(
        title = "Daily Card Bot Admin API",
        version = "0.1.0",
        description = "Admin REST API of the daily card Telegram bot",
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

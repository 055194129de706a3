use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::subscription::get_subscription,
        handlers::subscription::create_subscription,
        handlers::subscription::update_subscription,
        handlers::subscription::delete_subscription,
        handlers::subscription::list_user_subscriptions,
        handlers::subscription::calculate_total,
        handlers::health::health_check,
    ),
    components(
        schemas(
            Subscription,
            SubscriptionRequest,
            DeleteSubscriptionRequest,
            SubscriptionListResponse,
            TotalResponse,
            PeriodInfo,
            TotalFilters,
            ErrorResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "subscriptions", description = "Subscription records API"),
        (name = "analytics", description = "Subscription cost aggregation API"),
        (name = "system", description = "Service status"),
    ),
    info(
        title = "Subscription Aggregator API",
        version = "1.0.0",
        description = "Records users' online subscriptions and totals their cost over month ranges"
    )
)]
pub struct ApiDoc;

fn redirect_to_ui() -> actix_web::HttpResponse {
    actix_web::HttpResponse::Found()
        .append_header(("Location", "/swagger-ui/"))
        .finish()
}

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route("/swagger-ui", web::get().to(|| async { redirect_to_ui() }))
    .route("/", web::get().to(|| async { redirect_to_ui() }));
}

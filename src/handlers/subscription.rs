use crate::models::*;
use crate::repositories::Upserted;
use crate::services::SubscriptionService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    params(SubscriptionKeyQuery),
    responses(
        (status = 200, description = "Subscription found", body = Subscription),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse)
    )
)]
pub async fn get_subscription(
    service: web::Data<SubscriptionService>,
    query: web::Query<SubscriptionKeyQuery>,
) -> Result<HttpResponse> {
    let (user_id, service_name) = match query.into_inner().into_key() {
        Ok(key) => key,
        Err(e) => return Ok(e.error_response()),
    };

    match service.get_subscription(user_id, &service_name).await {
        Ok(sub) => Ok(HttpResponse::Ok().json(sub)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    request_body = SubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = Subscription),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "Subscription already exists", body = ErrorResponse)
    )
)]
pub async fn create_subscription(
    service: web::Data<SubscriptionService>,
    request: web::Json<SubscriptionRequest>,
) -> Result<HttpResponse> {
    match service.create_subscription(request.into_inner()).await {
        Ok(sub) => {
            log::info!(
                "Subscription created: user={} service={}",
                sub.user_id,
                sub.service_name
            );
            Ok(HttpResponse::Created().json(sub))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    params(UpsertQuery),
    request_body = SubscriptionRequest,
    responses(
        (status = 200, description = "Subscription updated", body = Subscription),
        (status = 201, description = "Subscription created (upsert=true only)", body = Subscription),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse)
    )
)]
pub async fn update_subscription(
    service: web::Data<SubscriptionService>,
    query: web::Query<UpsertQuery>,
    request: web::Json<SubscriptionRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();

    if query.upsert {
        return match service.upsert_subscription(request).await {
            Ok(Upserted::Created(sub)) => {
                log::info!(
                    "Subscription upserted (created): user={} service={}",
                    sub.user_id,
                    sub.service_name
                );
                Ok(HttpResponse::Created().json(sub))
            }
            Ok(Upserted::Replaced(sub)) => {
                log::info!(
                    "Subscription upserted (replaced): user={} service={}",
                    sub.user_id,
                    sub.service_name
                );
                Ok(HttpResponse::Ok().json(sub))
            }
            Err(e) => Ok(e.error_response()),
        };
    }

    match service.update_subscription(request).await {
        Ok(sub) => {
            log::info!(
                "Subscription updated: user={} service={}",
                sub.user_id,
                sub.service_name
            );
            Ok(HttpResponse::Ok().json(sub))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/subscriptions",
    tag = "subscriptions",
    request_body = DeleteSubscriptionRequest,
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse)
    )
)]
pub async fn delete_subscription(
    service: web::Data<SubscriptionService>,
    request: web::Json<DeleteSubscriptionRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    match service
        .delete_subscription(request.user_id, &request.service_name)
        .await
    {
        Ok(()) => {
            log::info!(
                "Subscription deleted: user={} service={}",
                request.user_id,
                request.service_name
            );
            Ok(HttpResponse::NoContent().finish())
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/user/{id}",
    tag = "subscriptions",
    params(("id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "Subscriptions of the user", body = SubscriptionListResponse),
        (status = 400, description = "Invalid user ID", body = ErrorResponse)
    )
)]
pub async fn list_user_subscriptions(
    service: web::Data<SubscriptionService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = match parse_user_id(&path.into_inner()) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };

    match service.list_subscriptions(user_id).await {
        Ok(subscriptions) => Ok(HttpResponse::Ok().json(SubscriptionListResponse {
            user_id,
            subscriptions,
            currency: CURRENCY.to_string(),
        })),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/subscriptions/total",
    tag = "analytics",
    params(TotalQuery),
    responses(
        (status = 200, description = "Total cost for the period", body = TotalResponse),
        (status = 400, description = "Missing or invalid period", body = ErrorResponse)
    )
)]
pub async fn calculate_total(
    service: web::Data<SubscriptionService>,
    query: web::Query<TotalQuery>,
) -> Result<HttpResponse> {
    let filter = match TotalFilter::try_from(query.into_inner()) {
        Ok(filter) => filter,
        Err(e) => return Ok(e.error_response()),
    };

    match service.calculate_total(&filter).await {
        Ok(total) => {
            log::info!(
                "Total calculated: {total} for {}..{}",
                filter.start_month,
                filter.end_month
            );
            Ok(HttpResponse::Ok().json(TotalResponse::new(filter, total, CURRENCY)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn subscription_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subscriptions")
            .service(
                web::resource("")
                    .route(web::get().to(get_subscription))
                    .route(web::post().to(create_subscription))
                    .route(web::put().to(update_subscription))
                    .route(web::delete().to(delete_subscription)),
            )
            .route("/total", web::get().to(calculate_total))
            .route("/user/{id}", web::get().to(list_user_subscriptions)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{json_config, query_config};
    use crate::repositories::InMemorySubscriptionRepository;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(SubscriptionService::new(
                        Arc::new(InMemorySubscriptionRepository::new()),
                        Duration::from_secs(5),
                    )))
                    .app_data(json_config())
                    .app_data(query_config())
                    .service(web::scope("/api/v1").configure(subscription_config)),
            )
            .await
        };
    }

    fn body(user_id: Uuid, service: &str, price: i64, start: &str, end: Option<&str>) -> Value {
        json!({
            "service_name": service,
            "price": price,
            "user_id": user_id,
            "start_date": start,
            "end_date": end,
        })
    }

    #[actix_web::test]
    async fn test_create_get_and_duplicate() {
        let app = app!();
        let user = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(body(user, "Netflix", 300, "07-2025", Some("08-2025")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["start_date"], "07-2025");
        assert_eq!(created["end_date"], "08-2025");

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/subscriptions?user_id={user}&service_name=Netflix"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let fetched: Value = test::read_body_json(resp).await;
        assert_eq!(fetched["price"], 300);
        assert_eq!(fetched["service_name"], "Netflix");

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(body(user, "Netflix", 300, "07-2025", None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["error"], "CONFLICT");
    }

    #[actix_web::test]
    async fn test_create_validation_errors() {
        let app = app!();
        let user = Uuid::new_v4();

        for bad in [
            body(user, "", 300, "07-2025", None),
            body(user, "Netflix", 0, "07-2025", None),
            body(user, "Netflix", 300, "13-2025", None),
            body(user, "Netflix", 300, "07-2025", Some("06-2025")),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/v1/subscriptions")
                .set_json(bad)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["error"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_get_missing_and_bad_params() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/v1/subscriptions?user_id={}&service_name=Netflix",
                Uuid::new_v4()
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions?service_name=Netflix")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions?user_id=abc&service_name=Netflix")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_put_update_and_upsert() {
        let app = app!();
        let user = Uuid::new_v4();

        let req = test::TestRequest::put()
            .uri("/api/v1/subscriptions")
            .set_json(body(user, "Spotify", 200, "01-2025", None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::put()
            .uri("/api/v1/subscriptions?upsert=true")
            .set_json(body(user, "Spotify", 200, "01-2025", None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::put()
            .uri("/api/v1/subscriptions?upsert=true")
            .set_json(body(user, "Spotify", 250, "01-2025", None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri("/api/v1/subscriptions")
            .set_json(body(user, "Spotify", 300, "2025-02", Some("2025-06")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Value = test::read_body_json(resp).await;
        assert_eq!(updated["price"], 300);
        assert_eq!(updated["start_date"], "02-2025");
        assert_eq!(updated["end_date"], "06-2025");
    }

    #[actix_web::test]
    async fn test_delete_then_delete_again() {
        let app = app!();
        let user = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(body(user, "Netflix", 300, "07-2025", None))
            .to_request();
        test::call_service(&app, req).await;

        for expected in [StatusCode::NO_CONTENT, StatusCode::NOT_FOUND] {
            let req = test::TestRequest::delete()
                .uri("/api/v1/subscriptions")
                .set_json(json!({"user_id": user, "service_name": "Netflix"}))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);
        }
    }

    #[actix_web::test]
    async fn test_list_empty_and_sorted() {
        let app = app!();
        let user = Uuid::new_v4();

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/subscriptions/user/{user}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let list: Value = test::read_body_json(resp).await;
        assert_eq!(list["subscriptions"], json!([]));
        assert_eq!(list["currency"], "RUB");

        for name in ["Spotify", "Netflix"] {
            let req = test::TestRequest::post()
                .uri("/api/v1/subscriptions")
                .set_json(body(user, name, 100, "07-2025", None))
                .to_request();
            test::call_service(&app, req).await;
        }
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/subscriptions/user/{user}"))
            .to_request();
        let list: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(list["subscriptions"][0]["service_name"], "Netflix");
        assert_eq!(list["subscriptions"][1]["service_name"], "Spotify");

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions/user/not-a-uuid")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_total_endpoint() {
        let app = app!();
        let user = Uuid::new_v4();

        let req = test::TestRequest::post()
            .uri("/api/v1/subscriptions")
            .set_json(body(user, "Netflix", 300, "07-2025", Some("08-2025")))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get()
            .uri(&format!(
                "/api/v1/subscriptions/total?start_month=07-2025&end_month=2025-07&service_name=Netflix&user_id={user}"
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let total: Value = test::read_body_json(resp).await;
        assert_eq!(total["total"], 300);
        assert_eq!(total["currency"], "RUB");
        assert_eq!(total["period"]["end_month"], "07-2025");
        assert_eq!(total["filters"]["service_name"], "Netflix");
        assert_eq!(total["filters"]["user_id"], user.to_string());

        let req = test::TestRequest::get()
            .uri("/api/v1/subscriptions/total?start_month=09-2025&end_month=12-2025")
            .to_request();
        let total: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(total["total"], 0);
    }

    #[actix_web::test]
    async fn test_total_endpoint_rejects_bad_period() {
        let app = app!();

        for uri in [
            "/api/v1/subscriptions/total?end_month=12-2025",
            "/api/v1/subscriptions/total?start_month=abcd&end_month=12-2025",
            "/api/v1/subscriptions/total?start_month=12-2025&end_month=01-2025",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

lazy_static::lazy_static! {
    static ref STARTED_AT: i64 = chrono::Utc::now().timestamp();
}

pub fn increment_request_count() {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_error_count() {
    ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn mark_started() {
    lazy_static::initialize(&STARTED_AT);
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub process_uptime_seconds: i64,
}

pub fn snapshot() -> MetricsResponse {
    MetricsResponse {
        http_requests_total: REQUEST_COUNT.load(Ordering::Relaxed),
        http_errors_total: ERROR_COUNT.load(Ordering::Relaxed),
        process_uptime_seconds: (chrono::Utc::now().timestamp() - *STARTED_AT).max(0),
    }
}

pub fn render_prometheus(m: &MetricsResponse) -> String {
    format!(
        "# HELP http_requests_total Total number of HTTP requests\n\
         # TYPE http_requests_total counter\n\
         http_requests_total {}\n\
         \n\
         # HELP http_errors_total Total number of HTTP responses with status >= 400\n\
         # TYPE http_errors_total counter\n\
         http_errors_total {}\n\
         \n\
         # HELP process_uptime_seconds Seconds since the server started\n\
         # TYPE process_uptime_seconds gauge\n\
         process_uptime_seconds {}\n",
        m.http_requests_total, m.http_errors_total, m.process_uptime_seconds
    )
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Prometheus text metrics", body = String)
    )
)]
pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render_prometheus(&snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App};

    #[::core::prelude::v1::test]
    fn test_render_prometheus() {
        let text = render_prometheus(&MetricsResponse {
            http_requests_total: 12,
            http_errors_total: 3,
            process_uptime_seconds: 60,
        });
        assert!(text.contains("http_requests_total 12\n"));
        assert!(text.contains("http_errors_total 3\n"));
        assert!(text.contains("# TYPE process_uptime_seconds gauge"));
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_counts_requests() {
        let app = test::init_service(
            App::new()
                .wrap(crate::middleware::SecurityHeaders)
                .route("/metrics", web::get().to(get_metrics)),
        )
        .await;

        let before = snapshot().http_requests_total;
        let res = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(snapshot().http_requests_total > before);

        let body = test::read_body(res).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("http_requests_total"));
    }
}

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

use super::Metrics;
use crate::health::{HealthReporter, HealthStatus};

/// Start the metrics HTTP server
/// This should be called in a separate thread/runtime to avoid conflicts
pub async fn start_metrics_server(
    metrics: Arc<Metrics>,
    health: HealthReporter,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!("📊 Starting metrics server on http://0.0.0.0:{}/metrics", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(metrics.clone()))
            .app_data(web::Data::new(health.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn metrics_handler(metrics: web::Data<Arc<Metrics>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(
    metrics: web::Data<Arc<Metrics>>,
    health: web::Data<HealthReporter>,
) -> impl Responder {
    let snapshot = health.snapshot();
    metrics.service_health_status.set(snapshot.overall_status.code());

    let body = serde_json::json!({
        "service": "takeout-orders",
        "health": snapshot,
    });

    match snapshot.overall_status {
        HealthStatus::Unhealthy(_) => HttpResponse::ServiceUnavailable().json(body),
        _ => HttpResponse::Ok().json(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentHealth;
    use actix_web::{body::to_bytes, test};

    fn app_data() -> (Arc<Metrics>, HealthReporter) {
        (Arc::new(Metrics::new().unwrap()), HealthReporter::new())
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_counters() {
        let (metrics, health) = app_data();
        metrics.orders_submitted.inc();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(metrics.clone()))
                .app_data(web::Data::new(health))
                .route("/metrics", web::get().to(metrics_handler)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
        assert!(resp.status().is_success());
        let body = to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("orders_submitted_total 1"));
    }

    #[actix_web::test]
    async fn test_health_endpoint_reports_unhealthy_component() {
        let (metrics, health) = app_data();
        health.update(ComponentHealth::new(
            "payment_gateway",
            HealthStatus::Unhealthy("Circuit breaker open".to_string()),
        ));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(metrics.clone()))
                .app_data(web::Data::new(health))
                .route("/health", web::get().to(health_handler)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(metrics.service_health_status.get(), 0);
    }
}

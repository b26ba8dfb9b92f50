//! Per-endpoint request counters feeding the `/api/v1/metrics` payload.
//!
//! Endpoints are keyed by the matched route pattern, not the raw path:
//! recognition and room WebSocket URLs carry per-session identifiers, and
//! keying by path would grow one metric entry per connection.

use crate::state::AppState;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService { service }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        // Unmatched requests (404s) have no pattern and fall back to the path.
        let route = req
            .match_pattern()
            .unwrap_or_else(|| req.uri().path().to_string());
        let endpoint = format!("{} {}", req.method(), route);

        if let Some(app_state) = req.app_data::<web::Data<AppState>>() {
            app_state.increment_request_count();
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let duration_ms = start_time.elapsed().as_millis() as u64;

            let is_error = match &result {
                Ok(response) => {
                    response.status().is_client_error() || response.status().is_server_error()
                }
                Err(_) => true,
            };

            if let Ok(response) = &result {
                if let Some(app_state) = response.request().app_data::<web::Data<AppState>>() {
                    app_state.record_endpoint_request(&endpoint, duration_ms, is_error);
                    if is_error {
                        app_state.increment_error_count();
                    }
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App, HttpResponse};

    #[actix_web::test]
    async fn session_urls_share_one_endpoint_entry() {
        let state = web::Data::new(AppState::new(AppConfig::default()));

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(MetricsMiddleware)
                .route(
                    "/ws/recognition/{session_id}",
                    web::get().to(HttpResponse::Ok),
                ),
        )
        .await;

        for session in ["debate-1", "debate-2"] {
            let req = test::TestRequest::get()
                .uri(&format!("/ws/recognition/{}", session))
                .to_request();
            test::call_service(&app, req).await;
        }

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.request_count, 2);
        assert_eq!(snapshot.endpoint_metrics.len(), 1);
        let metric = &snapshot.endpoint_metrics["GET /ws/recognition/{session_id}"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.error_count, 0);
    }

    #[actix_web::test]
    async fn error_responses_are_counted() {
        let state = web::Data::new(AppState::new(AppConfig::default()));

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .wrap(MetricsMiddleware)
                .route("/health", web::get().to(HttpResponse::BadRequest)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        test::call_service(&app, req).await;

        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.endpoint_metrics["GET /health"].error_count, 1);
    }
}

use crate::controller::{health_check_controller, notification_controller};
use crate::{params, sse::handler};
use axum::{
    routing::{get, post},
    Router,
};
use service::AppState;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Notification Hub API"
        ),
        paths(
            health_check_controller::health_check,
            notification_controller::publish,
            notification_controller::stats,
            handler::notification_stream,
        ),
        components(
            schemas(
                notification_controller::HubStats,
                params::notification::PublishParams,
            )
        ),
        tags(
            (name = "notification_hub", description = "Server-sent event notification fan-out")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(notification_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notifications", post(notification_controller::publish))
        .route(
            "/notifications/stats",
            get(notification_controller::stats),
        )
        .route(
            "/notifications/stream",
            get(handler::notification_stream),
        )
        .with_state(app_state)
}

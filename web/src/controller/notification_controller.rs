use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::controller::ApiResponse;
use crate::params::notification::PublishParams;
use crate::Error;
use ::sse::{IngestionState, SlowConsumerStrategy};
use log::*;
use service::AppState;

/// Point-in-time view of the hub and its ingestion loop.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct HubStats {
    pub(crate) subscribers: usize,
    #[schema(value_type = String)]
    pub(crate) slow_consumer_strategy: SlowConsumerStrategy,
    pub(crate) channel_capacity: usize,
    pub(crate) write_timeout_ms: u64,
    #[schema(value_type = String)]
    pub(crate) ingestion_state: IngestionState,
    pub(crate) processed: u64,
    pub(crate) errors: u64,
}

/// POST broadcast a notification to every connected subscriber
#[utoipa::path(
    post,
    path = "/notifications",
    request_body = PublishParams,
    responses(
        (status = 200, description = "Per-subscriber delivery outcome of the broadcast"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 503, description = "Hub is shutting down")
    )
)]
pub(crate) async fn publish(
    State(app_state): State<AppState>,
    Json(params): Json<PublishParams>,
) -> Result<impl IntoResponse, Error> {
    let message = params.into_message();
    debug!("POST Publish notification {}", message.id());

    let report = app_state.hub_ref().broadcast(message).await?;

    debug!("Broadcast report: {report:?}");

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), report)))
}

/// GET hub and ingestion statistics
#[utoipa::path(
    get,
    path = "/notifications/stats",
    responses(
        (status = 200, description = "Current hub and ingestion statistics", body = HubStats),
    )
)]
pub(crate) async fn stats(State(app_state): State<AppState>) -> impl IntoResponse {
    let hub = app_state.hub_ref();
    let options = hub.options();
    let ingestion = app_state.ingestion.stats();

    let stats = HubStats {
        subscribers: hub.subscriber_count(),
        slow_consumer_strategy: options.slow_consumer_strategy,
        channel_capacity: options.channel_capacity,
        write_timeout_ms: u64::try_from(options.write_timeout.as_millis()).unwrap_or(u64::MAX),
        ingestion_state: app_state.ingestion.state(),
        processed: ingestion.processed,
        errors: ingestion.errors,
    };

    Json(ApiResponse::new(StatusCode::OK.into(), stats))
}

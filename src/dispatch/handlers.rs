// HTTP trigger for the activation pass

use axum::{extract::State, Json};
use chrono::Utc;

use crate::dispatch::PassSummary;
use crate::AppState;

/// Handler for POST /api/dispatch/run
/// Runs one activation pass immediately, for cron-style external schedulers;
/// the internal interval scheduler covers normal operation
#[utoipa::path(
    post,
    path = "/api/dispatch/run",
    responses(
        (status = 200, description = "Aggregate counts for the pass", body = PassSummary)
    ),
    tag = "dispatch"
)]
pub async fn run_activation_pass_handler(State(state): State<AppState>) -> Json<PassSummary> {
    tracing::debug!("Manual activation pass requested");
    let summary = state.engine.run_activation_pass(Utc::now()).await;
    Json(summary)
}

//! # Operator Surface
//!
//! Read-only view over the post-commit dead-letter queue. A non-empty
//! queue means a timeline or financial effect failed after its primary
//! mutation committed and needs operator attention.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::{AppState, DeadLetterRecord};

/// Build the ops router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/ops/dead-letters", get(list_dead_letters))
}

/// GET /v1/ops/dead-letters: failed post-commit effects, oldest first.
#[utoipa::path(
    get,
    path = "/v1/ops/dead-letters",
    responses(
        (status = 200, description = "Dead letters", body = Vec<DeadLetterRecord>),
    ),
    tag = "ops"
)]
pub(crate) async fn list_dead_letters(State(state): State<AppState>) -> Json<Vec<DeadLetterRecord>> {
    Json(state.dead_letters.list())
}

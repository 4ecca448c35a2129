mod votes;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Routes that change state. Throttled per IP in `main`.
pub fn vote_router() -> Router<AppState> {
    Router::new().route("/vote", post(votes::cast_vote))
}

pub fn read_router() -> Router<AppState> {
    Router::new().route("/api/totals", get(votes::totals))
}

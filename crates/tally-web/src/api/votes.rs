use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tally_core::{CoreError, Totals, VoteType};

use crate::dto::{TotalsResponse, VoteRequest};
use crate::error::AppError;
use crate::identity::Voter;
use crate::state::AppState;

/// `POST /vote`: rejects voters already at today's limit, then validates
/// the vote type, then checks the limit again and records the vote in one
/// store transaction.
///
/// A session minted for this request is returned even when the vote is
/// rejected, so the client keeps the same identity on retry.
pub async fn cast_vote(
    voter: Voter,
    State(state): State<AppState>,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Response {
    let mut response = match submit_vote(&voter, &state, body).await {
        Ok(totals) => Json(TotalsResponse::from(totals)).into_response(),
        Err(e) => e.into_response(),
    };
    voter.attach_cookie(&mut response);
    response
}

async fn submit_vote(
    voter: &Voter,
    state: &AppState,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Totals, AppError> {
    let limiter = state.limiter.clone();
    let identity = voter.identity.clone();
    let allowed = tokio::task::spawn_blocking(move || limiter.may_vote(&identity)).await??;
    if !allowed {
        let limit = state.limiter.daily_limit();
        log_rate_limited(voter, limit);
        return Err(CoreError::RateLimitExceeded { limit }.into());
    }

    let Json(request) = body.map_err(|e| {
        tracing::debug!("Rejected vote body: {e}");
        AppError::BadRequest("Invalid vote type.".to_string())
    })?;
    let vote_type: VoteType = request.vote_type.as_deref().unwrap_or_default().parse()?;

    let limiter = state.limiter.clone();
    let identity = voter.identity.clone();
    let outcome = tokio::task::spawn_blocking(move || limiter.cast(&identity, vote_type)).await?;

    match &outcome {
        Ok(totals) => tracing::info!(
            "Accepted {vote_type} (upvotes={}, downvotes={})",
            totals.upvotes,
            totals.downvotes
        ),
        Err(CoreError::RateLimitExceeded { limit }) => log_rate_limited(voter, *limit),
        Err(_) => {}
    }

    Ok(outcome?)
}

fn log_rate_limited(voter: &Voter, limit: u32) {
    tracing::warn!("Vote rejected for {}: daily limit of {limit} reached", voter.identity);
}

/// `GET /api/totals`: current counts as JSON.
pub async fn totals(State(state): State<AppState>) -> Result<Json<TotalsResponse>, AppError> {
    let totals = crate::pages::read_totals(&state).await?;
    Ok(Json(totals.into()))
}

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use rust_embed::Embed;
use tally_core::Totals;

use crate::error::AppError;
use crate::state::AppState;

const TEMPLATE: &str = "index.html";

#[derive(Embed)]
#[folder = "web/"]
struct Assets;

/// Reads the tally off the async runtime. A missing tally row is reported
/// in the log and rendered as zeros.
pub async fn read_totals(state: &AppState) -> Result<Totals, AppError> {
    let store = state.store.clone();
    let read = tokio::task::spawn_blocking(move || store.get_totals()).await??;
    if let Some(warning) = read.warning {
        tracing::warn!("Data integrity warning: {warning}");
    }
    Ok(read.totals)
}

pub fn render_index(template: &str, totals: Totals, daily_limit: u32) -> String {
    template
        .replace("{{upvotes}}", &totals.upvotes.to_string())
        .replace("{{downvotes}}", &totals.downvotes.to_string())
        .replace("{{daily_limit}}", &daily_limit.to_string())
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let totals = read_totals(&state).await?;
    let content = Assets::get(TEMPLATE)
        .ok_or_else(|| AppError::Internal("index template missing from build".to_string()))?;
    let template = String::from_utf8_lossy(&content.data);
    Ok(Html(render_index(&template, totals, state.config.voting.daily_limit)))
}

/// Serves the page's script and stylesheet.
pub async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    if path == TEMPLATE {
        return StatusCode::NOT_FOUND.into_response();
    }

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

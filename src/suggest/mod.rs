use crate::state::AppState;
use axum::{routing::post, Router};

pub mod client;
pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new().route("/suggest", post(handlers::suggest_messages))
}

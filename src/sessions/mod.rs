mod handlers;
mod ws;

use axum::{Router, routing::{get, post}};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(handlers::create))
        .route(
            "/sessions/{code}",
            get(handlers::fetch)
                .patch(handlers::update)
                .delete(handlers::remove),
        )
        .route("/sessions/{code}/ws", get(ws::session_ws))
}

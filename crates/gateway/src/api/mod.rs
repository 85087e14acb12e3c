pub mod ask;
pub mod health;
pub mod tools;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ask", post(ask::ask_endpoint))
        .route("/ask/stream", post(ask::ask_stream_endpoint))
        .route("/tools", get(tools::list).post(tools::create))
        .route("/tools/:id", get(tools::get_by_id).put(tools::update).delete(tools::delete))
        .route("/tools/name/:name", get(tools::get_by_name))
        .route("/tools/:id/execute", post(tools::execute))
        .route("/tools/search/:query", get(tools::search))
        .route("/tools/:id/clear-bugs", post(tools::clear_bugs))
        .route("/tools/:id/deactivate", post(tools::deactivate))
        .route("/tools/bugged/list", get(tools::bugged_list))
        .with_state(state)
}

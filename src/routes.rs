use crate::state::AppState;
use axum::Router;

mod room;

pub fn create_routes(state: AppState) -> Router {
    Router::new().nest("/api/room", room::routes(state))
}

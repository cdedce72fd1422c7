pub mod handlers;
pub mod presenter;
pub mod scene;
pub mod surface;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}

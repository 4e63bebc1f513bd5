use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod cookie;
pub mod credentials;
pub mod dto;
pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;

/// Public auth endpoints plus the gated session endpoints.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::session_routes(state.clone()))
}

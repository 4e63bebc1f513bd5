use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        cookie::{clear_session_cookie, session_cookie},
        dto::{LoginRequest, MessageResponse, PublicUser, RegisterRequest},
        errors::AuthError,
        extractors::{require_auth, AuthUser, JsonBody},
        services,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Registration successful")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let res = services::login(&state, payload).await?;
    let cookie = session_cookie(&res.token, state.keys.ttl(), state.config.cookie_secure)?;
    Ok(([cookie], Json(res)))
}

/// Clears the cookie only. The token itself stays valid until it expires.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    info!(user_id = %user.id, "user logged out");
    (
        [clear_session_cookie(state.config.cookie_secure)],
        Json(MessageResponse::new("Logged out")),
    )
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(services::profile(&state, &user).await?))
}

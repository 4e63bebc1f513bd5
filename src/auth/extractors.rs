use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{
        cookie::{read_cookie, SESSION_COOKIE},
        errors::AuthError,
        jwt::JwtKeys,
        repo_types::Role,
    },
    state::AppState,
};

/// Identity established by the access-control gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Picks the session token from the `token` cookie, falling back to
/// `Authorization: Bearer`, and verifies it. Any failure is `Unauthenticated`.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, AuthError> {
    let token = read_cookie(headers, SESSION_COOKIE)
        .or_else(|| bearer_token(headers))
        .ok_or(AuthError::Unauthenticated)?;

    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AuthError::Unauthenticated
    })?;

    Ok(AuthUser {
        id: claims.sub,
        role: claims.role,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware guarding protected routers. Rejected requests never reach the
/// handler; accepted ones carry an `AuthUser` in their extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = authenticate(req.headers(), &state.keys)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        authenticate(&parts.headers, &state.keys)
    }
}

/// `Json<T>` whose rejections (bad syntax, missing fields, wrong content
/// type) come back as `Validation` errors with the usual `{message}` body.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                warn!(reason = %rejection.body_text(), "request body rejected");
                Err(AuthError::Validation(rejection.body_text()))
            }
        }
    }
}

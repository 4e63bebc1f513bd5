//! Auth operations: register, login and profile lookup.
//!
//! Each call stands alone; nothing is kept between requests. Handlers add the
//! HTTP concerns (status codes, cookies) on top.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        errors::AuthError,
        extractors::AuthUser,
        repo_types::User,
    },
    state::AppState,
};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;
const PASSWORD_MIN_CHARS: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    allowed_domain: Option<&str>,
) -> Result<(), AuthError> {
    let name_len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&name_len) {
        return Err(AuthError::Validation(format!(
            "Name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"
        )));
    }
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if let Some(domain) = allowed_domain {
        let in_domain = email
            .rsplit_once('@')
            .map(|(_, d)| d == domain)
            .unwrap_or(false);
        if !in_domain {
            return Err(AuthError::Validation(format!(
                "Only @{domain} addresses can register"
            )));
        }
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AuthError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_CHARS} characters"
        )));
    }
    Ok(())
}

/// Creates an account. Login is possible right away; nothing waits on email
/// verification.
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, AuthError> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);
    validate_registration(
        name,
        &email,
        &req.password,
        state.config.allowed_email_domain.as_deref(),
    )
    .inspect_err(|e| warn!(email = %email, reason = %e, "registration rejected"))?;

    // Fast path only. A concurrent registration can still slip past this
    // lookup; the repository's unique constraint decides that race.
    if state.credentials.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let user = state
        .credentials
        .create(name, &email, &req.password)
        .await
        .map_err(AuthError::from)
        .inspect_err(|e| {
            if matches!(e, AuthError::DuplicateEmail) {
                warn!(email = %email, "email registered concurrently");
            }
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Verifies credentials and issues a session token. Unknown email and wrong
/// password produce the same error.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, AuthError> {
    let email = normalize_email(&req.email);

    let Some(user) = state.credentials.find_by_email(&email).await? else {
        // Spend the same hashing work as a wrong password would.
        state.credentials.verify_unknown(&req.password).await?;
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if !state.credentials.verify_password(&user, &req.password).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = state
        .keys
        .issue(user.id, user.role)
        .map_err(|e| AuthError::Internal(e.into()))?;

    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: PublicUser::from(&user),
    })
}

/// Public projection of the authenticated user. `NotFound` if the account
/// vanished after the token was issued.
pub async fn profile(state: &AppState, auth: &AuthUser) -> Result<PublicUser, AuthError> {
    match state.credentials.find_by_id(auth.id).await? {
        Some(user) => Ok(PublicUser::from(&user)),
        None => {
            warn!(user_id = %auth.id, "token subject no longer exists");
            Err(AuthError::NotFound)
        }
    }
}

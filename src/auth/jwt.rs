use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{claims::Claims, repo_types::Role},
    config::{ConfigError, JwtConfig},
};

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, badly signed, foreign or expired. Callers get no detail.
    #[error("invalid or expired token")]
    Invalid,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Token Service: HS256 signing and verification with a process-wide key.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Result<Self, ConfigError> {
        if cfg.secret.trim().is_empty() {
            return Err(ConfigError::MissingSigningKey);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.issue_at(user_id, role, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        role: Role,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            role,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(user_id = %user_id, %role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            TokenError::Invalid
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn keys_with(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        let mut cfg = AppConfig::for_tests().jwt;
        cfg.secret = secret.into();
        cfg.issuer = issuer.into();
        cfg.audience = audience.into();
        JwtKeys::from_config(&cfg).expect("keys")
    }

    fn keys() -> JwtKeys {
        keys_with("dev-secret", "test-issuer", "test-aud")
    }

    fn flip_signature(token: &str) -> String {
        let (head, sig) = token.rsplit_once('.').expect("three segments");
        let mut sig: Vec<char> = sig.chars().collect();
        sig[0] = if sig[0] == 'A' { 'B' } else { 'A' };
        format!("{head}.{}", sig.into_iter().collect::<String>())
    }

    #[test]
    fn issue_then_verify() {
        let keys = keys();
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id, Role::Admin).expect("issue");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn tampered_signature_rejected() {
        let keys = keys();
        let token = keys.issue(Uuid::new_v4(), Role::Member).unwrap();
        let err = keys.verify(&flip_signature(&token)).unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[test]
    fn tampered_payload_rejected() {
        let keys = keys();
        let member = keys.issue(Uuid::new_v4(), Role::Member).unwrap();
        let admin = keys.issue(Uuid::new_v4(), Role::Admin).unwrap();
        let m: Vec<&str> = member.split('.').collect();
        let a: Vec<&str> = admin.split('.').collect();
        let spliced = format!("{}.{}.{}", m[0], a[1], m[2]);
        assert!(matches!(keys.verify(&spliced), Err(TokenError::Invalid)));
    }

    #[test]
    fn expired_token_rejected() {
        let keys = keys();
        let eight_days_ago = OffsetDateTime::now_utc() - Duration::days(8);
        let token = keys.issue_at(Uuid::new_v4(), Role::Member, eight_days_ago).unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn token_near_end_of_window_still_valid() {
        let keys = keys();
        let six_days_ago = OffsetDateTime::now_utc() - Duration::days(6);
        let token = keys.issue_at(Uuid::new_v4(), Role::Member, six_days_ago).unwrap();
        assert!(keys.verify(&token).is_ok());
    }

    #[test]
    fn garbage_and_foreign_tokens_rejected() {
        let keys = keys();
        assert!(matches!(keys.verify(""), Err(TokenError::Invalid)));
        assert!(matches!(keys.verify("not.a.jwt"), Err(TokenError::Invalid)));

        let other_secret = keys_with("other-secret", "test-issuer", "test-aud");
        let token = other_secret.issue(Uuid::new_v4(), Role::Member).unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Invalid)));

        let other_aud = keys_with("dev-secret", "test-issuer", "someone-else");
        let token = other_aud.issue(Uuid::new_v4(), Role::Member).unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn empty_secret_is_config_error() {
        let mut cfg = AppConfig::for_tests().jwt;
        cfg.secret = String::new();
        assert!(matches!(
            JwtKeys::from_config(&cfg),
            Err(ConfigError::MissingSigningKey)
        ));
    }
}

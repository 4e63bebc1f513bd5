use std::{fmt, net::SocketAddr, str::FromStr};

use thiserror::Error;

const DEFAULT_TTL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("no JWT signing key configured (set JWT_SECRET)")]
    MissingSigningKey,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Where user records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    /// Registration is limited to `user@<domain>` when set.
    pub allowed_email_domain: Option<String>,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key/value source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").ok_or(ConfigError::MissingSigningKey)?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "campusfeed".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "campusfeed-users".into()),
            ttl_minutes: parse_var("JWT_TTL_MINUTES", var("JWT_TTL_MINUTES"), DEFAULT_TTL_MINUTES)?,
        };
        if jwt.ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_MINUTES",
                value: jwt.ttl_minutes.to_string(),
            });
        }

        let storage = match var("STORAGE").map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("postgres") => StorageConfig::Postgres {
                database_url: var("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?,
            },
            Some("memory") => StorageConfig::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE",
                    value: other.to_string(),
                })
            }
        };

        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("APP_PORT").unwrap_or_else(|| "8080".into());
        let bind_addr = format!("{}:{}", host.trim(), port.trim())
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: "APP_HOST/APP_PORT",
                value: format!("{host}:{port}"),
            })?;

        let allowed_email_domain = var("ALLOWED_EMAIL_DOMAIN")
            .map(|d| d.trim().trim_start_matches('@').to_lowercase());

        let cookie_secure = match var("COOKIE_SECURE") {
            None => false,
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                name: "COOKIE_SECURE",
                value: v,
            })?,
        };

        Ok(Self {
            bind_addr,
            storage,
            jwt,
            allowed_email_domain,
            cookie_secure,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            storage: StorageConfig::Memory,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: DEFAULT_TTL_MINUTES,
            },
            allowed_email_domain: None,
            cookie_secure: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn missing_secret_is_fatal() {
        let err = load(&[("STORAGE", "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSigningKey));

        let err = load(&[("STORAGE", "memory"), ("JWT_SECRET", "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSigningKey));
    }

    #[test]
    fn defaults_give_seven_day_tokens() {
        let cfg = load(&[("STORAGE", "memory"), ("JWT_SECRET", "s")]).expect("config");
        assert_eq!(cfg.jwt.ttl_minutes, 7 * 24 * 60);
        assert_eq!(cfg.jwt.issuer, "campusfeed");
        assert_eq!(cfg.storage, StorageConfig::Memory);
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert!(cfg.allowed_email_domain.is_none());
        assert!(!cfg.cookie_secure);
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = load(&[("JWT_SECRET", "s")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DATABASE_URL")));

        let cfg = load(&[("JWT_SECRET", "s"), ("DATABASE_URL", "postgres://x/y")]).expect("config");
        assert_eq!(
            cfg.storage,
            StorageConfig::Postgres {
                database_url: "postgres://x/y".into()
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        let base = [("STORAGE", "memory"), ("JWT_SECRET", "s")];

        let mut pairs = base.to_vec();
        pairs.push(("JWT_TTL_MINUTES", "soon"));
        assert!(matches!(load(&pairs), Err(ConfigError::Invalid { name: "JWT_TTL_MINUTES", .. })));

        let mut pairs = base.to_vec();
        pairs.push(("JWT_TTL_MINUTES", "0"));
        assert!(load(&pairs).is_err());

        let mut pairs = base.to_vec();
        pairs.push(("COOKIE_SECURE", "maybe"));
        assert!(matches!(load(&pairs), Err(ConfigError::Invalid { name: "COOKIE_SECURE", .. })));

        let pairs = [("STORAGE", "redis"), ("JWT_SECRET", "s")];
        assert!(matches!(load(&pairs), Err(ConfigError::Invalid { name: "STORAGE", .. })));
    }

    #[test]
    fn normalizes_email_domain() {
        let cfg = load(&[
            ("STORAGE", "memory"),
            ("JWT_SECRET", "s"),
            ("ALLOWED_EMAIL_DOMAIN", " @School.EDU "),
            ("COOKIE_SECURE", "true"),
        ])
        .expect("config");
        assert_eq!(cfg.allowed_email_domain.as_deref(), Some("school.edu"));
        assert!(cfg.cookie_secure);
    }

    #[test]
    fn debug_output_hides_secret() {
        let cfg = AppConfig::for_tests();
        let printed = format!("{:?}", cfg.jwt);
        assert!(!printed.contains("test-secret"));
    }
}

use std::sync::Arc;

use anyhow::Context;

use crate::{
    auth::{
        credentials::CredentialStore,
        jwt::JwtKeys,
        memory::MemoryUserRepo,
        repo::{PgUserRepo, UserRepo},
    },
    config::{AppConfig, StorageConfig},
    db,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub credentials: CredentialStore,
}

impl AppState {
    /// Connects storage and builds the signing keys. Any failure here is
    /// fatal for the process.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let repo: Arc<dyn UserRepo> = match &config.storage {
            StorageConfig::Postgres { database_url } => {
                let pool = db::connect(database_url).await?;
                db::migrate(&pool).await?;
                Arc::new(PgUserRepo::new(pool))
            }
            StorageConfig::Memory => {
                tracing::warn!("using in-memory user storage; accounts are lost on restart");
                Arc::new(MemoryUserRepo::new())
            }
        };
        let credentials = CredentialStore::new(repo)?;
        Self::from_parts(config, credentials).context("build application state")
    }

    pub fn from_parts(
        config: AppConfig,
        credentials: CredentialStore,
    ) -> Result<Self, crate::config::ConfigError> {
        let keys = Arc::new(JwtKeys::from_config(&config.jwt)?);
        Ok(Self {
            config: Arc::new(config),
            keys,
            credentials,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(AppConfig::for_tests())
    }

    #[cfg(test)]
    pub fn fake_with(config: AppConfig) -> Self {
        Self::fake_with_repo(config, Arc::new(MemoryUserRepo::new()))
    }

    #[cfg(test)]
    pub fn fake_with_repo(config: AppConfig, repo: Arc<dyn UserRepo>) -> Self {
        Self::from_parts(config, CredentialStore::with_low_cost(repo)).expect("test config is valid")
    }
}

use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::{
    repo::{RepoError, UserRepo},
    repo_types::{NewUser, Role, User},
};

/// Credential Store: user records plus one-way password handling.
///
/// Hashing uses Argon2id with the crate's default cost, which lands in the
/// tens-to-hundreds of milliseconds on commodity hardware. Both hashing and
/// verification run on tokio's blocking pool.
///
/// Logins for unknown emails are checked against `decoy_hash`, produced with
/// the same parameters as real hashes, so both login failures cost one full
/// verification.
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn UserRepo>,
    hasher: Argon2<'static>,
    decoy_hash: Arc<str>,
    #[cfg(test)]
    verifications: Arc<AtomicUsize>,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn UserRepo>) -> anyhow::Result<Self> {
        Self::with_hasher(repo, Argon2::default())
    }

    /// Cheap Argon2 parameters so test suites don't spend seconds hashing.
    #[cfg(test)]
    pub fn with_low_cost(repo: Arc<dyn UserRepo>) -> Self {
        let params = argon2::Params::new(1024, 1, 1, None).expect("valid argon2 params");
        let hasher = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        Self::with_hasher(repo, hasher).expect("decoy hash")
    }

    fn with_hasher(repo: Arc<dyn UserRepo>, hasher: Argon2<'static>) -> anyhow::Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let decoy_hash = hasher
            .hash_password(b"decoy-password-never-assigned", &salt)
            .map_err(|e| anyhow::anyhow!("decoy hash failed: {e}"))?
            .to_string();
        Ok(Self {
            repo,
            hasher,
            decoy_hash: decoy_hash.into(),
            #[cfg(test)]
            verifications: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of Argon2 verifications run so far.
    #[cfg(test)]
    pub fn verification_count(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }

    /// Hashes `raw_password` and inserts the user with the default role.
    /// Fails with `RepoError::DuplicateEmail` if the email is taken, including
    /// when another registration for it commits first.
    pub async fn create(&self, name: &str, email: &str, raw_password: &str) -> Result<User, RepoError> {
        let hasher = self.hasher.clone();
        let plain = raw_password.to_owned();
        let password_hash = blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            hasher
                .hash_password(plain.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| {
                    error!(error = %e, "argon2 hash_password error");
                    anyhow::anyhow!("password hashing failed: {e}")
                })
        })
        .await?;

        let user = self
            .repo
            .insert(NewUser {
                name: name.to_owned(),
                email: email.to_owned(),
                password_hash,
                role: Role::default(),
            })
            .await?;
        debug!(user_id = %user.id, "credentials stored");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.repo.find_by_email(email).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        self.repo.find_by_id(id).await
    }

    pub async fn ping(&self) -> Result<(), RepoError> {
        self.repo.ping().await
    }

    /// `Ok(false)` on mismatch. A stored hash that cannot be parsed is an
    /// error, never a silent mismatch.
    pub async fn verify_password(&self, user: &User, raw_password: &str) -> anyhow::Result<bool> {
        self.verify_against(user.password_hash.clone(), raw_password).await
    }

    /// Burns one verification for an email with no account. The result is
    /// discarded; callers reject the login either way.
    pub async fn verify_unknown(&self, raw_password: &str) -> anyhow::Result<()> {
        self.verify_against(self.decoy_hash.to_string(), raw_password)
            .await
            .map(|_| ())
    }

    async fn verify_against(&self, stored: String, raw_password: &str) -> anyhow::Result<bool> {
        #[cfg(test)]
        self.verifications.fetch_add(1, Ordering::SeqCst);
        let hasher = self.hasher.clone();
        let plain = raw_password.to_owned();
        blocking(move || {
            let parsed = PasswordHash::new(&stored).map_err(|e| {
                error!(error = %e, "argon2 parse hash error");
                anyhow::anyhow!("stored password hash is malformed: {e}")
            })?;
            Ok(hasher.verify_password(plain.as_bytes(), &parsed).is_ok())
        })
        .await
    }
}

async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("password worker task failed")?
}

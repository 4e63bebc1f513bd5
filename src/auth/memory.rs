use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{RepoError, UserRepo},
    repo_types::{NewUser, User},
};

#[derive(Default)]
struct Tables {
    by_id: HashMap<Uuid, User>,
    email_index: HashMap<String, Uuid>,
}

/// In-process user repository for tests and `STORAGE=memory` runs.
/// Check and insert happen under one write lock.
#[derive(Default)]
pub struct MemoryUserRepo {
    tables: RwLock<Tables>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.tables.read().await.by_id.len()
    }

    #[cfg(test)]
    pub async fn remove(&self, id: Uuid) {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.by_id.remove(&id) {
            tables.email_index.remove(&user.email);
        }
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn insert(&self, new: NewUser) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.email_index.contains_key(&new.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.email_index.insert(user.email.clone(), user.id);
        tables.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.tables.read().await.by_id.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use std::sync::Arc;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::Member,
        }
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let repo = MemoryUserRepo::new();
        let user = repo.insert(new_user("a@school.edu")).await.unwrap();

        let by_email = repo.find_by_email("a@school.edu").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_id = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "a@school.edu");
        assert!(repo.find_by_email("b@school.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let repo = MemoryUserRepo::new();
        repo.insert(new_user("a@school.edu")).await.unwrap();
        let err = repo.insert(new_user("a@school.edu")).await.unwrap_err();
        assert!(matches!(err, RepoError::DuplicateEmail));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_inserts_leave_one_record() {
        let repo = Arc::new(MemoryUserRepo::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.insert(new_user("race@school.edu")).await })
            })
            .collect();

        let mut wins = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => wins += 1,
                Err(RepoError::DuplicateEmail) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(repo.len().await, 1);
    }
}

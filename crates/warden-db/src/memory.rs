//! In-memory account repository
//!
//! Backed by sharded concurrent maps. The compare-and-swap holds the shard
//! write lock for the account across the compare and the write.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::AccountRow;
use crate::repo::{AccountRepository, CreateAccount};

/// In-memory account repository
#[derive(Default, Clone)]
pub struct MemoryAccountRepository {
    accounts: Arc<DashMap<Uuid, AccountRow>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>> {
        Ok(self.accounts.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<AccountRow>> {
        let email = warden_types::normalize_email(email);
        let Some(id) = self.by_email.get(&email).map(|r| *r.value()) else {
            return Ok(None);
        };
        Ok(self.accounts.get(&id).map(|r| r.value().clone()))
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        let email = warden_types::normalize_email(&account.email);
        match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => Err(DbError::Conflict("accounts_email_key".to_string())),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let row = AccountRow {
                    id: account.id,
                    email,
                    password_digest: account.password_digest,
                    refresh_digest: None,
                    refresh_jti: None,
                    created_at: now,
                    updated_at: now,
                };
                self.accounts.insert(row.id, row.clone());
                slot.insert(row.id);
                Ok(row)
            }
        }
    }

    async fn set_refresh_state(&self, id: Uuid, digest: &str, jti: &str) -> DbResult<()> {
        let mut account = self.accounts.get_mut(&id).ok_or(DbError::NotFound)?;
        account.refresh_digest = Some(digest.to_string());
        account.refresh_jti = Some(jti.to_string());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_refresh_state(&self, id: Uuid) -> DbResult<()> {
        if let Some(mut account) = self.accounts.get_mut(&id) {
            account.refresh_digest = None;
            account.refresh_jti = None;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn rotate_refresh_if_matches(
        &self,
        id: Uuid,
        expected_digest: &str,
        expected_jti: &str,
        next_digest: &str,
        next_jti: &str,
    ) -> DbResult<bool> {
        let Some(mut account) = self.accounts.get_mut(&id) else {
            return Ok(false);
        };
        if account.refresh_state() != Some((expected_digest, expected_jti)) {
            return Ok(false);
        }
        account.refresh_digest = Some(next_digest.to_string());
        account.refresh_jti = Some(next_jti.to_string());
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_all(&self) -> DbResult<Vec<AccountRow>> {
        let mut accounts: Vec<AccountRow> =
            self.accounts.iter().map(|r| r.value().clone()).collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(email: &str) -> CreateAccount {
        CreateAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_digest: "digest".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_email() {
        let repo = MemoryAccountRepository::new();
        let row = repo.create(new_account(" Alice@Example.com ")).await.unwrap();
        assert_eq!(row.email, "alice@example.com");
        assert!(row.refresh_state().is_none());

        let found = repo.find_by_email("ALICE@example.com").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(row.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = MemoryAccountRepository::new();
        repo.create(new_account("bob@example.com")).await.unwrap();
        let err = repo.create(new_account("BOB@example.com")).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_set_refresh_state_missing_account() {
        let repo = MemoryAccountRepository::new();
        let err = repo
            .set_refresh_state(Uuid::new_v4(), "d", "j")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_rotate_requires_matching_pair() {
        let repo = MemoryAccountRepository::new();
        let row = repo.create(new_account("carol@example.com")).await.unwrap();

        // no refresh state yet
        assert!(!repo
            .rotate_refresh_if_matches(row.id, "d1", "j1", "d2", "j2")
            .await
            .unwrap());

        repo.set_refresh_state(row.id, "d1", "j1").await.unwrap();

        // digest matches, jti does not
        assert!(!repo
            .rotate_refresh_if_matches(row.id, "d1", "other", "d2", "j2")
            .await
            .unwrap());

        assert!(repo
            .rotate_refresh_if_matches(row.id, "d1", "j1", "d2", "j2")
            .await
            .unwrap());

        // the old pair is gone
        assert!(!repo
            .rotate_refresh_if_matches(row.id, "d1", "j1", "d3", "j3")
            .await
            .unwrap());

        let stored = repo.find_by_id(row.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_state(), Some(("d2", "j2")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_single_winner() {
        let repo = MemoryAccountRepository::new();
        let row = repo.create(new_account("dave@example.com")).await.unwrap();
        repo.set_refresh_state(row.id, "d0", "j0").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.rotate_refresh_if_matches(
                    row.id,
                    "d0",
                    "j0",
                    &format!("d{}", i + 1),
                    &format!("j{}", i + 1),
                )
                .await
                .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_clear_refresh_state() {
        let repo = MemoryAccountRepository::new();
        let row = repo.create(new_account("erin@example.com")).await.unwrap();
        repo.set_refresh_state(row.id, "d", "j").await.unwrap();
        repo.clear_refresh_state(row.id).await.unwrap();

        let stored = repo.find_by_id(row.id).await.unwrap().unwrap();
        assert!(stored.refresh_digest.is_none());
        assert!(stored.refresh_jti.is_none());
    }

    #[tokio::test]
    async fn test_list_all_ordered_and_public() {
        let repo = MemoryAccountRepository::new();
        let first = repo.create(new_account("first@example.com")).await.unwrap();
        let second = repo.create(new_account("second@example.com")).await.unwrap();

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at <= all[1].created_at);
        let ids: Vec<_> = all.iter().map(|a| a.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&second.id));

        let public = all[0].to_public();
        assert_eq!(public.id.0, all[0].id);
    }
}

//! PostgreSQL account repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::AccountRow;
use crate::repo::{AccountRepository, CreateAccount};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id              UUID PRIMARY KEY,
        email           TEXT NOT NULL,
        password_digest TEXT NOT NULL,
        refresh_digest  TEXT,
        refresh_jti     TEXT,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT accounts_refresh_pair CHECK (
            (refresh_digest IS NULL) = (refresh_jti IS NULL)
        )
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_key ON accounts (email)",
];

/// PostgreSQL account repository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `accounts` table and its unique email index if missing
    pub async fn migrate(&self) -> DbResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("accounts schema ready");
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<AccountRow>> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_digest, refresh_digest, refresh_jti,
                   created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<AccountRow>> {
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_digest, refresh_digest, refresh_jti,
                   created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(warden_types::normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create(&self, account: CreateAccount) -> DbResult<AccountRow> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, email, password_digest)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_digest, refresh_digest, refresh_jti,
                      created_at, updated_at
            "#,
        )
        .bind(account.id)
        .bind(warden_types::normalize_email(&account.email))
        .bind(&account.password_digest)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from_write)?;

        Ok(row)
    }

    async fn set_refresh_state(&self, id: Uuid, digest: &str, jti: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_digest = $2, refresh_jti = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(digest)
        .bind(jti)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn clear_refresh_state(&self, id: Uuid) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_digest = NULL, refresh_jti = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

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
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_digest = $4, refresh_jti = $5, updated_at = NOW()
            WHERE id = $1 AND refresh_digest = $2 AND refresh_jti = $3
            "#,
        )
        .bind(id)
        .bind(expected_digest)
        .bind(expected_jti)
        .bind(next_digest)
        .bind(next_jti)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_all(&self) -> DbResult<Vec<AccountRow>> {
        let accounts = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_digest, refresh_digest, refresh_jti,
                   created_at, updated_at
            FROM accounts
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }
}

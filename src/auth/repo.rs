use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

use crate::auth::repo_types::{Account, AccountRow, ApprovalState, NewAccount};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique key conflict")]
    Conflict,
    #[error("storage unavailable: {0}")]
    Unavailable(anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict;
            }
        }
        StoreError::Unavailable(e.into())
    }
}

/// Persistence for accounts. Every method is a single atomic read or write
/// against one account record.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, new: NewAccount) -> Result<Account, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Writes code and expiry together, replacing any previous pair.
    async fn set_reset_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Clears the pair if it still holds `code`; a newer code is left alone.
    async fn release_reset_code(&self, id: Uuid, code: &str) -> Result<bool, StoreError>;

    /// Swaps in `password_hash` and clears the reset pair, but only while the
    /// stored code still equals `code` and has not expired at `now`.
    /// Returns `false` when nothing matched.
    async fn consume_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<bool, StoreError>;

    /// Sets the approval state, stamping `rejected_at` on the first rejection
    /// and clearing it on approval.
    async fn set_approval(
        &self,
        id: Uuid,
        state: ApprovalState,
        now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_account(row: AccountRow) -> Result<Account, StoreError> {
    Account::try_from(row).map_err(|e| {
        error!(error = %e, "malformed account row");
        StoreError::Unavailable(e)
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, new: NewAccount) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts
                (id, email, password_hash, role, approval_state,
                 company_name, company_address, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, email, password_hash, role, approval_state,
                      company_name, company_address, phone,
                      reset_code, reset_code_expires_at, rejected_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(new.approval_state().as_str())
        .bind(&new.company_name)
        .bind(&new.company_address)
        .bind(&new.phone)
        .fetch_one(&self.db)
        .await?;
        into_account(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, role, approval_state,
                   company_name, company_address, phone,
                   reset_code, reset_code_expires_at, rejected_at, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_account).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, email, password_hash, role, approval_state,
                   company_name, company_address, phone,
                   reset_code, reset_code_expires_at, rejected_at, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_account).transpose()
    }

    async fn set_reset_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
               SET reset_code = $2, reset_code_expires_at = $3
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn release_reset_code(&self, id: Uuid, code: &str) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE accounts
               SET reset_code = NULL, reset_code_expires_at = NULL
             WHERE id = $1 AND reset_code = $2
            "#,
        )
        .bind(id)
        .bind(code)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn consume_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE accounts
               SET password_hash = $4, reset_code = NULL, reset_code_expires_at = NULL
             WHERE id = $1
               AND reset_code = $2
               AND reset_code_expires_at > $3
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(now)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_approval(
        &self,
        id: Uuid,
        state: ApprovalState,
        now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE accounts
               SET approval_state = $2,
                   rejected_at = CASE WHEN $2 = 'REJECTED'
                                      THEN COALESCE(rejected_at, $3)
                                      ELSE NULL END
             WHERE id = $1
            RETURNING id, email, password_hash, role, approval_state,
                      company_name, company_address, phone,
                      reset_code, reset_code_expires_at, rejected_at, created_at
            "#,
        )
        .bind(id)
        .bind(state.as_str())
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_account).transpose()
    }
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
}

/// Process-local store. Each call takes the lock once, so every method is as
/// atomic as the single statement it mirrors in [`PgAccountStore`].
#[derive(Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<Accounts>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut guard = self.inner.write().await;
        if guard.by_email.contains_key(&new.email) {
            return Err(StoreError::Conflict);
        }
        let account = Account {
            id: Uuid::new_v4(),
            approval_state: new.approval_state(),
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            company_name: new.company_name,
            company_address: new.company_address,
            phone: new.phone,
            reset_code: None,
            reset_code_expires_at: None,
            rejected_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        guard.by_email.insert(account.email.clone(), account.id);
        guard.by_id.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .by_email
            .get(email)
            .and_then(|id| guard.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn set_reset_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        if let Some(account) = self.inner.write().await.by_id.get_mut(&id) {
            account.reset_code = Some(code.to_string());
            account.reset_code_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn release_reset_code(&self, id: Uuid, code: &str) -> Result<bool, StoreError> {
        let mut guard = self.inner.write().await;
        match guard.by_id.get_mut(&id) {
            Some(account) if account.reset_code.as_deref() == Some(code) => {
                account.reset_code = None;
                account.reset_code_expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut guard = self.inner.write().await;
        let Some(account) = guard.by_id.get_mut(&id) else {
            return Ok(false);
        };
        let live = account.reset_code.as_deref() == Some(code)
            && account.reset_code_expires_at.is_some_and(|exp| now < exp);
        if !live {
            return Ok(false);
        }
        account.password_hash = password_hash.to_string();
        account.reset_code = None;
        account.reset_code_expires_at = None;
        Ok(true)
    }

    async fn set_approval(
        &self,
        id: Uuid,
        state: ApprovalState,
        now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError> {
        let mut guard = self.inner.write().await;
        let Some(account) = guard.by_id.get_mut(&id) else {
            return Ok(None);
        };
        account.approval_state = state;
        account.rejected_at = match state {
            ApprovalState::Rejected => account.rejected_at.or(Some(now)),
            _ => None,
        };
        Ok(Some(account.clone()))
    }
}

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use keygate_auth::account::{Account, CredentialSource, LockState, PasswordRecord};
use keygate_auth::security::{self, LockoutPolicy};
use keygate_auth::store::AccountStore;
use keygate_core::{AccountId, DomainError, DomainId, DomainResult};

use super::{block_on, decode_err, map_err};

const SELECT_ACCOUNT: &str = r#"
    SELECT id, domain, username, password, source, is_admin, expired, needs_reset,
           failed_attempts, locked_until, last_login_at, created_at
    FROM accounts
"#;

/// Accounts table adapter. Failure counting runs under a row lock.
#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, account: &Account) -> DomainResult<()> {
        block_on(async {
            sqlx::query(
                r#"
                INSERT INTO accounts (
                    id, domain, username, password, source, is_admin, expired, needs_reset,
                    failed_attempts, locked_until, last_login_at, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(*account.id.as_uuid())
            .bind(*account.domain.as_uuid())
            .bind(&account.username)
            .bind(Json(&account.password))
            .bind(Json(&account.source))
            .bind(account.is_admin)
            .bind(account.expired)
            .bind(account.needs_reset)
            .bind(i64::from(account.lock.failed_attempts))
            .bind(account.lock.locked_until)
            .bind(account.last_login_at)
            .bind(account.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_err)
        })??;
        Ok(())
    }

    /// Run an update that must touch exactly one account row.
    fn execute(&self, query: Query<'_>) -> DomainResult<()> {
        let result = block_on(async { query.execute(&self.pool).await.map_err(map_err) })??;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

type Query<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn account_from_row(row: &PgRow) -> DomainResult<Account> {
    let failed_attempts: i64 = row.try_get("failed_attempts").map_err(decode_err)?;
    let Json(password): Json<PasswordRecord> = row.try_get("password").map_err(decode_err)?;
    let Json(source): Json<CredentialSource> = row.try_get("source").map_err(decode_err)?;

    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id").map_err(decode_err)?),
        domain: DomainId::from_uuid(row.try_get("domain").map_err(decode_err)?),
        username: row.try_get("username").map_err(decode_err)?,
        password,
        source,
        is_admin: row.try_get("is_admin").map_err(decode_err)?,
        expired: row.try_get("expired").map_err(decode_err)?,
        needs_reset: row.try_get("needs_reset").map_err(decode_err)?,
        lock: LockState {
            failed_attempts: u32::try_from(failed_attempts).map_err(decode_err)?,
            locked_until: row.try_get("locked_until").map_err(decode_err)?,
        },
        last_login_at: row.try_get("last_login_at").map_err(decode_err)?,
        created_at: row.try_get("created_at").map_err(decode_err)?,
    })
}

impl AccountStore for PostgresAccountStore {
    fn describe_account(&self, domain: DomainId, username: &str) -> DomainResult<Account> {
        let sql = format!("{SELECT_ACCOUNT} WHERE domain = $1 AND username = $2");
        let row = block_on(async {
            sqlx::query(&sql)
                .bind(*domain.as_uuid())
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        })??;
        account_from_row(&row)
    }

    fn describe_account_by_id(&self, id: AccountId) -> DomainResult<Account> {
        let sql = format!("{SELECT_ACCOUNT} WHERE id = $1");
        let row = block_on(async {
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        })??;
        account_from_row(&row)
    }

    fn update_lock_state(&self, id: AccountId, state: LockState) -> DomainResult<()> {
        self.execute(
            sqlx::query("UPDATE accounts SET failed_attempts = $1, locked_until = $2 WHERE id = $3")
                .bind(i64::from(state.failed_attempts))
                .bind(state.locked_until)
                .bind(*id.as_uuid()),
        )
    }

    fn record_login_failure(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
        lockout: &LockoutPolicy,
    ) -> DomainResult<LockState> {
        let lockout = *lockout;
        block_on(async move {
            let mut tx = self.pool.begin().await.map_err(map_err)?;

            let row = sqlx::query(
                "SELECT failed_attempts, locked_until FROM accounts WHERE id = $1 FOR UPDATE",
            )
            .bind(*id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_err)?;

            let failed_attempts: i64 = row.try_get("failed_attempts").map_err(decode_err)?;
            let current = LockState {
                failed_attempts: u32::try_from(failed_attempts).map_err(decode_err)?,
                locked_until: row.try_get("locked_until").map_err(decode_err)?,
            };
            let next = lockout.apply_failure(&current, now);

            sqlx::query("UPDATE accounts SET failed_attempts = $1, locked_until = $2 WHERE id = $3")
                .bind(i64::from(next.failed_attempts))
                .bind(next.locked_until)
                .bind(*id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;

            tx.commit().await.map_err(map_err)?;
            Ok::<_, DomainError>(next)
        })?
    }

    fn update_login_time(&self, id: AccountId, at: DateTime<Utc>) -> DomainResult<()> {
        self.execute(
            sqlx::query("UPDATE accounts SET last_login_at = $1 WHERE id = $2")
                .bind(at)
                .bind(*id.as_uuid()),
        )
    }

    fn record_login_success(&self, id: AccountId, at: DateTime<Utc>) -> DomainResult<()> {
        let cleared = security::after_success();
        self.execute(
            sqlx::query(
                "UPDATE accounts SET failed_attempts = $1, locked_until = $2, last_login_at = $3 WHERE id = $4",
            )
            .bind(i64::from(cleared.failed_attempts))
            .bind(cleared.locked_until)
            .bind(at)
            .bind(*id.as_uuid()),
        )
    }

    fn mark_password_expired(&self, id: AccountId) -> DomainResult<()> {
        self.execute(sqlx::query("UPDATE accounts SET expired = TRUE WHERE id = $1").bind(*id.as_uuid()))
    }

    fn update_password(&self, id: AccountId, record: PasswordRecord) -> DomainResult<()> {
        self.execute(
            sqlx::query(
                "UPDATE accounts SET password = $1, expired = FALSE, needs_reset = FALSE WHERE id = $2",
            )
            .bind(Json(record))
            .bind(*id.as_uuid()),
        )
    }
}

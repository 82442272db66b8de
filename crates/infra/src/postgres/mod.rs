//! Postgres-backed adapters (feature `postgres`).
//!
//! The collaborator traits are synchronous, so each call runs its query on
//! the current Tokio runtime via `block_in_place`. Callers must therefore be
//! on a multi-threaded runtime.
//!
//! ## Error Mapping
//!
//! | SQLx error | DomainError |
//! |------------|-------------|
//! | `RowNotFound` | `NotFound` |
//! | unique violation (`23505`) | `Conflict` |
//! | anything else | `Unavailable` |

mod accounts;
mod settings;
mod tokens;

pub use accounts::PostgresAccountStore;
pub use settings::PostgresSettingStore;
pub use tokens::PostgresTokenStore;

use std::future::Future;

use sqlx::PgPool;

use keygate_core::{DomainError, DomainResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id              UUID PRIMARY KEY,
    domain          UUID NOT NULL,
    username        TEXT NOT NULL,
    password        JSONB NOT NULL,
    source          JSONB NOT NULL,
    is_admin        BOOLEAN NOT NULL DEFAULT FALSE,
    expired         BOOLEAN NOT NULL DEFAULT FALSE,
    needs_reset     BOOLEAN NOT NULL DEFAULT FALSE,
    failed_attempts BIGINT NOT NULL DEFAULT 0,
    locked_until    TIMESTAMPTZ,
    last_login_at   TIMESTAMPTZ,
    created_at      TIMESTAMPTZ NOT NULL,
    UNIQUE (domain, username)
);

ALTER TABLE accounts ADD COLUMN IF NOT EXISTS is_admin BOOLEAN NOT NULL DEFAULT FALSE;

CREATE TABLE IF NOT EXISTS tokens (
    access_token  TEXT PRIMARY KEY,
    refresh_token TEXT NOT NULL UNIQUE,
    body          JSONB NOT NULL
);

CREATE TABLE IF NOT EXISTS security_settings (
    domain  UUID PRIMARY KEY,
    setting JSONB NOT NULL
);
"#;

/// Create the tables used by the adapters if they do not exist yet.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

pub(crate) fn map_err(e: sqlx::Error) -> DomainError {
    match &e {
        sqlx::Error::RowNotFound => DomainError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            DomainError::conflict(db.message().to_string())
        }
        _ => DomainError::unavailable(e.to_string()),
    }
}

pub(crate) fn decode_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::unavailable(format!("decode: {e}"))
}

/// Run `fut` to completion from synchronous code.
pub(crate) fn block_on<F: Future>(fut: F) -> DomainResult<F::Output> {
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|_| DomainError::unavailable("postgres adapter used outside a tokio runtime"))?;
    Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
}

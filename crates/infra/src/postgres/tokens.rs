use sqlx::types::Json;
use sqlx::{PgPool, Row};

use keygate_auth::Token;
use keygate_auth::store::TokenStore;
use keygate_core::DomainResult;

use super::{block_on, decode_err, map_err};

/// Tokens stored as JSON documents keyed by their access value.
#[derive(Debug, Clone)]
pub struct PostgresTokenStore {
    pool: PgPool,
}

impl PostgresTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn fetch(&self, sql: &'static str, value: &str) -> DomainResult<Token> {
        let row = block_on(async {
            sqlx::query(sql)
                .bind(value)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        })??;
        let Json(token): Json<Token> = row.try_get("body").map_err(decode_err)?;
        Ok(token)
    }
}

impl TokenStore for PostgresTokenStore {
    fn save(&self, token: &Token) -> DomainResult<()> {
        block_on(async {
            sqlx::query("INSERT INTO tokens (access_token, refresh_token, body) VALUES ($1, $2, $3)")
                .bind(&token.access_token)
                .bind(&token.refresh_token)
                .bind(Json(token))
                .execute(&self.pool)
                .await
                .map_err(map_err)
        })??;
        Ok(())
    }

    fn describe_by_access(&self, access_token: &str) -> DomainResult<Token> {
        self.fetch("SELECT body FROM tokens WHERE access_token = $1", access_token)
    }

    fn describe_by_refresh(&self, refresh_token: &str) -> DomainResult<Token> {
        self.fetch("SELECT body FROM tokens WHERE refresh_token = $1", refresh_token)
    }

    // DELETE ... RETURNING makes revoke single-winner under concurrency.
    fn revoke(&self, access_token: &str) -> DomainResult<Token> {
        self.fetch("DELETE FROM tokens WHERE access_token = $1 RETURNING body", access_token)
    }
}

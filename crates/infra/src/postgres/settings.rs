use sqlx::types::Json;
use sqlx::{PgPool, Row};

use keygate_auth::SecuritySetting;
use keygate_auth::store::SecuritySettingStore;
use keygate_core::{DomainId, DomainResult};

use super::{block_on, decode_err, map_err};

#[derive(Debug, Clone)]
pub struct PostgresSettingStore {
    pool: PgPool,
}

impl PostgresSettingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SecuritySettingStore for PostgresSettingStore {
    fn describe_setting(&self, domain: DomainId) -> DomainResult<SecuritySetting> {
        let row = block_on(async {
            sqlx::query("SELECT setting FROM security_settings WHERE domain = $1")
                .bind(*domain.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        })??;
        let Json(setting): Json<SecuritySetting> = row.try_get("setting").map_err(decode_err)?;
        Ok(setting)
    }

    fn save_setting(&self, domain: DomainId, setting: &SecuritySetting) -> DomainResult<()> {
        block_on(async {
            sqlx::query(
                r#"
                INSERT INTO security_settings (domain, setting)
                VALUES ($1, $2)
                ON CONFLICT (domain) DO UPDATE SET setting = EXCLUDED.setting
                "#,
            )
            .bind(*domain.as_uuid())
            .bind(Json(setting))
            .execute(&self.pool)
            .await
            .map_err(map_err)
        })??;
        Ok(())
    }
}

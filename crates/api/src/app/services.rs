//! Service wiring: stores, issuer, setting service, bootstrap data.

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use ipnetwork::IpNetwork;

use keygate_auth::password::check_composition;
use keygate_auth::setting::PasswordPolicy;
use keygate_auth::store::AccountStore;
use keygate_auth::{Account, Application, Argon2Hasher, PasswordHasher, SettingService, TokenIssuer};
use keygate_core::{AccountId, DomainId, DomainResult};
use keygate_infra::{InMemoryStores, SessionQuery};

use crate::config::{ApiConfig, BootstrapAdmin};

/// Lifetime of access tokens issued to the bootstrap application.
const BOOTSTRAP_TOKEN_TTL_SECS: u32 = 3600;

pub struct AppServices {
    pub issuer: Arc<TokenIssuer>,
    pub settings: SettingService,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<dyn SessionQuery>,
    /// Peers allowed to report the client address via `X-Forwarded-For`.
    pub trusted_proxies: Vec<IpNetwork>,
    pub stores: InMemoryStores,
    pub bootstrapped: Option<Bootstrapped>,
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("issuer", &self.issuer)
            .field("bootstrapped", &self.bootstrapped)
            .finish_non_exhaustive()
    }
}

/// What the startup bootstrap created. The plaintext client secret only
/// exists here.
#[derive(Clone)]
pub struct Bootstrapped {
    pub domain: DomainId,
    pub account_id: AccountId,
    pub client_id: String,
    pub client_secret: String,
}

impl core::fmt::Debug for Bootstrapped {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bootstrapped")
            .field("domain", &self.domain)
            .field("account_id", &self.account_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Build services with the production password hasher.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    build_services_with(config, Arc::new(Argon2Hasher::new())).await
}

pub async fn build_services_with(
    config: &ApiConfig,
    hasher: Arc<dyn PasswordHasher>,
) -> anyhow::Result<AppServices> {
    let stores = InMemoryStores::new();
    #[allow(unused_mut)]
    let mut collaborators = stores.collaborators();

    let seed_accounts = stores.accounts.clone();
    #[allow(unused_mut)]
    let mut insert_account: Box<dyn Fn(Account) -> DomainResult<()> + Send + Sync> =
        Box::new(move |account| seed_accounts.insert(account));

    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        use keygate_infra::postgres::{self, PostgresAccountStore, PostgresSettingStore, PostgresTokenStore};

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("connect to postgres")?;
        postgres::migrate(&pool).await.context("migrate postgres schema")?;

        let accounts = PostgresAccountStore::new(pool.clone());
        collaborators.accounts = Arc::new(accounts.clone());
        collaborators.settings = Arc::new(PostgresSettingStore::new(pool.clone()));
        collaborators.tokens = Arc::new(PostgresTokenStore::new(pool));
        insert_account = Box::new(move |account| accounts.insert(&account));
        tracing::info!("using postgres for accounts, tokens and security settings");
    }

    let settings = SettingService::new(collaborators.settings.clone());
    let accounts = collaborators.accounts.clone();
    let issuer = TokenIssuer::new(collaborators, hasher.clone(), config.issuer);

    let bootstrapped = match &config.bootstrap {
        Some(admin) => Some(bootstrap(&stores, admin, hasher.as_ref(), &*insert_account)?),
        None => None,
    };

    Ok(AppServices {
        issuer: Arc::new(issuer),
        settings,
        accounts,
        sessions: stores.sessions.clone(),
        trusted_proxies: config.trusted_proxies.clone(),
        stores,
        bootstrapped,
    })
}

/// Create one domain with an application and an administrator account. The
/// password must satisfy the default password policy of a new domain.
fn bootstrap(
    stores: &InMemoryStores,
    admin: &BootstrapAdmin,
    hasher: &dyn PasswordHasher,
    insert_account: &(dyn Fn(Account) -> DomainResult<()> + Send + Sync),
) -> anyhow::Result<Bootstrapped> {
    if let Some(violation) = check_composition(&admin.password, &PasswordPolicy::default()) {
        anyhow::bail!("bootstrap password {violation}");
    }

    let domain = DomainId::new();
    let (app, client_secret) = Application::register(domain, "admin-console", BOOTSTRAP_TOKEN_TTL_SECS);
    let client_id = app.client_id.clone();
    stores.applications.insert(app).context("register bootstrap application")?;

    let hash = hasher.hash(&admin.password).context("hash bootstrap password")?;
    let mut account = Account::new(domain, admin.username.clone(), hash, Utc::now());
    account.is_admin = true;
    let account_id = account.id;
    insert_account(account).context("create bootstrap account")?;

    tracing::info!(%domain, %account_id, username = %admin.username, "bootstrap domain created");
    Ok(Bootstrapped {
        domain,
        account_id,
        client_id,
        client_secret,
    })
}

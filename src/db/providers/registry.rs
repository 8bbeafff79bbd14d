use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::DatabaseConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbProviderId {
    Postgres,
    Sqlite,
}

impl DbProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            DbProviderId::Postgres => "postgres",
            DbProviderId::Sqlite => "sqlite",
        }
    }
}

#[async_trait]
pub trait DbProvider: Send + Sync {
    fn id(&self) -> DbProviderId;

    fn supports_url(&self, url: &str) -> bool;

    async fn connect(&self, cfg: &DatabaseConfig) -> Result<DatabaseConnection> {
        let db = Database::connect(pool_options(cfg)).await?;
        Ok(db)
    }

    /// Runs once per process after the pool is up, before schema sync.
    async fn post_connect(&self, _db: &DatabaseConnection) -> Result<()> {
        Ok(())
    }
}

pub(super) fn pool_options(cfg: &DatabaseConfig) -> ConnectOptions {
    let mut options = ConnectOptions::new(cfg.url.clone());
    options
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_idle)
        .connect_timeout(CONNECT_TIMEOUT)
        .sqlx_logging(false);
    options
}

pub struct DbProviders {
    providers: HashMap<DbProviderId, Arc<dyn DbProvider>>,
}

impl DbProviders {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn DbProvider>) -> Result<Self> {
        self.add(provider)?;
        Ok(self)
    }

    pub fn add(&mut self, provider: Arc<dyn DbProvider>) -> Result<()> {
        let id = provider.id();
        if self.providers.contains_key(&id) {
            bail!("database provider already registered: {}", id.as_str());
        }
        self.providers.insert(id, provider);
        Ok(())
    }

    pub fn provider_for_url(&self, url: &str) -> Result<Arc<dyn DbProvider>> {
        self.providers
            .values()
            .find(|provider| provider.supports_url(url))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "unsupported database url '{}'; expected scheme postgres://, postgresql://, or sqlite://",
                    redact_url(url)
                )
            })
    }
}

impl Default for DbProviders {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips credentials and host details so urls can be logged.
pub fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    if let Some((scheme, _)) = trimmed.split_once("://") {
        format!("{scheme}://<redacted>")
    } else if let Some((scheme, _)) = trimmed.split_once(':') {
        format!("{scheme}:<redacted>")
    } else {
        "<invalid-url>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use sea_orm::{DatabaseConnection, MockDatabase};

    use super::{DbProvider, DbProviderId, DbProviders, redact_url};
    use crate::config::DatabaseConfig;

    struct StubProvider {
        id: DbProviderId,
        prefix: &'static str,
    }

    #[async_trait]
    impl DbProvider for StubProvider {
        fn id(&self) -> DbProviderId {
            self.id
        }

        fn supports_url(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        async fn connect(&self, _cfg: &DatabaseConfig) -> Result<DatabaseConnection> {
            Ok(MockDatabase::new(sea_orm::DatabaseBackend::Sqlite).into_connection())
        }
    }

    fn stub(id: DbProviderId, prefix: &'static str) -> Arc<dyn DbProvider> {
        Arc::new(StubProvider { id, prefix })
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut providers = DbProviders::new();
        providers
            .add(stub(DbProviderId::Sqlite, "sqlite://"))
            .expect("first registration should succeed");

        let err = providers
            .add(stub(DbProviderId::Sqlite, "sqlite://"))
            .expect_err("duplicate registration should fail");
        assert_eq!(err.to_string(), "database provider already registered: sqlite");
    }

    #[test]
    fn resolves_by_url_scheme() {
        let providers = DbProviders::new()
            .with_provider(stub(DbProviderId::Postgres, "postgres://"))
            .and_then(|p| p.with_provider(stub(DbProviderId::Sqlite, "sqlite://")))
            .expect("providers should register");

        let sqlite = providers
            .provider_for_url("sqlite://./dashboard.db")
            .expect("sqlite should resolve");
        let postgres = providers
            .provider_for_url("postgres://localhost/dashboard")
            .expect("postgres should resolve");

        assert_eq!(sqlite.id(), DbProviderId::Sqlite);
        assert_eq!(postgres.id(), DbProviderId::Postgres);
    }

    #[test]
    fn unsupported_scheme_is_redacted_in_error() {
        let providers = DbProviders::new();
        let err = match providers.provider_for_url("mysql://root:hunter2@db/app") {
            Ok(_) => panic!("unsupported url should fail"),
            Err(err) => err,
        };

        let message = err.to_string();
        assert!(message.contains("mysql://<redacted>"));
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn redact_url_handles_scheme_only_forms() {
        assert_eq!(redact_url("sqlite::memory:"), "sqlite:<redacted>");
        assert_eq!(redact_url("garbage"), "<invalid-url>");
    }
}

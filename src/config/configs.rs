use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::providers::AuthProviderId;

use super::{defaults, envconfig::EnvConfig, validate};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub database: Option<DatabaseConfig>,
    pub auth: Option<AuthConfig>,
    pub oauth: OAuthConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }

    pub fn require_approval(&self) -> bool {
        self.auth
            .as_ref()
            .map(|auth| auth.require_approval)
            .unwrap_or(defaults::DEFAULT_REQUIRE_APPROVAL)
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_string(),
            port: defaults::DEFAULT_PORT as u16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_min_idle")]
    pub min_idle: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(default = "default_auth_provider")]
    pub provider: AuthProviderId,
    pub jwt_secret: String,
    pub admin_email: String,
    pub admin_password: String,
    /// New accounts start as `pending` and need an admin approval.
    #[serde(default = "default_require_approval")]
    pub require_approval: bool,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthConfig {
    pub github: Option<OAuthClientConfig>,
    pub google: Option<OAuthClientConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Overrides for self-hosted providers and tests.
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderId {
    #[default]
    Memory,
    S3,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub provider: StorageProviderId,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub path_style: bool,
    pub presign_ttl_secs: u64,
    pub max_avatar_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProviderId::Memory,
            endpoint: String::new(),
            region: defaults::DEFAULT_STORAGE_REGION.to_string(),
            bucket: defaults::DEFAULT_STORAGE_BUCKET.to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            path_style: true,
            presign_ttl_secs: defaults::DEFAULT_PRESIGN_TTL_SECS as u64,
            max_avatar_bytes: defaults::DEFAULT_MAX_AVATAR_BYTES as usize,
        }
    }
}

fn default_db_max_connections() -> u32 {
    defaults::DEFAULT_DB_MAX_CONNECTIONS as u32
}

fn default_db_min_idle() -> u32 {
    defaults::DEFAULT_DB_MIN_IDLE as u32
}

fn default_auth_provider() -> AuthProviderId {
    AuthProviderId::Local
}

fn default_require_approval() -> bool {
    defaults::DEFAULT_REQUIRE_APPROVAL
}

fn default_access_ttl_secs() -> u64 {
    defaults::DEFAULT_ACCESS_TTL_SECS as u64
}

fn default_refresh_ttl_days() -> i64 {
    defaults::DEFAULT_REFRESH_TTL_DAYS
}

use anyhow::{Result, bail};

use super::{AppConfig, OAuthClientConfig, StorageProviderId};

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if cfg.general.host.trim().is_empty() {
        errors.push("general.host must not be empty".to_string());
    }

    if let Some(database) = cfg.database.as_ref() {
        if database.url.trim().is_empty() {
            errors.push("database.url must not be empty".to_string());
        }

        if database.min_idle > database.max_connections {
            errors.push(format!(
                "database.min_idle ({}) must be <= database.max_connections ({})",
                database.min_idle, database.max_connections
            ));
        }
    }

    if let Some(auth) = cfg.auth.as_ref() {
        if auth.admin_email.trim().is_empty() {
            errors.push("auth.admin_email must not be empty".to_string());
        }

        if auth.admin_password.len() < 8 {
            errors.push("auth.admin_password must be at least 8 characters".to_string());
        }

        if auth.jwt_secret.trim().is_empty() {
            errors.push("auth.jwt_secret must not be empty".to_string());
        }

        if auth.access_ttl_secs == 0 {
            errors.push("auth.access_ttl_secs must be > 0".to_string());
        }

        if auth.refresh_ttl_days <= 0 {
            errors.push("auth.refresh_ttl_days must be > 0".to_string());
        }
    }

    for (name, client) in [
        ("github", cfg.oauth.github.as_ref()),
        ("google", cfg.oauth.google.as_ref()),
    ] {
        if let Some(client) = client {
            validate_oauth_client(name, client, &mut errors);
        }
    }

    let storage = &cfg.storage;
    if storage.bucket.trim().is_empty() {
        errors.push("storage.bucket must not be empty".to_string());
    }
    if storage.presign_ttl_secs == 0 {
        errors.push("storage.presign_ttl_secs must be > 0".to_string());
    }
    if storage.max_avatar_bytes == 0 {
        errors.push("storage.max_avatar_bytes must be > 0".to_string());
    }
    if storage.provider == StorageProviderId::S3 {
        if storage.endpoint.trim().is_empty() {
            errors.push("storage.endpoint is required for the s3 provider".to_string());
        }
        if storage.access_key_id.trim().is_empty() || storage.secret_access_key.is_empty() {
            errors.push(
                "storage.access_key_id and storage.secret_access_key are required for the s3 provider"
                    .to_string(),
            );
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}

fn validate_oauth_client(name: &str, client: &OAuthClientConfig, errors: &mut Vec<String>) {
    if client.client_id.trim().is_empty() {
        errors.push(format!("oauth.{name}.client_id must not be empty"));
    }
    if client.client_secret.trim().is_empty() {
        errors.push(format!("oauth.{name}.client_secret must not be empty"));
    }
    if client.redirect_uri.trim().is_empty() {
        errors.push(format!("oauth.{name}.redirect_uri must not be empty"));
    }
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::config::{AppConfig, DatabaseConfig, OAuthClientConfig, StorageProviderId};

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem_in_one_error() {
        let mut cfg = AppConfig::default();
        cfg.general.host = " ".to_string();
        cfg.database = Some(DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_idle: 4,
        });
        cfg.storage.provider = StorageProviderId::S3;

        let message = validate(&cfg).expect_err("config should be invalid").to_string();

        assert!(message.contains("general.host"));
        assert!(message.contains("database.min_idle (4)"));
        assert!(message.contains("storage.endpoint"));
        assert!(message.contains("storage.access_key_id"));
    }

    #[test]
    fn oauth_clients_need_credentials() {
        let mut cfg = AppConfig::default();
        cfg.oauth.github = Some(OAuthClientConfig {
            client_id: "id".to_string(),
            client_secret: String::new(),
            redirect_uri: "http://localhost/callback".to_string(),
            auth_url: None,
            token_url: None,
            api_base: None,
        });

        let message = validate(&cfg).expect_err("config should be invalid").to_string();

        assert!(message.contains("oauth.github.client_secret"));
        assert!(!message.contains("client_id"));
    }
}

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProviderId {
    Github,
    Google,
}

impl OAuthProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProviderId::Github => "github",
            OAuthProviderId::Google => "google",
        }
    }
}

impl std::str::FromStr for OAuthProviderId {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "github" => Ok(OAuthProviderId::Github),
            "google" => Ok(OAuthProviderId::Google),
            _ => Err(not_configured()),
        }
    }
}

/// Identity returned by a provider after the code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider_account_id: String,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn id(&self) -> OAuthProviderId;

    fn authorize_url(&self, state: &str) -> String;

    async fn fetch_profile(&self, code: &str) -> anyhow::Result<OAuthProfile>;
}

#[derive(Clone, Default)]
pub struct OAuthProviders {
    providers: HashMap<OAuthProviderId, Arc<dyn OAuthProvider>>,
}

impl OAuthProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Result<Self, AppError> {
        self.add(provider)?;
        Ok(self)
    }

    pub fn add(&mut self, provider: Arc<dyn OAuthProvider>) -> Result<(), AppError> {
        let id = provider.id();
        if self.providers.contains_key(&id) {
            return Err(AppError::conflict(format!(
                "OAuth provider already registered: {}",
                id.as_str()
            )));
        }
        self.providers.insert(id, provider);
        Ok(())
    }

    /// Resolves a provider from a path segment.
    pub fn get(&self, raw: &str) -> Result<Arc<dyn OAuthProvider>, AppError> {
        let id: OAuthProviderId = raw.parse()?;
        self.providers.get(&id).cloned().ok_or_else(not_configured)
    }

    pub fn ids(&self) -> Vec<OAuthProviderId> {
        let mut ids: Vec<_> = self.providers.keys().copied().collect();
        ids.sort_by_key(|id| id.as_str());
        ids
    }
}

fn not_configured() -> AppError {
    AppError::not_found("OAuth provider not configured")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{OAuthProfile, OAuthProvider, OAuthProviderId, OAuthProviders};
    use crate::error::AppError;

    struct StaticProvider(OAuthProviderId);

    #[async_trait]
    impl OAuthProvider for StaticProvider {
        fn id(&self) -> OAuthProviderId {
            self.0
        }

        fn authorize_url(&self, state: &str) -> String {
            format!("https://idp.test/authorize?state={state}")
        }

        async fn fetch_profile(&self, _code: &str) -> anyhow::Result<OAuthProfile> {
            anyhow::bail!("not used")
        }
    }

    #[test]
    fn resolves_configured_provider_case_insensitively() {
        let providers = OAuthProviders::new()
            .with_provider(Arc::new(StaticProvider(OAuthProviderId::Github)))
            .expect("registration should succeed");

        let provider = providers.get("GitHub").expect("github should resolve");
        assert_eq!(provider.id(), OAuthProviderId::Github);
        assert_eq!(providers.ids(), vec![OAuthProviderId::Github]);
    }

    #[test]
    fn unknown_and_unconfigured_providers_are_not_found() {
        let providers = OAuthProviders::new()
            .with_provider(Arc::new(StaticProvider(OAuthProviderId::Github)))
            .expect("registration should succeed");

        for raw in ["google", "myspace"] {
            let err = match providers.get(raw) {
                Ok(_) => panic!("{raw} should not resolve"),
                Err(err) => err,
            };
            assert_eq!(err, AppError::not_found("OAuth provider not configured"));
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut providers = OAuthProviders::new();
        providers
            .add(Arc::new(StaticProvider(OAuthProviderId::Google)))
            .expect("first registration should succeed");
        let err = providers
            .add(Arc::new(StaticProvider(OAuthProviderId::Google)))
            .expect_err("duplicate should fail");
        assert_eq!(err.message(), "OAuth provider already registered: google");
    }
}

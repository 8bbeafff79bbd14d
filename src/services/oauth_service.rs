use chrono::{Duration, Utc};
use serde::Serialize;

use crate::{
    auth::{
        DeviceInfo, Role, SignUpOutcome,
        jwt::random_token,
        oauth::{OAuthProfile, OAuthProviders},
        providers::{AuthProviders, local::normalize_email},
    },
    db::dao::{
        AccountDao, DaoBase, DaoContext, DaoLayerError, EMAIL_TAKEN, NewUser, OAuthStateDao,
        UserDao,
    },
    db::entities::user,
    error::AppError,
    services::{auth_service::AuthService, user_service::user_not_found},
};

const STATE_LEN: usize = 32;
const STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorizeRedirect {
    pub url: String,
    pub state: String,
}

pub struct OAuthService<'a> {
    oauth: &'a OAuthProviders,
    auth: AuthService<'a>,
    user_dao: UserDao,
    account_dao: AccountDao,
    state_dao: OAuthStateDao,
    require_approval: bool,
}

impl<'a> OAuthService<'a> {
    pub fn new(
        oauth: &'a OAuthProviders,
        auth: &'a AuthProviders,
        daos: &DaoContext,
        require_approval: bool,
    ) -> Self {
        Self {
            oauth,
            auth: AuthService::new(auth),
            user_dao: daos.user(),
            account_dao: daos.account(),
            state_dao: daos.oauth_state(),
            require_approval,
        }
    }

    pub async fn begin(&self, provider: &str) -> Result<AuthorizeRedirect, AppError> {
        let provider = self.oauth.get(provider)?;
        let now = Utc::now().fixed_offset();
        match self.state_dao.delete_expired(now).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "expired oauth states removed"),
            Err(err) => tracing::warn!(error = %err, "failed to purge expired oauth states"),
        }

        let state = random_token(STATE_LEN);
        let expires_at = now + Duration::minutes(STATE_TTL_MINUTES);
        self.state_dao
            .create_state(&state, provider.id().as_str(), expires_at)
            .await?;

        Ok(AuthorizeRedirect {
            url: provider.authorize_url(&state),
            state,
        })
    }

    pub async fn complete(
        &self,
        provider: &str,
        code: &str,
        state: &str,
        device: &DeviceInfo,
    ) -> Result<SignUpOutcome, AppError> {
        let provider = self.oauth.get(provider)?;
        let provider_id = provider.id().as_str();

        self.state_dao
            .consume(state, provider_id, Utc::now().fixed_offset())
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid OAuth state"))?;

        let profile = provider.fetch_profile(code).await.map_err(|err| {
            tracing::warn!(provider = provider_id, error = %err, "oauth profile fetch failed");
            AppError::bad_gateway("OAuth provider request failed")
        })?;

        let user = self.resolve_user(provider_id, profile).await?;
        if user.role == Role::Pending.as_str() {
            tracing::info!(user_id = %user.id, provider = provider_id, "oauth sign-in awaiting approval");
            return Ok(SignUpOutcome::PendingApproval { user_id: user.id });
        }

        self.user_dao
            .set_last_sign_in(user.id, Utc::now().fixed_offset())
            .await?;
        let bundle = self.auth.issue_session(&user, device).await?;
        tracing::info!(user_id = %user.id, provider = provider_id, "user signed in via oauth");
        Ok(SignUpOutcome::SignedIn(bundle))
    }

    async fn linked_user(
        &self,
        provider_id: &str,
        provider_account_id: &str,
    ) -> Result<Option<user::Model>, AppError> {
        let Some(account) = self
            .account_dao
            .find_by_provider(provider_id, provider_account_id)
            .await?
        else {
            return Ok(None);
        };
        self.user_dao
            .find_by_id(account.user_id)
            .await
            .map(Some)
            .map_err(user_not_found)
    }

    async fn resolve_user(
        &self,
        provider_id: &str,
        profile: OAuthProfile,
    ) -> Result<user::Model, AppError> {
        let account_id = profile.provider_account_id.as_str();
        if let Some(user) = self.linked_user(provider_id, account_id).await? {
            return Ok(user);
        }

        let email = normalize_email(&profile.email);
        if email.is_empty() {
            return Err(AppError::bad_request("OAuth provider returned no email"));
        }

        if let Some(existing) = self.user_dao.find_by_email(&email).await? {
            if !profile.email_verified {
                return Err(AppError::conflict(EMAIL_TAKEN));
            }
            let linked = self
                .account_dao
                .link(existing.id, provider_id, account_id)
                .await;
            return match linked {
                Ok(_) => {
                    tracing::info!(user_id = %existing.id, provider = provider_id, "oauth account linked");
                    Ok(existing)
                }
                Err(err) => self.after_lost_race(provider_id, account_id, err).await,
            };
        }

        let role = if self.require_approval {
            Role::Pending
        } else {
            Role::User
        };
        let new = NewUser {
            email,
            name: profile.name.trim().to_string(),
            password_hash: None,
            role: role.as_str().to_string(),
            email_verified: profile.email_verified,
        };
        match self
            .user_dao
            .create_with_account(new, provider_id, account_id)
            .await
        {
            Ok(created) => {
                tracing::info!(user_id = %created.id, provider = provider_id, role = role.as_str(), "user registered via oauth");
                Ok(created)
            }
            Err(err) => self.after_lost_race(provider_id, account_id, err).await,
        }
    }

    /// A concurrent callback for the same identity may have linked it first;
    /// sign in as that user instead of failing.
    async fn after_lost_race(
        &self,
        provider_id: &str,
        account_id: &str,
        err: DaoLayerError,
    ) -> Result<user::Model, AppError> {
        let DaoLayerError::Conflict(message) = err else {
            return Err(err.into());
        };
        match self.linked_user(provider_id, account_id).await? {
            Some(user) => Ok(user),
            None => Err(AppError::conflict(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};
    use uuid::Uuid;

    use super::OAuthService;
    use crate::{
        auth::{
            DeviceInfo, SignUpOutcome,
            jwt::JwtKeys,
            oauth::{OAuthProfile, OAuthProvider, OAuthProviderId, OAuthProviders},
            providers::{AuthProviderId, AuthProviders, LocalAuthProvider, LocalAuthSettings},
        },
        db::{
            dao::DaoContext,
            entities::{account, oauth_state, session, user},
        },
        error::AppError,
    };

    struct FakeGithub {
        profile: Option<OAuthProfile>,
    }

    #[async_trait]
    impl OAuthProvider for FakeGithub {
        fn id(&self) -> OAuthProviderId {
            OAuthProviderId::Github
        }

        fn authorize_url(&self, state: &str) -> String {
            format!("https://github.test/login/oauth/authorize?state={state}")
        }

        async fn fetch_profile(&self, _code: &str) -> anyhow::Result<OAuthProfile> {
            self.profile
                .clone()
                .ok_or_else(|| anyhow::anyhow!("bad_verification_code"))
        }
    }

    fn profile(email_verified: bool) -> OAuthProfile {
        OAuthProfile {
            provider_account_id: "4242".to_string(),
            email: "Alice@Example.com".to_string(),
            name: "Alice".to_string(),
            email_verified,
        }
    }

    fn state_row(provider: &str) -> oauth_state::Model {
        let now = Utc::now().fixed_offset();
        oauth_state::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            state: "state-1".to_string(),
            provider: provider.to_string(),
            expires_at: now + Duration::minutes(5),
        }
    }

    fn user_row(id: Uuid, role: &str) -> user::Model {
        let now = Utc::now().fixed_offset();
        user::Model {
            id,
            created_at: now,
            updated_at: now,
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password_hash: None,
            role: role.to_string(),
            email_verified: true,
            image: None,
            last_sign_in_at: None,
        }
    }

    fn account_row(user_id: Uuid) -> account::Model {
        let now = Utc::now().fixed_offset();
        account::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            user_id,
            provider: "github".to_string(),
            provider_account_id: "4242".to_string(),
        }
    }

    fn session_row(user_id: Uuid) -> session::Model {
        let now = Utc::now().fixed_offset();
        session::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            token: "refresh-token".to_string(),
            user_id,
            expires_at: now + Duration::days(30),
            revoked: false,
            user_agent: None,
            ip_address: None,
        }
    }

    fn rows(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn state_consumed() -> MockExecResult {
        rows(1)
    }

    struct Harness {
        db: DatabaseConnection,
        oauth: OAuthProviders,
        auth: AuthProviders,
        daos: DaoContext,
    }

    impl Harness {
        fn new(mock: MockDatabase, profile: Option<OAuthProfile>) -> Self {
            let db = mock.into_connection();
            let daos = DaoContext::new(&db);
            let local = LocalAuthProvider::new(
                &daos,
                JwtKeys::from_secret(b"oauth-service-secret"),
                LocalAuthSettings::default(),
            );
            let auth = AuthProviders::new(AuthProviderId::Local)
                .with_provider(Arc::new(local))
                .expect("auth provider should register");
            let oauth = OAuthProviders::new()
                .with_provider(Arc::new(FakeGithub { profile }))
                .expect("oauth provider should register");
            Self {
                db,
                oauth,
                auth,
                daos,
            }
        }

        fn service(&self, require_approval: bool) -> OAuthService<'_> {
            OAuthService::new(&self.oauth, &self.auth, &self.daos, require_approval)
        }
    }

    #[tokio::test]
    async fn begin_stores_state_and_builds_url() {
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([rows(2)])
                .append_query_results([[state_row("github")]]),
            None,
        );

        let redirect = harness
            .service(true)
            .begin("GitHub")
            .await
            .expect("begin should succeed");
        assert_eq!(redirect.state.len(), 32);
        assert!(redirect.url.ends_with(&format!("state={}", redirect.state)));

        let log = harness.db.into_transaction_log();
        assert!(log[0].statements()[0].sql.starts_with(r#"DELETE FROM "oauth_states""#));
        assert!(log[1].statements()[0].sql.starts_with(r#"INSERT INTO "oauth_states""#));
    }

    #[tokio::test]
    async fn begin_survives_a_failed_purge() {
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_errors([DbErr::Custom("locked".to_string())])
                .append_query_results([[state_row("github")]]),
            None,
        );

        let redirect = harness.service(true).begin("github").await;
        assert!(redirect.is_ok());
    }

    #[tokio::test]
    async fn unconfigured_provider_is_not_found() {
        let harness = Harness::new(MockDatabase::new(DatabaseBackend::Postgres), None);

        let err = harness
            .service(true)
            .begin("google")
            .await
            .expect_err("google is not registered");
        assert_eq!(err, AppError::not_found("OAuth provider not configured"));
    }

    #[tokio::test]
    async fn state_for_other_provider_is_rejected() {
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("google")]])
                .append_exec_results([state_consumed()]),
            Some(profile(true)),
        );

        let err = harness
            .service(true)
            .complete("github", "code", "state-1", &DeviceInfo::default())
            .await
            .expect_err("mismatched state should fail");
        assert_eq!(err, AppError::bad_request("Invalid OAuth state"));
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("github")]])
                .append_exec_results([state_consumed()]),
            None,
        );

        let err = harness
            .service(true)
            .complete("github", "code", "state-1", &DeviceInfo::default())
            .await
            .expect_err("fetch failure should fail");
        assert_eq!(err, AppError::bad_gateway("OAuth provider request failed"));
    }

    #[tokio::test]
    async fn linked_account_signs_in() {
        let user_id = Uuid::new_v4();
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("github")]])
                .append_exec_results([state_consumed()])
                .append_query_results([[account_row(user_id)]])
                .append_query_results([
                    [user_row(user_id, "user")],
                    [user_row(user_id, "user")],
                    [user_row(user_id, "user")],
                ])
                .append_query_results([[session_row(user_id)]]),
            Some(profile(false)),
        );

        let outcome = harness
            .service(true)
            .complete("github", "code", "state-1", &DeviceInfo::default())
            .await
            .expect("linked account should sign in");
        assert!(matches!(
            outcome,
            SignUpOutcome::SignedIn(ref bundle) if bundle.refresh_token == "refresh-token"
        ));
    }

    #[tokio::test]
    async fn unverified_email_does_not_take_over_existing_user() {
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("github")]])
                .append_exec_results([state_consumed()])
                .append_query_results([Vec::<account::Model>::new()])
                .append_query_results([[user_row(Uuid::new_v4(), "user")]]),
            Some(profile(false)),
        );

        let err = harness
            .service(true)
            .complete("github", "code", "state-1", &DeviceInfo::default())
            .await
            .expect_err("unverified email should not link");
        assert_eq!(err, AppError::conflict("Email already registered"));
    }

    #[tokio::test]
    async fn new_user_waits_for_approval() {
        let user_id = Uuid::new_v4();
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("github")]])
                .append_exec_results([state_consumed()])
                .append_query_results([Vec::<account::Model>::new()])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[user_row(user_id, "pending")]])
                .append_query_results([[account_row(user_id)]]),
            Some(profile(true)),
        );

        let outcome = harness
            .service(true)
            .complete("github", "code", "state-1", &DeviceInfo::default())
            .await
            .expect("new user should be created");
        assert!(matches!(
            outcome,
            SignUpOutcome::PendingApproval { user_id: pending } if pending == user_id
        ));
    }

    #[tokio::test]
    async fn failed_link_rolls_back_new_user() {
        let harness = Harness::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("github")]])
                .append_exec_results([state_consumed()])
                .append_query_results([Vec::<account::Model>::new()])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[user_row(Uuid::new_v4(), "pending")]])
                .append_query_errors([DbErr::Custom("accounts insert failed".to_string())]),
            Some(profile(true)),
        );

        let err = harness
            .service(true)
            .complete("github", "code", "state-1", &DeviceInfo::default())
            .await
            .expect_err("link failure should fail the sign-in");
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let log = harness.db.into_transaction_log();
        let statements = log
            .last()
            .expect("transaction should be logged")
            .statements();
        assert_eq!(statements.first().map(|s| s.sql.as_str()), Some("BEGIN"));
        assert!(statements[1].sql.starts_with(r#"INSERT INTO "users""#));
        assert!(statements[2].sql.starts_with(r#"INSERT INTO "accounts""#));
        assert_eq!(statements.last().map(|s| s.sql.as_str()), Some("ROLLBACK"));
    }
}

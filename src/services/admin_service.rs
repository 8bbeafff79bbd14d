use std::{collections::HashSet, future::Future};

use chrono::Utc;
use futures_util::future::join_all;
use sea_orm::Order;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::Role,
    db::dao::{DaoBase, PaginatedResponse, SessionDao, UserDao, UserFilter},
    db::entities::user,
    error::AppError,
    services::{
        SessionView, UserView, avatar_service::AvatarService, user_service::user_not_found,
    },
};

pub const MAX_BULK_IDS: usize = 100;
const DEFAULT_PAGE_SIZE: u64 = 20;

/// Query string of the admin user table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    /// Comma separated, e.g. `admin,pending`.
    pub role: Option<String>,
    pub search: Option<String>,
}

impl UserListQuery {
    fn sort_column(&self) -> Result<user::Column, AppError> {
        match self.sort.as_deref().unwrap_or("created_at") {
            "email" => Ok(user::Column::Email),
            "name" => Ok(user::Column::Name),
            "role" => Ok(user::Column::Role),
            "created_at" => Ok(user::Column::CreatedAt),
            "last_sign_in_at" => Ok(user::Column::LastSignInAt),
            other => Err(AppError::bad_request(format!("Unknown sort column: {other}"))),
        }
    }

    fn sort_order(&self) -> Result<Order, AppError> {
        match self.order.as_deref().unwrap_or("desc") {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(AppError::bad_request(format!("Unknown sort order: {other}"))),
        }
    }

    fn filter(&self) -> Result<UserFilter, AppError> {
        let mut roles = Vec::new();
        for raw in self.role.as_deref().unwrap_or_default().split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let role = Role::try_from(raw)
                .map_err(|_| AppError::bad_request(format!("Unknown role: {raw}")))?;
            let role = role.as_str().to_string();
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_string);

        Ok(UserFilter { search, roles })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BulkFailure {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BulkOutcome {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<BulkFailure>,
    pub skipped: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RoleCounts {
    pub user: u64,
    pub admin: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_users: u64,
    pub roles: RoleCounts,
    pub active_sessions: u64,
}

/// Splits the requested ids into work items and ids that were skipped
/// because they name the acting admin.
fn plan_bulk(actor: Uuid, ids: Vec<Uuid>) -> Result<(Vec<Uuid>, Vec<Uuid>), AppError> {
    let mut seen = HashSet::new();
    let unique: Vec<Uuid> = ids.into_iter().filter(|id| seen.insert(*id)).collect();

    if unique.is_empty() {
        return Err(AppError::bad_request("No user ids given"));
    }
    if unique.len() > MAX_BULK_IDS {
        return Err(AppError::bad_request(format!(
            "At most {MAX_BULK_IDS} users per request"
        )));
    }

    Ok(unique.into_iter().partition(|id| *id != actor))
}

fn assignable_role(raw: &str) -> Result<Role, AppError> {
    let role =
        Role::try_from(raw).map_err(|_| AppError::bad_request(format!("Unknown role: {raw}")))?;
    if !role.is_active() {
        return Err(AppError::bad_request(format!(
            "Role cannot be assigned: {}",
            role.as_str()
        )));
    }
    Ok(role)
}

#[derive(Clone)]
pub struct AdminService {
    user_dao: UserDao,
    session_dao: SessionDao,
    avatars: AvatarService,
}

impl AdminService {
    pub fn new(user_dao: UserDao, session_dao: SessionDao, avatars: AvatarService) -> Self {
        Self {
            user_dao,
            session_dao,
            avatars,
        }
    }

    fn view(&self, model: user::Model) -> UserView {
        let image_url = self.avatars.avatar_url(model.image.as_deref());
        UserView::new(model, image_url)
    }

    async fn target(&self, id: Uuid) -> Result<user::Model, AppError> {
        self.user_dao.find_by_id(id).await.map_err(user_not_found)
    }

    pub async fn list_users(
        &self,
        query: UserListQuery,
    ) -> Result<PaginatedResponse<UserView>, AppError> {
        let column = query.sort_column()?;
        let order = query.sort_order()?;
        let filter = query.filter()?;
        let page = self
            .user_dao
            .list(
                query.page.unwrap_or(1),
                query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                filter,
                (column, order),
            )
            .await?;
        Ok(page.map(|model| self.view(model)))
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserView, AppError> {
        let model = self.target(id).await?;
        Ok(self.view(model))
    }

    pub async fn set_role(&self, actor: Uuid, id: Uuid, role: &str) -> Result<UserView, AppError> {
        let role = assignable_role(role)?;
        if actor == id {
            return Err(AppError::forbidden("You cannot change your own role"));
        }

        let target = self.target(id).await?;
        if target.role == Role::Pending.as_str() {
            return Err(AppError::conflict("User is pending approval"));
        }

        let updated = self
            .user_dao
            .set_role(id, role.as_str())
            .await
            .map_err(user_not_found)?;
        let revoked = self.session_dao.revoke_all_for_user(id, None).await?;
        tracing::info!(
            actor_id = %actor,
            user_id = %id,
            from = %target.role,
            to = role.as_str(),
            revoked,
            "user role changed"
        );
        Ok(self.view(updated))
    }

    pub async fn approve(&self, id: Uuid, role: Option<&str>) -> Result<UserView, AppError> {
        let role = assignable_role(role.unwrap_or(Role::User.as_str()))?;

        let target = self.target(id).await?;
        if target.role != Role::Pending.as_str() {
            return Err(AppError::conflict("User is not pending approval"));
        }

        let updated = self
            .user_dao
            .set_role(id, role.as_str())
            .await
            .map_err(user_not_found)?;
        tracing::info!(user_id = %id, role = role.as_str(), "user approved");
        Ok(self.view(updated))
    }

    pub async fn delete_user(&self, actor: Uuid, id: Uuid) -> Result<(), AppError> {
        if actor == id {
            return Err(AppError::forbidden("You cannot delete your own account"));
        }

        self.user_dao.delete(id).await.map_err(user_not_found)?;
        tracing::info!(actor_id = %actor, user_id = %id, "user deleted");

        match self.avatars.purge_user(id).await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(user_id = %id, purged, "avatar objects purged"),
            Err(err) => tracing::warn!(user_id = %id, error = %err, "avatar purge failed"),
        }
        Ok(())
    }

    pub async fn list_sessions(&self, id: Uuid) -> Result<Vec<SessionView>, AppError> {
        self.target(id).await?;
        let sessions = self
            .session_dao
            .list_active_for_user(id, Utc::now().fixed_offset())
            .await?;
        Ok(sessions
            .into_iter()
            .map(|session| SessionView::new(session, None))
            .collect())
    }

    pub async fn revoke_sessions(&self, actor: Uuid, id: Uuid) -> Result<u64, AppError> {
        if actor == id {
            return Err(AppError::forbidden("You cannot revoke your own sessions"));
        }

        self.target(id).await?;
        let revoked = self.session_dao.revoke_all_for_user(id, None).await?;
        tracing::info!(actor_id = %actor, user_id = %id, revoked, "user sessions revoked");
        Ok(revoked)
    }

    pub async fn bulk_approve(&self, actor: Uuid, ids: Vec<Uuid>) -> Result<BulkOutcome, AppError> {
        self.run_bulk(actor, ids, move |id| async move {
            self.approve(id, None).await.map(|_| ())
        })
        .await
    }

    pub async fn bulk_delete(&self, actor: Uuid, ids: Vec<Uuid>) -> Result<BulkOutcome, AppError> {
        self.run_bulk(actor, ids, move |id| self.delete_user(actor, id))
            .await
    }

    pub async fn bulk_revoke_sessions(
        &self,
        actor: Uuid,
        ids: Vec<Uuid>,
    ) -> Result<BulkOutcome, AppError> {
        self.run_bulk(actor, ids, move |id| async move {
            self.revoke_sessions(actor, id).await.map(|_| ())
        })
        .await
    }

    async fn run_bulk<F, Fut>(
        &self,
        actor: Uuid,
        ids: Vec<Uuid>,
        op: F,
    ) -> Result<BulkOutcome, AppError>
    where
        F: Fn(Uuid) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let (targets, skipped) = plan_bulk(actor, ids)?;
        let results = join_all(targets.iter().map(|id| op(*id))).await;

        let mut succeeded = 0;
        let mut failed = Vec::new();
        for (id, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => succeeded += 1,
                Err(err) => failed.push(BulkFailure {
                    id: *id,
                    message: err.message().to_string(),
                }),
            }
        }

        tracing::info!(
            actor_id = %actor,
            total = targets.len(),
            succeeded,
            failed = failed.len(),
            skipped = skipped.len(),
            "bulk operation finished"
        );
        Ok(BulkOutcome {
            total: targets.len(),
            succeeded,
            failed,
            skipped,
        })
    }

    pub async fn stats(&self) -> Result<DashboardStats, AppError> {
        let mut roles = RoleCounts::default();
        for (role, count) in self.user_dao.count_by_role().await? {
            let count = u64::try_from(count).unwrap_or_default();
            match Role::try_from(role.as_str()) {
                Ok(Role::Admin) => roles.admin += count,
                Ok(Role::Pending) => roles.pending += count,
                _ => roles.user += count,
            }
        }

        let active_sessions = self
            .session_dao
            .count_active(Utc::now().fixed_offset())
            .await?;
        Ok(DashboardStats {
            total_users: roles.user + roles.admin + roles.pending,
            roles,
            active_sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc, time::Duration};

    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use uuid::Uuid;

    use super::{AdminService, BulkFailure, RoleCounts, UserListQuery, plan_bulk};
    use crate::{
        db::{dao::DaoContext, entities::user},
        error::AppError,
        services::avatar_service::AvatarService,
        storage::MemoryStore,
    };

    fn user_model(id: Uuid, role: &str) -> user::Model {
        let now = Utc::now().fixed_offset();
        user::Model {
            id,
            created_at: now,
            updated_at: now,
            email: format!("{id}@example.com"),
            name: "Someone".to_string(),
            password_hash: Some("hash".to_string()),
            role: role.to_string(),
            email_verified: true,
            image: None,
            last_sign_in_at: None,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn service(mock: MockDatabase) -> AdminService {
        let db = mock.into_connection();
        let daos = DaoContext::new(&db);
        let avatars = AvatarService::new(
            daos.user(),
            Arc::new(MemoryStore::new("avatars")),
            Duration::from_secs(900),
            1024,
        );
        AdminService::new(daos.user(), daos.session(), avatars)
    }

    #[test]
    fn bulk_plan_dedupes_and_skips_actor() {
        let actor = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (targets, skipped) =
            plan_bulk(actor, vec![a, actor, b, a]).expect("plan should succeed");
        assert_eq!(targets, vec![a, b]);
        assert_eq!(skipped, vec![actor]);
    }

    #[test]
    fn bulk_plan_bounds_request_size() {
        let actor = Uuid::new_v4();
        assert_eq!(
            plan_bulk(actor, Vec::new()).unwrap_err(),
            AppError::bad_request("No user ids given")
        );

        let too_many = (0..101).map(|_| Uuid::new_v4()).collect();
        assert_eq!(
            plan_bulk(actor, too_many).unwrap_err(),
            AppError::bad_request("At most 100 users per request")
        );
    }

    #[test]
    fn list_query_rejects_unknown_values() {
        let query = UserListQuery {
            sort: Some("password_hash".to_string()),
            ..Default::default()
        };
        assert!(query.sort_column().is_err());

        let query = UserListQuery {
            order: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(query.sort_order().is_err());

        let query = UserListQuery {
            role: Some("admin,manager".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.filter().unwrap_err(),
            AppError::bad_request("Unknown role: manager")
        );
    }

    #[test]
    fn list_query_parses_role_facets_and_search() {
        let query = UserListQuery {
            role: Some(" admin, pending,admin ,".to_string()),
            search: Some("   ".to_string()),
            ..Default::default()
        };
        let filter = query.filter().expect("filter should parse");
        assert_eq!(filter.roles, vec!["admin".to_string(), "pending".to_string()]);
        assert_eq!(filter.search, None);
    }

    #[tokio::test]
    async fn list_users_reports_total() {
        let rows: Vec<_> = (0..3).map(|_| user_model(Uuid::new_v4(), "user")).collect();
        let admin = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([rows])
                .append_query_results([[BTreeMap::from([(
                    "num_items",
                    Value::BigInt(Some(7)),
                )])]]),
        );

        let page = admin
            .list_users(UserListQuery {
                page_size: Some(2),
                ..Default::default()
            })
            .await
            .expect("list should succeed");
        assert_eq!(page.data.len(), 2);
        assert!(page.has_next);
        assert_eq!(page.total, Some(7));
    }

    #[tokio::test]
    async fn admins_cannot_change_their_own_role() {
        let actor = Uuid::new_v4();
        let admin = service(MockDatabase::new(DatabaseBackend::Postgres));

        let err = admin
            .set_role(actor, actor, "user")
            .await
            .expect_err("self role change should fail");
        assert_eq!(err, AppError::forbidden("You cannot change your own role"));
    }

    #[tokio::test]
    async fn set_role_rejects_pending_target_and_pending_role() {
        let target = Uuid::new_v4();
        let admin = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user_model(target, "pending")]]),
        );

        let err = admin
            .set_role(Uuid::new_v4(), target, "pending")
            .await
            .expect_err("pending cannot be assigned");
        assert_eq!(err, AppError::bad_request("Role cannot be assigned: pending"));

        let err = admin
            .set_role(Uuid::new_v4(), target, "admin")
            .await
            .expect_err("pending target should fail");
        assert_eq!(err, AppError::conflict("User is pending approval"));
    }

    #[tokio::test]
    async fn set_role_revokes_target_sessions() {
        let target = Uuid::new_v4();
        let admin = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    [user_model(target, "user")],
                    [user_model(target, "user")],
                    [user_model(target, "admin")],
                ])
                .append_exec_results([exec(3)]),
        );

        let view = admin
            .set_role(Uuid::new_v4(), target, "admin")
            .await
            .expect("role change should succeed");
        assert_eq!(view.role, "admin");
    }

    #[tokio::test]
    async fn approve_requires_pending_user() {
        let target = Uuid::new_v4();
        let admin = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user_model(target, "user")]]),
        );

        let err = admin
            .approve(target, None)
            .await
            .expect_err("active user should fail");
        assert_eq!(err, AppError::conflict("User is not pending approval"));
    }

    #[tokio::test]
    async fn bulk_delete_counts_successes_and_failures() {
        let actor = Uuid::new_v4();
        let present = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let admin = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([exec(1), exec(0)]),
        );

        let outcome = admin
            .bulk_delete(actor, vec![present, missing, actor, present])
            .await
            .expect("bulk delete should run");
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(
            outcome.failed,
            vec![BulkFailure {
                id: missing,
                message: "User not found".to_string(),
            }]
        );
        assert_eq!(outcome.skipped, vec![actor]);
    }

    #[tokio::test]
    async fn stats_fold_role_counts() {
        let admin = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    BTreeMap::from([
                        ("role".to_string(), Value::String(Some("user".to_string()))),
                        ("count".to_string(), Value::BigInt(Some(5))),
                    ]),
                    BTreeMap::from([
                        ("role".to_string(), Value::String(Some("admin".to_string()))),
                        ("count".to_string(), Value::BigInt(Some(1))),
                    ]),
                    BTreeMap::from([
                        ("role".to_string(), Value::String(Some("pending".to_string()))),
                        ("count".to_string(), Value::BigInt(Some(2))),
                    ]),
                ]])
                .append_query_results([[BTreeMap::from([(
                    "num_items",
                    Value::BigInt(Some(4)),
                )])]]),
        );

        let stats = admin.stats().await.expect("stats should load");
        assert_eq!(stats.total_users, 8);
        assert_eq!(
            stats.roles,
            RoleCounts {
                user: 5,
                admin: 1,
                pending: 2,
            }
        );
        assert_eq!(stats.active_sessions, 4);
    }
}

use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderMap};
use taskhive_core::{
    db::errors::is_unique_violation,
    user::{UserRecord, UserRole, UserStore, normalize_email},
    workspace::{DEFAULT_PERSONAL_WORKSPACE_NAME, NewWorkspace, WorkspaceKind, WorkspaceStore},
};
use tracing::info;

use crate::{
    AppError,
    auth::{bearer_token, generate_password_hash, verify_password},
    crypto::TokenSigner,
    email::Mailer,
    observability::record_authenticated_user,
    state::AppState,
    types::AuthenticatedRestSession,
};

pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;

/// A freshly issued bearer token together with its owner.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user: UserRecord,
}

pub struct UserService {
    user_store: UserStore,
    workspace_store: WorkspaceStore,
    token_signer: Arc<TokenSigner>,
    mailer: Mailer,
}

impl UserService {
    pub fn new(
        user_store: UserStore,
        workspace_store: WorkspaceStore,
        token_signer: Arc<TokenSigner>,
        mailer: Mailer,
    ) -> Self {
        Self {
            user_store,
            workspace_store,
            token_signer,
            mailer,
        }
    }

    pub fn ensure_admin_user(
        &self,
        requester: &UserRecord,
        error_message: &'static str,
    ) -> Result<(), AppError> {
        if requester.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden(error_message))
        }
    }

    /// Loads the target of an admin operation. Administrator accounts can
    /// only be changed by a superadmin.
    async fn managed_target(
        &self,
        requester: &UserRecord,
        target_id: &str,
    ) -> Result<UserRecord, AppError> {
        let target = self.fetch_user(target_id).await?;
        if target.role.is_admin()
            && requester.role != UserRole::Superadmin
            && target.id != requester.id
        {
            return Err(AppError::forbidden(
                "Only superadmins can change administrator accounts",
            ));
        }
        Ok(target)
    }

    pub async fn fetch_user(&self, user_id: &str) -> Result<UserRecord, AppError> {
        self.user_store
            .find_by_id(user_id)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::user_not_found("User not found."))
    }

    pub async fn authenticate_rest_request(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedRestSession, AppError> {
        let Some(token) = bearer_token(headers) else {
            return Err(AppError::unauthorized("authentication required"));
        };

        let claims = self
            .token_signer
            .verify(token)
            .map_err(|_| AppError::unauthorized("invalid or expired token"))?;

        let Some(user) = self
            .user_store
            .find_by_id(&claims.sub)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Err(AppError::unauthorized("authentication required"));
        };

        if !user.active {
            return Err(AppError::unauthorized("account is deactivated"));
        }

        record_authenticated_user(&user.id);
        Ok(AuthenticatedRestSession { user })
    }

    /// Creates the account with its personal workspace and signs it in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<IssuedSession, AppError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self
            .user_store
            .find_by_email(&email)
            .await
            .map_err(AppError::from_anyhow)?
            .is_some()
        {
            return Err(email_taken());
        }

        let password_hash = hash_password(password)?;
        let user = match self
            .user_store
            .create(&email, &password_hash, name, UserRole::User)
            .await
        {
            Ok(user) => user,
            Err(err) if is_unique_violation(&err) => return Err(email_taken()),
            Err(err) => return Err(AppError::from_anyhow(err)),
        };

        self.workspace_store
            .create(
                &user.id,
                WorkspaceKind::Personal,
                NewWorkspace {
                    name: DEFAULT_PERSONAL_WORKSPACE_NAME,
                    ..NewWorkspace::default()
                },
            )
            .await
            .map_err(AppError::from_anyhow)?;

        info!(user_id = %user.id, "user registered");
        self.mailer
            .send_welcome(&user.email, user.name.as_deref())
            .await;

        let token = self.issue_token(&user)?;
        Ok(IssuedSession { token, user })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AppError> {
        let Some(user) = self
            .user_store
            .find_by_email(email)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Err(AppError::unauthorized("invalid credentials"));
        };

        if !verify_password(&user.password_hash, password) {
            return Err(AppError::unauthorized("invalid credentials"));
        }

        if !user.active {
            return Err(AppError::unauthorized("account is deactivated"));
        }

        let token = self.issue_token(&user)?;
        Ok(IssuedSession { token, user })
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
    ) -> Result<UserRecord, AppError> {
        self.user_store
            .update_profile(user_id, name)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::user_not_found("User not found."))
    }

    pub async fn list_users(
        &self,
        requester: &UserRecord,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<UserRecord>, AppError> {
        self.ensure_admin_user(requester, "Only administrators can list users")?;
        self.user_store
            .list(offset, limit)
            .await
            .map_err(AppError::from_anyhow)
    }

    pub async fn set_active(
        &self,
        requester: &UserRecord,
        target_id: &str,
        active: bool,
    ) -> Result<UserRecord, AppError> {
        self.ensure_admin_user(requester, "Only administrators can change account status")?;
        if !active && requester.id.as_str() == target_id {
            return Err(AppError::invalid_operation(
                "Administrators cannot deactivate themselves",
            ));
        }
        self.managed_target(requester, target_id).await?;

        let updated = self
            .user_store
            .set_active(target_id, active)
            .await
            .map_err(AppError::from_anyhow)?;
        if !updated {
            return Err(AppError::user_not_found("User not found."));
        }
        info!(actor = %requester.id, target = target_id, active, "user status changed");
        self.fetch_user(target_id).await
    }

    pub async fn set_role(
        &self,
        requester: &UserRecord,
        target_id: &str,
        role: &str,
    ) -> Result<UserRecord, AppError> {
        self.ensure_admin_user(requester, "Only administrators can change roles")?;
        let role: UserRole = role
            .parse()
            .map_err(|_| AppError::bad_request(format!("unknown role: {role}")))?;
        if role.is_admin() && requester.role != UserRole::Superadmin {
            return Err(AppError::forbidden(
                "Only superadmins can grant administrator roles",
            ));
        }
        self.managed_target(requester, target_id).await?;

        let updated = self
            .user_store
            .set_role(target_id, role)
            .await
            .map_err(AppError::from_anyhow)?;
        if !updated {
            return Err(AppError::user_not_found("User not found."));
        }
        info!(
            actor = %requester.id,
            target = target_id,
            role = role.as_str(),
            "user role changed"
        );
        self.fetch_user(target_id).await
    }

    pub async fn set_permissions(
        &self,
        requester: &UserRecord,
        target_id: &str,
        permissions: &[String],
    ) -> Result<UserRecord, AppError> {
        self.ensure_admin_user(requester, "Only administrators can change permissions")?;
        self.managed_target(requester, target_id).await?;
        let updated = self
            .user_store
            .set_permissions(target_id, permissions)
            .await
            .map_err(AppError::from_anyhow)?;
        if !updated {
            return Err(AppError::user_not_found("User not found."));
        }
        self.fetch_user(target_id).await
    }

    /// Creates a superadmin, or promotes and reactivates an existing account.
    /// An existing account keeps its password.
    pub async fn bootstrap_superadmin(
        &self,
        email: &str,
        password: &str,
    ) -> anyhow::Result<UserRecord> {
        if let Some(existing) = self.user_store.find_by_email(email).await? {
            self.user_store
                .set_role(&existing.id, UserRole::Superadmin)
                .await?;
            self.user_store.set_active(&existing.id, true).await?;
            info!(user_id = %existing.id, "promoted existing user to superadmin");
            return self
                .user_store
                .find_by_id(&existing.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished", existing.id));
        }

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            anyhow::bail!("password must be at least {MIN_PASSWORD_LENGTH} characters");
        }
        let password_hash = generate_password_hash(password)
            .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
        let user = self
            .user_store
            .create(email, &password_hash, None, UserRole::Superadmin)
            .await?;
        self.workspace_store
            .create(
                &user.id,
                WorkspaceKind::Personal,
                NewWorkspace {
                    name: DEFAULT_PERSONAL_WORKSPACE_NAME,
                    ..NewWorkspace::default()
                },
            )
            .await?;
        info!(user_id = %user.id, "created superadmin");
        Ok(user)
    }

    fn issue_token(&self, user: &UserRecord) -> Result<String, AppError> {
        self.token_signer.issue(user).map_err(AppError::from_anyhow)
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(state: &AppState) -> Arc<UserService> {
        Arc::clone(&state.user_service)
    }
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::bad_request("a valid email address is required"))
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    generate_password_hash(password)
        .map_err(|err| AppError::internal(anyhow::anyhow!("password hashing failed: {err}")))
}

fn email_taken() -> AppError {
    AppError::conflict("An account with this email already exists.").with_name("EMAIL_ALREADY_USED")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bearer_headers, seed_admin, seed_user, setup_state};

    #[tokio::test]
    async fn register_creates_personal_workspace_and_token() {
        let (_dir, _database, state) = setup_state().await;

        let session = state
            .user_service
            .register("  New@Example.com ", "long-enough", Some("New"))
            .await
            .expect("register");
        assert_eq!(session.user.email, "new@example.com");
        assert_eq!(session.user.role, UserRole::User);

        let workspaces = state
            .workspace_store
            .list_for_user(&session.user.id)
            .await
            .expect("workspaces");
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].workspace.name, DEFAULT_PERSONAL_WORKSPACE_NAME);
        assert_eq!(workspaces[0].workspace.kind, WorkspaceKind::Personal);

        let claims = state.token_signer.verify(&session.token).expect("token");
        assert_eq!(claims.sub, session.user.id.as_str());
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_short_passwords() {
        let (_dir, _database, state) = setup_state().await;

        let err = state
            .user_service
            .register("short@example.com", "short", None)
            .await
            .expect_err("short password");
        assert_eq!(err.status().as_u16(), 400);

        let err = state
            .user_service
            .register("not-an-email", "long-enough", None)
            .await
            .expect_err("bad email");
        assert_eq!(err.status().as_u16(), 400);

        state
            .user_service
            .register("dup@example.com", "long-enough", None)
            .await
            .expect("first");
        let err = state
            .user_service
            .register("DUP@example.com", "long-enough", None)
            .await
            .expect_err("duplicate");
        assert_eq!(err.status().as_u16(), 409);
    }

    #[tokio::test]
    async fn login_checks_password_and_status() {
        let (_dir, _database, state) = setup_state().await;
        let session = state
            .user_service
            .register("login@example.com", "long-enough", None)
            .await
            .expect("register");

        let ok = state
            .user_service
            .login("LOGIN@example.com", "long-enough")
            .await
            .expect("login");
        assert_eq!(ok.user.id, session.user.id);

        let err = state
            .user_service
            .login("login@example.com", "wrong-password")
            .await
            .expect_err("bad password");
        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(err.message(), "invalid credentials");

        let err = state
            .user_service
            .login("nobody@example.com", "long-enough")
            .await
            .expect_err("unknown user");
        assert_eq!(err.message(), "invalid credentials");

        state
            .user_store
            .set_active(&session.user.id, false)
            .await
            .expect("deactivate");
        let err = state
            .user_service
            .login("login@example.com", "long-enough")
            .await
            .expect_err("deactivated");
        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(err.message(), "account is deactivated");
    }

    #[tokio::test]
    async fn authenticated_token_resolves_user() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "me@example.com").await;
        let session = state
            .user_service
            .authenticate_rest_request(&bearer_headers(&state, &user))
            .await
            .expect("authenticated");
        assert_eq!(session.user.id, user.id);
    }

    #[tokio::test]
    async fn admin_operations_require_admin_role() {
        let (_dir, _database, state) = setup_state().await;
        let user = seed_user(&state, "plain@example.com").await;
        let other = seed_user(&state, "other@example.com").await;

        let err = state
            .user_service
            .list_users(&user, 0, 50)
            .await
            .expect_err("not admin");
        assert_eq!(err.status().as_u16(), 403);

        let admin = seed_admin(&state, "admin@example.com", UserRole::Admin).await;
        let users = state
            .user_service
            .list_users(&admin, 0, 50)
            .await
            .expect("list");
        assert_eq!(users.len(), 3);

        let err = state
            .user_service
            .set_active(&admin, &admin.id, false)
            .await
            .expect_err("self deactivation");
        assert_eq!(err.status().as_u16(), 400);

        let updated = state
            .user_service
            .set_active(&admin, &other.id, false)
            .await
            .expect("deactivate other");
        assert!(!updated.active);

        let err = state
            .user_service
            .set_role(&admin, &other.id, "admin")
            .await
            .expect_err("admin cannot grant admin");
        assert_eq!(err.status().as_u16(), 403);

        let err = state
            .user_service
            .set_role(&admin, &other.id, "root")
            .await
            .expect_err("unknown role");
        assert_eq!(err.status().as_u16(), 400);

        let updated = state
            .user_service
            .set_permissions(&admin, &other.id, &["reports".into(), " reports ".into()])
            .await
            .expect("permissions");
        assert_eq!(updated.permissions, vec!["reports".to_owned()]);

        let err = state
            .user_service
            .set_permissions(&admin, "missing", &[])
            .await
            .expect_err("missing user");
        assert_eq!(err.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn only_superadmins_change_administrator_accounts() {
        let (_dir, _database, state) = setup_state().await;
        let root = seed_admin(&state, "root@example.com", UserRole::Superadmin).await;
        let admin = seed_admin(&state, "admin@example.com", UserRole::Admin).await;
        let peer = seed_admin(&state, "peer@example.com", UserRole::Admin).await;

        let err = state
            .user_service
            .set_role(&admin, &root.id, "user")
            .await
            .expect_err("admin cannot demote superadmin");
        assert_eq!(err.status().as_u16(), 403);

        let err = state
            .user_service
            .set_active(&admin, &root.id, false)
            .await
            .expect_err("admin cannot deactivate superadmin");
        assert_eq!(err.status().as_u16(), 403);

        let err = state
            .user_service
            .set_active(&admin, &peer.id, false)
            .await
            .expect_err("admin cannot deactivate another admin");
        assert_eq!(err.status().as_u16(), 403);

        let unchanged = state.user_service.fetch_user(&root.id).await.expect("root");
        assert_eq!(unchanged.role, UserRole::Superadmin);
        assert!(unchanged.active);

        let demoted = state
            .user_service
            .set_role(&root, &peer.id, "user")
            .await
            .expect("superadmin demotes admin");
        assert_eq!(demoted.role, UserRole::User);

        let err = state
            .user_service
            .set_role(&admin, "missing", "user")
            .await
            .expect_err("missing user");
        assert_eq!(err.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn superadmin_grants_admin_and_bootstrap_promotes() {
        let (_dir, _database, state) = setup_state().await;
        let target = seed_user(&state, "target@example.com").await;

        let root = state
            .user_service
            .bootstrap_superadmin("root@example.com", "long-enough")
            .await
            .expect("bootstrap");
        assert_eq!(root.role, UserRole::Superadmin);

        let updated = state
            .user_service
            .set_role(&root, &target.id, "admin")
            .await
            .expect("grant admin");
        assert_eq!(updated.role, UserRole::Admin);

        let promoted = state
            .user_service
            .bootstrap_superadmin("target@example.com", "ignored-password")
            .await
            .expect("promote");
        assert_eq!(promoted.id, target.id);
        assert_eq!(promoted.role, UserRole::Superadmin);
    }
}

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use self::{
    calendar_connection_repo::CalendarConnectionRepositoryRef,
    resource_repo::ResourceRepositoryRef,
    sqlite::{
        calendar_connection_repo::SqliteCalendarConnectionRepository,
        connection::{self as sqlite_connection, SqlitePool},
        resource_repo::SqliteResourceRepository,
        subscription_repo::SqliteSubscriptionRepository,
        user_repo::SqliteUserRepository,
        workspace_repo::SqliteWorkspaceRepository,
    },
    subscription_repo::SubscriptionRepositoryRef,
    user_repo::UserRepositoryRef,
    workspace_repo::WorkspaceRepositoryRef,
};
use crate::config::AppConfig;

pub mod calendar_connection_repo;
pub mod errors;
pub mod resource_repo;
pub mod sqlite;
pub mod subscription_repo;
pub mod user_repo;
pub mod workspace_repo;

#[derive(Clone)]
pub struct RepositoryRegistry {
    user_repo: UserRepositoryRef,
    workspace_repo: WorkspaceRepositoryRef,
    resource_repo: ResourceRepositoryRef,
    calendar_connection_repo: CalendarConnectionRepositoryRef,
    subscription_repo: SubscriptionRepositoryRef,
}

impl RepositoryRegistry {
    fn sqlite(pool: &SqlitePool) -> Self {
        Self {
            user_repo: Arc::new(SqliteUserRepository::new(pool.clone())),
            workspace_repo: Arc::new(SqliteWorkspaceRepository::new(pool.clone())),
            resource_repo: Arc::new(SqliteResourceRepository::new(pool.clone())),
            calendar_connection_repo: Arc::new(SqliteCalendarConnectionRepository::new(
                pool.clone(),
            )),
            subscription_repo: Arc::new(SqliteSubscriptionRepository::new(pool.clone())),
        }
    }

    pub fn user_repo(&self) -> UserRepositoryRef {
        self.user_repo.clone()
    }

    pub fn workspace_repo(&self) -> WorkspaceRepositoryRef {
        self.workspace_repo.clone()
    }

    pub fn resource_repo(&self) -> ResourceRepositoryRef {
        self.resource_repo.clone()
    }

    pub fn calendar_connection_repo(&self) -> CalendarConnectionRepositoryRef {
        self.calendar_connection_repo.clone()
    }

    pub fn subscription_repo(&self) -> SubscriptionRepositoryRef {
        self.subscription_repo.clone()
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
    repositories: Arc<RepositoryRegistry>,
}

impl Database {
    const SQLITE_FILE_NAME: &'static str = "taskhive.db";

    /// Open (creating if needed) the SQLite database and apply migrations.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let db_file = Self::resolve_database_file(&config.database_path)?;
        if let Some(dir) = db_file.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("failed to create database directory: {}", dir.display())
            })?;
        }

        let pool = sqlite_connection::create_pool(&db_file, config.database_max_connections).await?;
        sqlite_connection::run_migrations(&pool).await?;

        Ok(Self {
            repositories: Arc::new(RepositoryRegistry::sqlite(&pool)),
            pool,
            path: db_file,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn database_path(&self) -> &PathBuf {
        &self.path
    }

    pub fn repositories(&self) -> Arc<RepositoryRegistry> {
        self.repositories.clone()
    }

    /// Accepts either a file path (`*.db`, `*.sqlite`, `*.sqlite3`) or a
    /// directory that will hold `taskhive.db`.
    fn resolve_database_file(path: &str) -> Result<PathBuf> {
        let mut path = PathBuf::from(path);
        if !path.is_absolute() {
            let cwd = std::env::current_dir().context("failed to obtain current directory")?;
            path = cwd.join(path);
        }

        let is_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "db" | "sqlite" | "sqlite3"));

        if is_file {
            Ok(path)
        } else {
            Ok(path.join(Self::SQLITE_FILE_NAME))
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_database() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = AppConfig {
        database_path: dir.path().to_string_lossy().into_owned(),
        ..AppConfig::default()
    };
    let database = Database::connect(&config).await.expect("open database");
    (dir, database)
}

/// A team workspace owned by a fresh user.
#[cfg(test)]
pub(crate) async fn seed_workspace(database: &Database) -> crate::workspace::WorkspaceRecord {
    use crate::{
        user::{UserRole, UserStore},
        workspace::{NewWorkspace, WorkspaceKind, WorkspaceStore},
    };

    let owner = UserStore::new(database)
        .create("seed-owner@example.com", "hash", None, UserRole::User)
        .await
        .expect("seed user");
    WorkspaceStore::new(database)
        .create(
            &owner.id,
            WorkspaceKind::Team,
            NewWorkspace {
                name: "Seed",
                ..Default::default()
            },
        )
        .await
        .expect("seed workspace")
}

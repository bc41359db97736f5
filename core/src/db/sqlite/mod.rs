pub mod calendar_connection_repo;
pub mod connection;
pub mod resource_repo;
pub mod subscription_repo;
pub mod user_repo;
pub mod workspace_repo;

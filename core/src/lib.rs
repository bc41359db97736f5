pub mod access;
pub mod calendar_connection;
pub mod config;
pub mod db;
pub mod ids;
pub mod membership;
pub mod resource;
pub mod resources;
pub mod subscription;
pub mod user;
pub mod workspace;

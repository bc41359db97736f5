pub mod ai;
pub mod auth;
pub mod billing;
pub mod calendar;
pub mod crypto;
pub mod email;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;
pub mod user;
pub mod workspace;

pub use error::AppError;
pub use state::{AppState, build_state};

#[cfg(test)]
pub mod test_support;

// HTTP handlers module structure

pub(crate) mod ai_handlers;
pub(crate) mod auth_handlers;
pub(crate) mod billing_handlers;
pub(crate) mod calendar_handlers;
pub(crate) mod health_handlers;
pub(crate) mod member_handlers;
pub(crate) mod resource_handlers;
pub(crate) mod user_handlers;
pub(crate) mod workspace_handlers;

//! Workspace-scoped records for the task and hospitality modules.

pub mod checklist;
pub mod invoice;
pub mod order;
pub mod roster;
pub mod stocktake;
pub mod takings;
pub mod task;

pub use checklist::ChecklistInstance;
pub use invoice::Invoice;
pub use order::Order;
pub use roster::Roster;
pub use stocktake::Stocktake;
pub use takings::WeeklyTakings;
pub use task::Task;

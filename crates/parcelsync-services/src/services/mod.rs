//! Workflow services
//!
//! The engine (`workflow`) drives records through
//! `PENDING -> APPROVED -> ROLLED_BACK`; the other modules are the pieces it
//! is assembled from.

pub mod diff;
pub mod export;
pub mod permissions;
pub mod system_of_record;
pub mod workflow;

pub use diff::{compare, DiffGenerator};
pub use export::{to_csv, LogExporter, EXPORT_HEADER};
pub use permissions::{ensure, StaticRoles};
pub use system_of_record::StaticSystemOfRecord;
pub use workflow::{SyncWorkflow, WorkflowOptions};

//! Infrastructure layer: tenant-scoped RBAC storage, guarded commits,
//! maintenance routines and configuration loading.

pub mod config;
pub mod error;
pub mod maintenance;
pub mod store;

pub use config::EngineConfig;
pub use error::{StoreError, StoreResult};
pub use maintenance::OrphanReport;
pub use store::{InMemoryRbacStore, MutationOutcome};

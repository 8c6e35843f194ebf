//! The rpatch recipe service.
//!
//! [`RecipeService`] owns the host registry handle, the authored recipe
//! layers, and the blacklist. It is the only component that mutates the
//! live snapshot: every operation stages, persists, installs, and then
//! broadcasts, or changes nothing at all.

pub mod config;
pub mod error;
pub mod guard;
mod journal;
pub mod reload;
pub mod seed;
pub mod service;
pub mod stores;

#[cfg(test)]
mod scenarios;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use guard::{ReloadFlag, ReloadGuard};
pub use reload::ReloadReport;
pub use seed::{load_base_snapshot, standalone_host};
pub use service::{RecipeService, ServiceOptions};
pub use stores::{Layer, ServiceStores};

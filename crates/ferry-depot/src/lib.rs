//! The ephemeral content depot.
//!
//! [`DepotService`] implements [`ferry_core::Depot`] on top of a record store,
//! a code generator and a blob directory. [`Sweeper`] removes what the
//! request path leaves behind.

pub mod config;
pub mod service;
pub mod sweeper;

pub use config::{ConfigError, DepotConfig};
pub use ferry_core::{ConsumeOutcome, Created, Depot, DepotError, ServedContent, Stats};
pub use service::DepotService;
pub use sweeper::{SweepReport, Sweeper};

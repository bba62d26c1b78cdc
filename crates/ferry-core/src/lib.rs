//! Core types and traits for the Ferry ephemeral content store.
//!
//! This crate provides the shared vocabulary used by the generator, the
//! storage backends, the depot service and the HTTP gateway: content kinds,
//! codes, records with their liveness predicate, the repository contract and
//! the clock abstraction.

pub mod clock;
pub mod code;
pub mod depot;
pub mod error;
pub mod kind;
pub mod record;
pub mod repository;
pub mod upload;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::Code;
pub use depot::{ConsumeOutcome, Created, Depot, FileUpload, PasteDraft, ServedContent, Stats};
pub use error::{CoreError, DepotError, StorageError};
pub use kind::ContentKind;
pub use record::{ContentRecord, Liveness, PayloadRef, Quota, DEFAULT_TTL};
pub use repository::{Consumption, ReadRepository, Repository};
pub use upload::StagedUpload;

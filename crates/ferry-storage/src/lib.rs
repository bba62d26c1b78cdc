//! Record store backends and the on-disk payload locator.

pub mod blob;
pub mod memory;
pub mod sqlite;

pub use blob::{sanitize_file_name, BlobEntry, BlobStore};
pub use ferry_core::{Consumption, ReadRepository, Repository, StorageError};
pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

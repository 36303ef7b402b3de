//! Hybrid storage for HSDB.
//!
//! [`HybridStorage`] owns one [`IndexDatabase`](hsdb_index::IndexDatabase)
//! and a [`Persistence`] backend. Every mutation runs on a single apply
//! worker in submission order and is two-phase: the index changes first,
//! then the durable artifact; if the durable write fails the index change is
//! rolled back and the call reports [`Status::Gone`](hsdb_types::Status).
//! Reads go straight to the index.
//!
//! # Backends
//!
//! - [`FilePersistence`] -- one pretty-printed JSON file per record under
//!   `{root}/{resource_name_plural}/{id}.json`, written atomically
//! - [`MemoryPersistence`] -- in-memory artifacts with failure injection

pub mod error;
pub mod file;
pub mod install;
pub mod memory;
pub mod persistence;
pub mod queue;
pub mod storage;

pub use error::{PersistError, PersistResult, StorageError, StorageResult};
pub use file::FilePersistence;
pub use install::{FixtureSet, IndexFileEntry, InstallReport};
pub use memory::{FailureMode, MemoryPersistence};
pub use persistence::{Persistence, ScannedArtifact};
pub use storage::HybridStorage;

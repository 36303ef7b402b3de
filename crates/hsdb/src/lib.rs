//! HSDB: a schema-driven record store.
//!
//! Models are declared in a schema file (or in code) and assembled into a
//! [`SchemaRegistry`]. Records live in an in-memory index that answers
//! lookups and queries, and each write is mirrored to a durable backend.
//! This crate is the entry point for applications embedding HSDB.
//!
//! ```no_run
//! use hsdb::{Hsdb, HsdbConfig};
//! use serde_json::json;
//!
//! let db = Hsdb::open(HsdbConfig::from_path("hsdb.toml".as_ref())?)?;
//! let students = db.model("Student")?;
//! let ada = students.create(json!({"name": "Ada", "age": 17}))?;
//! assert_eq!(students.find_by("age", 17)?, vec![ada]);
//! # Ok::<(), hsdb::SdkError>(())
//! ```
//!
//! Deleting a record never deletes the records that refer to it; relation
//! keys pointing at a deleted record simply resolve to nothing.

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use config::HsdbConfig;
pub use db::{parse_id, Hsdb};
pub use error::{SdkError, SdkResult};
pub use model::Model;

// Re-export key types
pub use hsdb_query::{Operator, Query, ResponseShape, Row, SortOrder};
pub use hsdb_record::{Document, Record, RelationHandle, RelationMode, SerializeOptions};
pub use hsdb_schema::{
    AttributeSpec, FieldSpec, ModelDefinition, ModelSchema, RelationKind, RelationSpec, SchemaRegistry,
};
pub use hsdb_storage::{HybridStorage, InstallReport};
pub use hsdb_types::{FieldType, RecordId, Status, Value};

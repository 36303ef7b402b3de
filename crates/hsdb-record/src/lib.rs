//! Records for HSDB: one instance of a model.
//!
//! A [`Record`] is built against an assembled
//! [`ModelSchema`](hsdb_schema::ModelSchema). Construction copies every field
//! specification into a per-instance [`Slot`], validates the supplied data
//! against it, and stamps the base fields. Relation slots hold keys only;
//! reading one yields a [`RelationHandle`] that a query layer turns into a
//! scoped query.
//!
//! # Key Types
//!
//! - [`Record`] -- model instance with id, timestamps and slots
//! - [`Slot`] -- per-instance copy of a field specification plus its value
//! - [`RelationHandle`] -- unresolved reference to related records
//! - [`SerializeOptions`] -- how relations and field subsets are rendered
//! - [`RecordLookup`] -- read seam used to expand relations

pub mod error;
pub mod record;
pub mod relation;
pub mod serialize;
pub mod slot;

pub use error::{RecordError, RecordResult};
pub use record::{document_from_json, Document, Record};
pub use relation::RelationHandle;
pub use serialize::{RecordLookup, RelationMode, SerializeOptions};
pub use slot::{AttributeSlot, RelationSlot, Slot};

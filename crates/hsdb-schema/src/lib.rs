//! Declarative schema layer for HSDB.
//!
//! Models are declared as [`ModelDefinition`]s (in code, or loaded from a
//! TOML/JSON [`SchemaDocument`]) and assembled once into a
//! [`SchemaRegistry`]. Assembly walks each model's ancestry from the root to
//! the model itself and collects every named field; when a derived model
//! redeclares an inherited field, the most-derived declaration wins.
//!
//! # Key Types
//!
//! - [`AttributeSpec`] / [`RelationSpec`] -- per-field descriptors
//! - [`FieldFlags`] -- required/computed/indexed/unique/searchable/editable
//! - [`ModelSchema`] -- the assembled, ordered field list of one model
//! - [`SchemaRegistry`] -- model name to schema, plus plural-name routing

pub mod definition;
pub mod error;
pub mod field;
pub mod model;
pub mod naming;
pub mod registry;

pub use definition::{ModelDefinition, SchemaDocument};
pub use error::{SchemaError, SchemaResult};
pub use field::{AttributeSpec, FieldFlags, FieldSpec, RelationKind, RelationSpec};
pub use model::{ModelSchema, CREATED_AT, ID, UPDATED_AT};
pub use registry::{RegistryBuilder, SchemaRegistry};

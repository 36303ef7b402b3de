//! Foundation types for HSDB, the in-process hybrid object store.
//!
//! Every other HSDB crate depends on `hsdb-types`.
//!
//! # Key Types
//!
//! - [`Value`] — Dynamically typed field value with cross-kind ordering
//! - [`ValueKey`] — Canonical hashable key derived from a [`Value`]
//! - [`FieldType`] — Declared type constraint of a field, with coercion
//! - [`RecordId`] — UUID v7 record identifier (ordering = creation order)
//! - [`Status`] — Status codes reported by mutating store paths

pub mod error;
pub mod field_type;
pub mod id;
pub mod status;
pub mod value;

pub use error::TypeError;
pub use field_type::FieldType;
pub use id::RecordId;
pub use status::Status;
pub use value::{Value, ValueKey};

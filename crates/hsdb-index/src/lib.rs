//! The HSDB index database.
//!
//! [`IndexDatabase`] owns every live record in a primary table and keeps
//! three auxiliary indices consistent with it:
//!
//! - the **model index**: model name to the ids of that model
//! - the **field index**: (model, field, value) to ids, for indexed fields
//! - the **relational index**: (model, relation, key) to the owning ids
//!
//! A single lock covers the table and all three indices, so every mutation
//! is one critical section and the field-index invariant holds at every
//! externally observable point. Id sets handed out by lookups are copies.

pub mod database;
pub mod error;
mod state;

pub use database::IndexDatabase;
pub use error::{IndexError, IndexResult};

//! Query builder and executor for HSDB.
//!
//! A [`Query`] is built fluently against one model of an
//! [`IndexDatabase`](hsdb_index::IndexDatabase) and executed exactly once by
//! a terminal operation. Execution seeds candidates from the field index
//! when equality conditions on indexed fields allow it and falls back to the
//! model's full id set otherwise; remaining conditions are evaluated per
//! record. Sorting precedes projection, which precedes pagination.
//!
//! Queries also round-trip through a flat key/value parameter grammar
//! (`age__gte=16&sort=-name&page=0&page_size=10`) for HTTP-style adapters.

pub mod condition;
pub mod error;
pub mod params;
pub mod query;
pub mod relation;
pub mod shape;

pub use condition::{Condition, Operator};
pub use error::{QueryError, QueryResult};
pub use query::{Paging, Query, Row, SortOrder, DEFAULT_PAGE_SIZE};
pub use relation::{reverse, RelationExt};
pub use shape::ResponseShape;

//! Turning relation handles into scoped queries.

use std::collections::BTreeSet;

use hsdb_index::IndexDatabase;
use hsdb_record::{Record, RelationHandle};
use hsdb_types::Value;

use crate::condition::Operator;
use crate::error::{QueryError, QueryResult};
use crate::query::Query;

/// Resolution of a [`RelationHandle`] into a [`Query`].
pub trait RelationExt {
    /// A query over the secondary model restricted to the stored keys.
    ///
    /// Id-keyed relations become a `subset` constraint; relations keyed by
    /// another field become a `contains` condition on that field.
    fn resolve<'db>(&self, db: &'db IndexDatabase) -> QueryResult<Query<'db>>;
}

impl RelationExt for RelationHandle {
    fn resolve<'db>(&self, db: &'db IndexDatabase) -> QueryResult<Query<'db>> {
        let query = Query::new(db, &self.secondary_model)?;
        if self.keys_are_ids() || self.is_empty() {
            return Ok(query.subset(self.ids().into_iter().collect()));
        }
        query.condition(&self.relation_key, Operator::Contains, Value::List(self.keys.clone()))
    }
}

/// A query over the owners reaching `record` through the reverse lookup
/// `name` (for example a school's `students`).
pub fn reverse<'db>(db: &'db IndexDatabase, record: &Record, name: &str) -> QueryResult<Query<'db>> {
    let (owner, relation) = db
        .registry()
        .reverse_relation(record.model_name(), name)
        .ok_or_else(|| QueryError::UnknownReverse {
            model: record.model_name().to_string(),
            name: name.to_string(),
        })?;
    let ids: BTreeSet<_> = match record.value(&relation.relation_key) {
        Some(key) if !key.is_null() => db.reverse_lookup(&owner.model_name, &relation.name, &key),
        _ => BTreeSet::new(),
    };
    Ok(Query::new(db, &owner.model_name)?.subset(ids))
}

//! The query builder and executor.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use hsdb_index::IndexDatabase;
use hsdb_record::Record;
use hsdb_schema::{FieldSpec, ModelSchema, ID};
use hsdb_types::{FieldType, RecordId, Value};
use serde::Serialize;
use tracing::{debug, info};

use crate::condition::{Condition, Operator};
use crate::error::{QueryError, QueryResult};
use crate::shape::ResponseShape;

/// Page size used when the parameter grammar names a page but no size.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Result window applied after sorting and projection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Paging {
    /// Zero-based page of `size` rows. A negative page selects the last
    /// page, computed as `max(total / size - 1, 0)`.
    Page { page: i64, size: usize },
    Offset { offset: usize, limit: Option<usize> },
}

/// One result row: a record, or a single field value under projection.
#[derive(Clone, Debug, PartialEq)]
pub enum Row {
    Record(Record),
    Value(Value),
}

impl Row {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            Self::Value(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(r) => Some(r),
            Self::Value(_) => None,
        }
    }

    /// The row as a value; records read as their id.
    pub fn value(&self) -> Value {
        match self {
            Self::Record(r) => Value::String(r.id().to_string()),
            Self::Value(v) => v.clone(),
        }
    }
}

/// A query over one model of an [`IndexDatabase`].
///
/// Conditions are added with [`Query::where_`] followed by exactly one
/// operator. Any terminal operation executes the query; a second terminal
/// call fails with [`QueryError::AlreadyExecuted`].
#[derive(Clone)]
pub struct Query<'db> {
    db: &'db IndexDatabase,
    schema: Arc<ModelSchema>,
    conditions: Vec<Condition>,
    pending: Option<String>,
    subset: Option<BTreeSet<RecordId>>,
    projection: Option<String>,
    sort: Option<(String, SortOrder)>,
    paging: Option<Paging>,
    shape: ResponseShape,
    verbose: bool,
    executed: bool,
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.schema.model_name)
            .field("conditions", &self.conditions)
            .field("pending", &self.pending)
            .field("subset", &self.subset.as_ref().map(BTreeSet::len))
            .field("projection", &self.projection)
            .field("sort", &self.sort)
            .field("paging", &self.paging)
            .field("executed", &self.executed)
            .finish()
    }
}

impl<'db> Query<'db> {
    pub fn new(db: &'db IndexDatabase, model: &str) -> QueryResult<Self> {
        let schema = db.registry().require(model)?;
        Ok(Self {
            db,
            schema,
            conditions: Vec::new(),
            pending: None,
            subset: None,
            projection: None,
            sort: None,
            paging: None,
            shape: ResponseShape::default(),
            verbose: false,
            executed: false,
        })
    }

    /// The model being queried.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// The database the query runs against.
    pub fn db(&self) -> &'db IndexDatabase {
        self.db
    }

    /// Conditions in the order they were added.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn sorting(&self) -> Option<(&str, SortOrder)> {
        self.sort.as_ref().map(|(field, order)| (field.as_str(), *order))
    }

    pub fn paging(&self) -> Option<Paging> {
        self.paging
    }

    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    pub fn response_shape(&self) -> &ResponseShape {
        &self.shape
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    // ---------------------------------------------------------------
    // Building
    // ---------------------------------------------------------------

    /// Set the pending field for the next operator.
    pub fn where_(mut self, field: &str) -> QueryResult<Self> {
        if let Some(pending) = self.pending.take() {
            return Err(QueryError::PendingField(pending));
        }
        self.field_spec(field)?;
        self.pending = Some(field.to_string());
        Ok(self)
    }

    pub fn equals(self, value: impl Into<Value>) -> QueryResult<Self> {
        self.close(Operator::Equals, value.into())
    }

    pub fn greater_than(self, value: impl Into<Value>) -> QueryResult<Self> {
        self.close(Operator::GreaterThan, value.into())
    }

    pub fn greater_than_or_equals(self, value: impl Into<Value>) -> QueryResult<Self> {
        self.close(Operator::GreaterThanOrEquals, value.into())
    }

    pub fn less_than(self, value: impl Into<Value>) -> QueryResult<Self> {
        self.close(Operator::LessThan, value.into())
    }

    pub fn less_than_or_equals(self, value: impl Into<Value>) -> QueryResult<Self> {
        self.close(Operator::LessThanOrEquals, value.into())
    }

    pub fn contains(self, value: impl Into<Value>) -> QueryResult<Self> {
        self.close(Operator::Contains, value.into())
    }

    /// `where_(field)` and `op(value)` in one step.
    pub fn condition(self, field: &str, op: Operator, value: Value) -> QueryResult<Self> {
        self.where_(field)?.close(op, value)
    }

    fn close(mut self, op: Operator, value: Value) -> QueryResult<Self> {
        let field = self.pending.take().ok_or(QueryError::NoPendingField(op.verb()))?;
        let value = self.coerce_target(&field, op, value)?;
        self.conditions.push(Condition { field, op, value });
        Ok(self)
    }

    /// Restrict candidates to `ids`. Repeated calls intersect.
    pub fn subset(mut self, ids: BTreeSet<RecordId>) -> Self {
        self.subset = Some(match self.subset.take() {
            Some(current) => current.intersection(&ids).copied().collect(),
            None => ids,
        });
        self
    }

    /// Reduce each result record to the value of `field`.
    pub fn filter_by(mut self, field: &str) -> QueryResult<Self> {
        self.field_spec(field)?;
        self.projection = Some(field.to_string());
        Ok(self)
    }

    pub fn sort_by(mut self, field: &str) -> QueryResult<Self> {
        self.field_spec(field)?;
        let order = self.sort.as_ref().map(|(_, o)| *o).unwrap_or_default();
        self.sort = Some((field.to_string(), order));
        Ok(self)
    }

    pub fn sort_by_desc(self, field: &str) -> QueryResult<Self> {
        Ok(self.sort_by(field)?.order(SortOrder::Descending))
    }

    /// Set the sort direction; applies to the current or a later `sort_by`.
    pub fn order(mut self, order: SortOrder) -> Self {
        match &mut self.sort {
            Some((_, current)) => *current = order,
            None => self.sort = Some((ID.to_string(), order)),
        }
        self
    }

    pub fn page(mut self, page: i64, size: usize) -> QueryResult<Self> {
        check_page_size(size)?;
        self.paging = Some(Paging::Page { page, size });
        Ok(self)
    }

    pub fn offset(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.paging = Some(Paging::Offset { offset, limit });
        self
    }

    /// Emit an `info`-level summary when the query executes.
    pub fn verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    fn field_spec(&self, path: &str) -> QueryResult<&FieldSpec> {
        let root = path.split('.').next().unwrap_or(path);
        self.schema.field(root).ok_or_else(|| QueryError::UnknownField {
            model: self.schema.model_name.clone(),
            field: path.to_string(),
        })
    }

    /// Declared type used to interpret literals for `path`.
    pub(crate) fn field_type(&self, path: &str) -> QueryResult<FieldType> {
        if path.contains('.') {
            self.field_spec(path)?;
            return Ok(FieldType::Any);
        }
        Ok(match self.field_spec(path)? {
            FieldSpec::Attribute(attr) => attr.value_type,
            FieldSpec::Relation(rel) if rel.keys_are_ids() => FieldType::Id,
            FieldSpec::Relation(_) => FieldType::Any,
        })
    }

    fn coerce_target(&self, field: &str, op: Operator, value: Value) -> QueryResult<Value> {
        let field_type = self.field_type(field)?;
        let coerce = |v: Value| {
            field_type.coerce(v).map_err(|source| QueryError::Type {
                field: field.to_string(),
                source,
            })
        };
        match (field_type, op, value) {
            (FieldType::Any | FieldType::List | FieldType::Map, _, v) => Ok(v),
            (_, Operator::Contains, Value::List(items)) => {
                items.into_iter().map(coerce).collect::<QueryResult<Vec<_>>>().map(Value::List)
            }
            (_, Operator::Contains, v) => Ok(v),
            (_, _, v) => coerce(v),
        }
    }

    // ---------------------------------------------------------------
    // Terminal operations
    // ---------------------------------------------------------------

    /// Execute and return every row.
    pub fn all(&mut self) -> QueryResult<Vec<Row>> {
        self.execute()
    }

    /// Execute and return the matching records.
    pub fn collect(&mut self) -> QueryResult<Vec<Record>> {
        if let Some(field) = &self.projection {
            return Err(QueryError::Projected(field.clone()));
        }
        Ok(self.execute()?.into_iter().filter_map(Row::into_record).collect())
    }

    pub fn count(&mut self) -> QueryResult<usize> {
        Ok(self.execute()?.len())
    }

    pub fn len(&mut self) -> QueryResult<usize> {
        self.count()
    }

    /// Execute and return the row at `index`.
    pub fn get(&mut self, index: usize) -> QueryResult<Option<Row>> {
        Ok(self.execute()?.into_iter().nth(index))
    }

    pub fn first(&mut self) -> QueryResult<Option<Row>> {
        self.get(0)
    }

    pub fn last(&mut self) -> QueryResult<Option<Row>> {
        Ok(self.execute()?.pop())
    }

    /// Execute with `(page, size)` pagination.
    pub fn paginate(&mut self, page: i64, size: usize) -> QueryResult<Vec<Row>> {
        check_page_size(size)?;
        self.paging = Some(Paging::Page { page, size });
        self.execute()
    }

    pub fn iter(&mut self) -> QueryResult<std::vec::IntoIter<Row>> {
        Ok(self.execute()?.into_iter())
    }

    /// Render rows with this query's response shape.
    pub fn render(&self, rows: &[Row]) -> serde_json::Value {
        self.shape.render(rows, self.db)
    }

    fn execute(&mut self) -> QueryResult<Vec<Row>> {
        if self.executed {
            return Err(QueryError::AlreadyExecuted);
        }
        if let Some(field) = &self.pending {
            return Err(QueryError::PendingField(field.clone()));
        }
        self.executed = true;
        let started = Instant::now();
        let model = self.schema.model_name.as_str();

        let (seeded, remaining): (Vec<&Condition>, Vec<&Condition>) = self
            .conditions
            .iter()
            .partition(|c| self.is_index_eligible(c));

        let mut candidates = match seeded.split_first() {
            None => self.db.lookup_by_model(model),
            Some((first, rest)) => {
                let mut ids = self.seed(first);
                for condition in rest {
                    if ids.is_empty() {
                        break;
                    }
                    let next = self.seed(condition);
                    ids.retain(|id| next.contains(id));
                }
                ids
            }
        };
        if let Some(subset) = &self.subset {
            candidates.retain(|id| subset.contains(id));
        }

        let mut records: Vec<Record> = self
            .db
            .fetch_entries(model, &candidates)
            .into_iter()
            .filter(|record| record.model_name() == model)
            .filter(|record| remaining.iter().all(|c| matches(record, c)))
            .collect();

        if let Some((field, order)) = &self.sort {
            records.sort_by(|a, b| sort_cmp(a.resolve_path(field), b.resolve_path(field), *order));
        }

        let rows: Vec<Row> = match &self.projection {
            Some(field) => records
                .into_iter()
                .map(|r| Row::Value(r.resolve_path(field).unwrap_or_default()))
                .collect(),
            None => records.into_iter().map(Row::Record).collect(),
        };
        let total = rows.len();
        let rows = match &self.paging {
            Some(paging) => apply_paging(rows, paging)?,
            None => rows,
        };

        let conditions: Vec<String> = self.conditions.iter().map(ToString::to_string).collect();
        let elapsed_us = started.elapsed().as_micros() as u64;
        if self.verbose {
            info!(
                model,
                ?conditions,
                seeded = seeded.len(),
                matched = total,
                returned = rows.len(),
                elapsed_us,
                "query executed"
            );
        } else {
            debug!(model, matched = total, returned = rows.len(), elapsed_us, "query executed");
        }
        Ok(rows)
    }

    fn is_index_eligible(&self, condition: &Condition) -> bool {
        condition.op == Operator::Equals
            && !condition.is_nested()
            && (condition.field == ID || self.db.is_indexed(&self.schema.model_name, &condition.field))
    }

    fn seed(&self, condition: &Condition) -> BTreeSet<RecordId> {
        if condition.field == ID {
            return condition
                .value
                .as_str()
                .and_then(|s| RecordId::parse(s).ok())
                .into_iter()
                .collect();
        }
        self.db
            .lookup_by_field(&self.schema.model_name, &condition.field, &condition.value)
    }
}

fn matches(record: &Record, condition: &Condition) -> bool {
    record
        .resolve_path(&condition.field)
        .map_or(false, |actual| condition.op.evaluate(&actual, &condition.value))
}

fn check_page_size(size: usize) -> QueryResult<()> {
    if size == 0 {
        return Err(QueryError::MalformedPagination("page size must be positive".into()));
    }
    Ok(())
}

fn apply_paging(rows: Vec<Row>, paging: &Paging) -> QueryResult<Vec<Row>> {
    match *paging {
        Paging::Page { size: 0, .. } => {
            Err(QueryError::MalformedPagination("page size must be positive".into()))
        }
        Paging::Page { page, size } => {
            let index = if page < 0 {
                (rows.len() / size).saturating_sub(1)
            } else {
                usize::try_from(page).unwrap_or(usize::MAX)
            };
            Ok(rows
                .into_iter()
                .skip(index.saturating_mul(size))
                .take(size)
                .collect())
        }
        Paging::Offset { offset, limit } => Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect()),
    }
}

/// Sort rank of a value's kind. Values only order within a rank; missing and
/// null values sort last in either direction.
fn rank(value: &Value) -> u8 {
    match value {
        Value::Int(_) | Value::Float(_) => 0,
        Value::String(_) => 1,
        Value::Timestamp(_) => 2,
        Value::Bool(_) => 3,
        Value::List(_) | Value::Map(_) => 4,
        Value::Null => 5,
    }
}

fn sort_cmp(a: Option<Value>, b: Option<Value>, order: SortOrder) -> Ordering {
    let a = a.unwrap_or_default();
    let b = b.unwrap_or_default();
    let (ra, rb) = (rank(&a), rank(&b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    let within = match (&a, &b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            as_f64(&a).total_cmp(&as_f64(&b))
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    };
    match order {
        SortOrder::Ascending => within,
        SortOrder::Descending => within.reverse(),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsdb_record::{document_from_json, Document};
    use hsdb_schema::{AttributeSpec, ModelDefinition, RelationSpec, SchemaRegistry};
    use hsdb_types::FieldType;
    use serde_json::json;

    fn db() -> IndexDatabase {
        IndexDatabase::new(Arc::new(
            SchemaRegistry::builder()
                .model(
                    ModelDefinition::new("School")
                        .attribute(AttributeSpec::new("name", FieldType::String).required().indexed()),
                )
                .model(
                    ModelDefinition::new("Student")
                        .attribute(AttributeSpec::new("name", FieldType::String).required())
                        .attribute(AttributeSpec::new("age", FieldType::Integer).indexed())
                        .attribute(AttributeSpec::new("height", FieldType::Float))
                        .attribute(AttributeSpec::new("enrolled", FieldType::Timestamp))
                        .attribute(AttributeSpec::new("address", FieldType::Map))
                        .relation(RelationSpec::many_to_one("school", "School")),
                )
                .build()
                .unwrap(),
        ))
    }

    fn doc(json: serde_json::Value) -> Document {
        document_from_json(json).unwrap()
    }

    fn student(db: &IndexDatabase, name: &str, age: i64, height: f64) -> Record {
        db.create_entry("Student", doc(json!({"name": name, "age": age, "height": height})))
            .unwrap()
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.value("name").unwrap().to_string())
            .collect()
    }

    fn seeded_db() -> IndexDatabase {
        let db = db();
        student(&db, "Cleo", 15, 140.0);
        student(&db, "Ada", 17, 160.0);
        student(&db, "Bea", 14, 145.0);
        student(&db, "Dan", 17, 170.0);
        student(&db, "Eve", 15, 155.0);
        db
    }

    #[test]
    fn greater_than_scans_unindexed_field() {
        let db = seeded_db();
        let found = Query::new(&db, "Student")
            .unwrap()
            .where_("height")
            .unwrap()
            .greater_than(158)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(names(&found), vec!["Ada", "Dan"]);
    }

    #[test]
    fn equality_on_indexed_field_matches_scan() {
        let db = seeded_db();
        let seeded = Query::new(&db, "Student")
            .unwrap()
            .where_("age")
            .unwrap()
            .equals(17)
            .unwrap()
            .collect()
            .unwrap();
        let scanned = Query::new(&db, "Student")
            .unwrap()
            .where_("age")
            .unwrap()
            .greater_than_or_equals(17)
            .unwrap()
            .where_("age")
            .unwrap()
            .less_than_or_equals(17)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(seeded, scanned);
        assert_eq!(names(&seeded), vec!["Ada", "Dan"]);
    }

    #[test]
    fn composed_conditions_sort_and_paginate() {
        let db = seeded_db();
        let rows = Query::new(&db, "Student")
            .unwrap()
            .where_("height")
            .unwrap()
            .less_than(150)
            .unwrap()
            .where_("age")
            .unwrap()
            .less_than(16)
            .unwrap()
            .sort_by("name")
            .unwrap()
            .paginate(0, 10)
            .unwrap();
        assert!(rows.len() <= 10);
        let records: Vec<Record> = rows.into_iter().filter_map(Row::into_record).collect();
        assert_eq!(names(&records), vec!["Bea", "Cleo"]);
        for r in &records {
            assert!(r.value("height").unwrap().compare(&Value::Int(150)) == Some(Ordering::Less));
            assert!(r.value("age").unwrap().compare(&Value::Int(16)) == Some(Ordering::Less));
        }
    }

    #[test]
    fn descending_sort() {
        let db = seeded_db();
        let found = Query::new(&db, "Student").unwrap().sort_by_desc("height").unwrap().collect().unwrap();
        assert_eq!(names(&found), vec!["Dan", "Ada", "Eve", "Bea", "Cleo"]);
    }

    #[test]
    fn sort_is_stable_and_puts_missing_last() {
        let db = seeded_db();
        db.create_entry("Student", doc(json!({"name": "Zed"}))).unwrap();
        let found = Query::new(&db, "Student").unwrap().sort_by("age").unwrap().collect().unwrap();
        assert_eq!(names(&found), vec!["Bea", "Cleo", "Eve", "Ada", "Dan", "Zed"]);
        let found = Query::new(&db, "Student").unwrap().sort_by_desc("age").unwrap().collect().unwrap();
        assert_eq!(names(&found), vec!["Ada", "Dan", "Cleo", "Eve", "Bea", "Zed"]);
    }

    #[test]
    fn negative_page_selects_last_page() {
        let db = db();
        for i in 0..25 {
            student(&db, &format!("s{i:02}"), 10, 100.0);
        }
        let last = Query::new(&db, "Student").unwrap().paginate(-1, 10).unwrap();
        let explicit = Query::new(&db, "Student").unwrap().paginate(1, 10).unwrap();
        assert_eq!(last, explicit);

        let empty = self::db();
        assert!(Query::new(&empty, "Student").unwrap().paginate(-1, 10).unwrap().is_empty());
    }

    #[test]
    fn zero_page_size_is_malformed() {
        let db = seeded_db();
        assert!(matches!(
            Query::new(&db, "Student").unwrap().paginate(0, 0),
            Err(QueryError::MalformedPagination(_))
        ));
        assert!(Query::new(&db, "Student").unwrap().page(0, 0).is_err());
    }

    #[test]
    fn offset_paging() {
        let db = seeded_db();
        let mut q = Query::new(&db, "Student").unwrap().sort_by("name").unwrap().offset(1, Some(2));
        assert_eq!(names(&q.collect().unwrap()), vec!["Bea", "Cleo"]);
    }

    #[test]
    fn projection_happens_after_sort() {
        let db = seeded_db();
        let rows = Query::new(&db, "Student")
            .unwrap()
            .sort_by("height")
            .unwrap()
            .filter_by("name")
            .unwrap()
            .all()
            .unwrap();
        let values: Vec<Value> = rows.iter().map(Row::value).collect();
        assert_eq!(values[0], Value::from("Cleo"));
        assert_eq!(values.len(), 5);
    }

    #[test]
    fn collect_refuses_projected_queries() {
        let db = seeded_db();
        let mut q = Query::new(&db, "Student").unwrap().filter_by("age").unwrap();
        assert!(matches!(q.collect(), Err(QueryError::Projected(_))));
    }

    #[test]
    fn executing_twice_fails() {
        let db = seeded_db();
        let mut q = Query::new(&db, "Student").unwrap();
        assert_eq!(q.count().unwrap(), 5);
        assert!(matches!(q.count(), Err(QueryError::AlreadyExecuted)));
        assert!(matches!(q.first(), Err(QueryError::AlreadyExecuted)));
    }

    #[test]
    fn operator_without_where_fails() {
        let db = seeded_db();
        let err = Query::new(&db, "Student").unwrap().equals(3).unwrap_err();
        assert!(matches!(err, QueryError::NoPendingField("equals")));
    }

    #[test]
    fn where_twice_fails() {
        let db = seeded_db();
        let err = Query::new(&db, "Student")
            .unwrap()
            .where_("age")
            .unwrap()
            .where_("name")
            .unwrap_err();
        assert!(matches!(err, QueryError::PendingField(f) if f == "age"));
    }

    #[test]
    fn dangling_where_fails_at_execution() {
        let db = seeded_db();
        let mut q = Query::new(&db, "Student").unwrap().where_("age").unwrap();
        assert!(matches!(q.all(), Err(QueryError::PendingField(_))));
    }

    #[test]
    fn unknown_fields_and_models_fail() {
        let db = seeded_db();
        assert!(matches!(
            Query::new(&db, "Student").unwrap().where_("nickname"),
            Err(QueryError::UnknownField { .. })
        ));
        let err = Query::new(&db, "Teacher").unwrap_err();
        assert_eq!(err.status(), hsdb_types::Status::NotFound);
    }

    #[test]
    fn literal_is_coerced_by_field_type() {
        let db = seeded_db();
        assert!(matches!(
            Query::new(&db, "Student").unwrap().where_("age").unwrap().equals("old"),
            Err(QueryError::Type { .. })
        ));
        let found = Query::new(&db, "Student")
            .unwrap()
            .where_("age")
            .unwrap()
            .equals(17.0)
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(found, 2);
    }

    #[test]
    fn timestamps_compare_after_coercion() {
        let db = db();
        db.create_entry("Student", doc(json!({"name": "Old", "enrolled": "2020-09-01T00:00:00Z"})))
            .unwrap();
        db.create_entry("Student", doc(json!({"name": "New", "enrolled": "2024-09-01T00:00:00Z"})))
            .unwrap();
        let found = Query::new(&db, "Student")
            .unwrap()
            .where_("enrolled")
            .unwrap()
            .greater_than("2022-01-01T00:00:00Z")
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(names(&found), vec!["New"]);
    }

    #[test]
    fn contains_means_membership() {
        let db = seeded_db();
        let found = Query::new(&db, "Student")
            .unwrap()
            .where_("age")
            .unwrap()
            .contains(vec![14i64, 17])
            .unwrap()
            .sort_by("name")
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(names(&found), vec!["Ada", "Bea", "Dan"]);
    }

    #[test]
    fn dotted_paths_filter_nested_values() {
        let db = db();
        db.create_entry("Student", doc(json!({"name": "Ada", "address": {"city": "Paris"}})))
            .unwrap();
        db.create_entry("Student", doc(json!({"name": "Bea", "address": {"city": "Rome"}})))
            .unwrap();
        let found = Query::new(&db, "Student")
            .unwrap()
            .where_("address.city")
            .unwrap()
            .equals("Rome")
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(names(&found), vec!["Bea"]);
    }

    #[test]
    fn id_equality_seeds_directly() {
        let db = seeded_db();
        let target = student(&db, "Fay", 12, 130.0);
        let found = Query::new(&db, "Student")
            .unwrap()
            .where_("id")
            .unwrap()
            .equals(target.id().to_string())
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(found, vec![target]);
    }

    #[test]
    fn subset_constrains_candidates() {
        let db = seeded_db();
        let ada = Query::new(&db, "Student")
            .unwrap()
            .where_("name")
            .unwrap()
            .equals("Ada")
            .unwrap()
            .collect()
            .unwrap();
        let found = Query::new(&db, "Student")
            .unwrap()
            .subset(BTreeSet::from([ada[0].id(), RecordId::new()]))
            .collect()
            .unwrap();
        assert_eq!(found, ada);
    }

    #[test]
    fn type_check_excludes_other_models() {
        let db = seeded_db();
        let school = db.create_entry("School", doc(json!({"name": "Lincoln"}))).unwrap();
        let found = Query::new(&db, "Student")
            .unwrap()
            .subset(BTreeSet::from([school.id()]))
            .collect()
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn first_and_last_follow_sort() {
        let db = seeded_db();
        let mut q = Query::new(&db, "Student").unwrap().sort_by("name").unwrap();
        let first = q.first().unwrap().unwrap();
        assert_eq!(first.as_record().unwrap().value("name"), Some(Value::from("Ada")));
        let mut q = Query::new(&db, "Student").unwrap().sort_by("name").unwrap();
        let last = q.last().unwrap().unwrap();
        assert_eq!(last.as_record().unwrap().value("name"), Some(Value::from("Eve")));
    }

    #[test]
    fn verbose_queries_still_return_rows() {
        let db = seeded_db();
        let mut q = Query::new(&db, "Student").unwrap().verbose(true);
        assert_eq!(q.iter().unwrap().count(), 5);
    }
}

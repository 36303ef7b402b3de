//! Class operations for one model.

use std::sync::Arc;

use hsdb_query::{reverse, Query, RelationExt};
use hsdb_record::{document_from_json, Document, Record, SerializeOptions};
use hsdb_schema::ModelSchema;
use hsdb_types::{RecordId, Value};
use tracing::debug;

use crate::db::Hsdb;
use crate::error::{SdkError, SdkResult};

/// A model bound to an open store: `db.model("Student")?`.
#[derive(Clone, Debug)]
pub struct Model<'db> {
    db: &'db Hsdb,
    schema: Arc<ModelSchema>,
}

impl<'db> Model<'db> {
    pub(crate) fn new(db: &'db Hsdb, schema: Arc<ModelSchema>) -> Self {
        Self { db, schema }
    }

    pub fn name(&self) -> &str {
        &self.schema.model_name
    }

    /// The assembled field and relation specifications.
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Validate `data` into an unsaved record.
    pub fn build(&self, data: serde_json::Value) -> SdkResult<Record> {
        Ok(Record::new(Arc::clone(&self.schema), document_from_json(data)?)?)
    }

    /// Validate, index and persist a new record.
    pub fn create(&self, data: serde_json::Value) -> SdkResult<Record> {
        self.create_document(document_from_json(data)?)
    }

    pub fn create_document(&self, data: Document) -> SdkResult<Record> {
        Ok(self.db.storage().create_entry(self.name(), data, true)?)
    }

    /// The record with `id`, if it exists and belongs to this model.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.db
            .storage()
            .fetch_entry(id)
            .filter(|record| record.model_name() == self.name())
    }

    /// Every live record of this model, in creation order.
    pub fn all(&self) -> Vec<Record> {
        self.db.storage().fetch_model_entries(self.name())
    }

    /// Records whose `field` equals `value`.
    ///
    /// Indexed fields are answered from the field index; anything else is
    /// a scan of the model's records.
    pub fn find_by(&self, field: &str, value: impl Into<Value>) -> SdkResult<Vec<Record>> {
        let value = value.into();
        let index = self.db.storage().index();
        if let Some(spec) = self.schema.attribute(field).filter(|_| index.is_indexed(self.name(), field)) {
            let value = spec.value_type.coerce(value).map_err(|source| hsdb_query::QueryError::Type {
                field: field.to_string(),
                source,
            })?;
            let ids = index.lookup_by_field(self.name(), field, &value);
            debug!(model = %self.name(), field, hits = ids.len(), "find_by via field index");
            return Ok(index.fetch_entries(self.name(), &ids));
        }
        debug!(model = %self.name(), field, "find_by via scan");
        Ok(self.query()?.where_(field)?.equals(value)?.collect()?)
    }

    /// Number of live records, from the model index.
    pub fn count(&self) -> usize {
        self.db.storage().count(self.name())
    }

    /// Insert `record` if its id is new, else copy its editable fields onto
    /// the stored record.
    pub fn save(&self, record: Record) -> SdkResult<Record> {
        self.check_owner(&record)?;
        Ok(self.db.storage().save(record, true)?)
    }

    /// Apply a JSON object to the record with `id`.
    pub fn update(&self, id: &RecordId, data: serde_json::Value) -> SdkResult<Record> {
        let current = self.get(id).ok_or(hsdb_index::IndexError::NotFound(*id))?;
        Ok(self
            .db
            .storage()
            .update_entry(&current.id(), document_from_json(data)?, true)?)
    }

    /// Delete the record with `id`. Returns `false` if there was none.
    ///
    /// Records referring to it are left in place.
    pub fn delete(&self, id: &RecordId) -> SdkResult<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.db.delete(id)
    }

    /// Flatten `record` to JSON, expanding relations against this store
    /// when asked.
    pub fn serialize(&self, record: &Record, options: &SerializeOptions) -> serde_json::Value {
        record.serialize(options, Some(self.db.storage().index()))
    }

    /// A new query over this model.
    pub fn query(&self) -> SdkResult<Query<'db>> {
        Ok(self.db.storage().query(self.name())?)
    }

    /// A query built from the parameter grammar, for adapters.
    pub fn query_params<I, K, V>(&self, params: I) -> SdkResult<Query<'db>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(self.db.storage().query_params(self.name(), params)?)
    }

    /// The query a relation field of `record` points at.
    pub fn resolve(&self, record: &Record, relation: &str) -> SdkResult<Query<'db>> {
        self.check_owner(record)?;
        let handle = record
            .relation(relation)
            .ok_or_else(|| hsdb_query::QueryError::UnknownField {
                model: self.name().to_string(),
                field: relation.to_string(),
            })?;
        Ok(handle.resolve(self.db.storage().index())?.verbose(self.verbose()))
    }

    /// The records of other models whose relation named by the reverse
    /// lookup `name` points at `record`.
    pub fn reverse(&self, record: &Record, name: &str) -> SdkResult<Query<'db>> {
        self.check_owner(record)?;
        Ok(reverse(self.db.storage().index(), record, name)?.verbose(self.verbose()))
    }

    fn verbose(&self) -> bool {
        self.db.storage().verbose_queries()
    }

    fn check_owner(&self, record: &Record) -> SdkResult<()> {
        if record.model_name() == self.name() {
            Ok(())
        } else {
            Err(SdkError::WrongModel {
                expected: self.name().to_string(),
                found: record.model_name().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HsdbConfig;
    use hsdb_query::Row;
    use hsdb_schema::{AttributeSpec, ModelDefinition, RelationSpec, SchemaRegistry};
    use hsdb_types::{FieldType, Status};
    use proptest::prelude::*;
    use serde_json::json;

    fn open() -> Hsdb {
        let registry = SchemaRegistry::builder()
            .model(
                ModelDefinition::new("School")
                    .attribute(AttributeSpec::new("name", FieldType::String).required().indexed()),
            )
            .model(
                ModelDefinition::new("Student")
                    .attribute(AttributeSpec::new("name", FieldType::String).required())
                    .attribute(AttributeSpec::new("age", FieldType::Integer).indexed())
                    .attribute(AttributeSpec::new("height", FieldType::Float))
                    .attribute(AttributeSpec::new("nickname", FieldType::String).read_only())
                    .relation(RelationSpec::many_to_one("school", "School").reverse("students")),
            )
            .build()
            .unwrap();
        Hsdb::open_with_registry(HsdbConfig::default(), Arc::new(registry)).unwrap()
    }

    fn records(rows: Vec<Row>) -> Vec<Record> {
        rows.into_iter().filter_map(Row::into_record).collect()
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.value("name").and_then(|v| v.as_str().map(str::to_string)))
            .collect()
    }

    #[test]
    fn scenario_find_filter_and_count() {
        let db = open();
        let schools = db.model("School").unwrap();
        let students = db.model("Student").unwrap();
        let lincoln = schools.create(json!({"name": "Lincoln High"})).unwrap();
        let ada = students
            .create(json!({"name": "Ada", "age": 17, "height": 160, "school": lincoln.id().to_string()}))
            .unwrap();

        assert_eq!(students.find_by("age", 17).unwrap(), vec![ada.clone()]);
        assert_eq!(
            students.query().unwrap().where_("height").unwrap().greater_than(150).unwrap().collect().unwrap(),
            vec![ada]
        );
        assert_eq!(schools.count(), 1);
    }

    #[test]
    fn scenario_composed_conditions() {
        let db = open();
        let students = db.model("Student").unwrap();
        let rows = [
            ("Zed", 12, 140.0),
            ("Amy", 15, 149.5),
            ("Bob", 17, 130.0),
            ("Cal", 10, 155.0),
            ("Dee", 11, 120.0),
        ];
        for (name, age, height) in rows {
            students.create(json!({"name": name, "age": age, "height": height})).unwrap();
        }
        let page = students
            .query()
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
        let page = records(page);
        assert!(page.len() <= 10);
        assert_eq!(names(&page), vec!["Amy", "Dee", "Zed"]);
        for record in &page {
            assert!(record.value("height").unwrap().compare(&Value::Int(150)) == Some(std::cmp::Ordering::Less));
            assert!(record.value("age").unwrap().compare(&Value::Int(16)) == Some(std::cmp::Ordering::Less));
        }
    }

    #[test]
    fn scenario_negative_page() {
        let db = open();
        let students = db.model("Student").unwrap();
        assert!(students.query().unwrap().paginate(-1, 10).unwrap().is_empty());

        for i in 0..25 {
            students.create(json!({"name": format!("s{i:02}"), "age": i})).unwrap();
        }
        let total = students.count();
        let expected_page = (total / 10).saturating_sub(1) as i64;
        let last = records(students.query().unwrap().sort_by("name").unwrap().paginate(-1, 10).unwrap());
        let same = records(
            students
                .query()
                .unwrap()
                .sort_by("name")
                .unwrap()
                .paginate(expected_page, 10)
                .unwrap(),
        );
        assert_eq!(last, same);
        assert_eq!(names(&last).first().map(String::as_str), Some("s10"));
    }

    #[test]
    fn scenario_relation_resolution() {
        let db = open();
        let schools = db.model("School").unwrap();
        let students = db.model("Student").unwrap();
        schools.create(json!({"name": "Roosevelt"})).unwrap();
        let lincoln = schools.create(json!({"name": "Lincoln High"})).unwrap();
        schools.create(json!({"name": "Jefferson"})).unwrap();
        let ada = students
            .create(json!({"name": "Ada", "school": lincoln.id().to_string()}))
            .unwrap();

        let resolved = records(students.resolve(&ada, "school").unwrap().all().unwrap());
        assert_eq!(resolved, vec![lincoln.clone()]);

        let owners = schools.reverse(&lincoln, "students").unwrap().collect().unwrap();
        assert_eq!(owners, vec![ada]);
    }

    #[test]
    fn deleting_a_school_leaves_its_students() {
        let db = open();
        let schools = db.model("School").unwrap();
        let students = db.model("Student").unwrap();
        let lincoln = schools.create(json!({"name": "Lincoln High"})).unwrap();
        let ada = students
            .create(json!({"name": "Ada", "school": lincoln.id().to_string()}))
            .unwrap();

        assert!(schools.delete(&lincoln.id()).unwrap());
        assert_eq!(students.get(&ada.id()), Some(ada.clone()));
        assert!(students.resolve(&ada, "school").unwrap().collect().unwrap().is_empty());
    }

    #[test]
    fn get_is_scoped_to_the_model() {
        let db = open();
        let lincoln = db.model("School").unwrap().create(json!({"name": "Lincoln High"})).unwrap();
        assert!(db.model("Student").unwrap().get(&lincoln.id()).is_none());
        assert!(!db.model("Student").unwrap().delete(&lincoln.id()).unwrap());
        assert_eq!(db.model("School").unwrap().count(), 1);
    }

    #[test]
    fn find_by_scans_unindexed_fields() {
        let db = open();
        let students = db.model("Student").unwrap();
        let ada = students.create(json!({"name": "Ada", "height": 160})).unwrap();
        students.create(json!({"name": "Bob", "height": 150})).unwrap();
        assert_eq!(students.find_by("height", 160).unwrap(), vec![ada]);
        assert!(students.find_by("age", 17).unwrap().is_empty());
        assert!(students.find_by("shoe_size", 9).is_err());
    }

    #[test]
    fn update_refuses_read_only_fields_and_restamps() {
        let db = open();
        let students = db.model("Student").unwrap();
        let ada = students.create(json!({"name": "Ada", "age": 17})).unwrap();

        let err = students.update(&ada.id(), json!({"nickname": "A"})).unwrap_err();
        assert_eq!(err.status(), Status::Internal);

        let updated = students.update(&ada.id(), json!({"age": 18})).unwrap();
        assert!(updated.created_at() <= updated.updated_at());
        assert!(students.find_by("age", 17).unwrap().is_empty());
        assert_eq!(students.find_by("age", 18).unwrap(), vec![updated]);
    }

    #[test]
    fn save_inserts_and_updates() {
        let db = open();
        let students = db.model("Student").unwrap();
        let mut ada = students.build(json!({"name": "Ada", "age": 17})).unwrap();
        assert_eq!(students.count(), 0);
        students.save(ada.clone()).unwrap();
        assert_eq!(students.count(), 1);

        ada.apply_update(document_from_json(json!({"age": 18})).unwrap()).unwrap();
        students.save(ada.clone()).unwrap();
        assert_eq!(students.count(), 1);
        assert_eq!(students.get(&ada.id()).unwrap().value("age"), Some(Value::Int(18)));

        let lincoln = db.model("School").unwrap().build(json!({"name": "Lincoln High"})).unwrap();
        assert!(matches!(students.save(lincoln), Err(SdkError::WrongModel { .. })));
    }

    #[test]
    fn serialize_expands_relations_one_level() {
        let db = open();
        let schools = db.model("School").unwrap();
        let students = db.model("Student").unwrap();
        let lincoln = schools.create(json!({"name": "Lincoln High"})).unwrap();
        let ada = students
            .create(json!({"name": "Ada", "school": lincoln.id().to_string()}))
            .unwrap();

        let ids = students.serialize(&ada, &SerializeOptions::default());
        assert_eq!(ids["school"], json!(lincoln.id().to_string()));
        let expanded = students.serialize(&ada, &SerializeOptions::expand_relations());
        assert_eq!(expanded["school"]["name"], json!("Lincoln High"));
        let omitted = students.serialize(&ada, &SerializeOptions::omit_relations());
        assert!(omitted.get("school").is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn fetched_records_serialize_to_their_input(
            name in "[A-Za-z]{1,12}",
            age in 0i64..120,
            height in 50.0f64..250.0,
        ) {
            let db = open();
            let students = db.model("Student").unwrap();
            let created = students.create(json!({"name": &name, "age": age, "height": height})).unwrap();
            let fetched = students.get(&created.id()).unwrap();
            let out = students.serialize(&fetched, &SerializeOptions::default());
            prop_assert_eq!(&out["name"], &json!(name));
            prop_assert_eq!(&out["age"], &json!(age));
            prop_assert_eq!(&out["height"], &json!(height));
            prop_assert!(fetched.created_at() <= fetched.updated_at());
        }
    }
}

//! The schema registry: every model's assembled schema, built once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::definition::{ModelDefinition, SchemaDocument};
use crate::error::{SchemaError, SchemaResult};
use crate::field::{FieldSpec, RelationSpec};
use crate::model::{base_fields, is_base_field, ModelSchema};

/// Immutable map from model name to its assembled [`ModelSchema`].
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    models: BTreeMap<String, Arc<ModelSchema>>,
    plurals: HashMap<String, String>,
}

impl SchemaRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn from_document(doc: SchemaDocument) -> SchemaResult<Self> {
        doc.models
            .into_iter()
            .fold(Self::builder(), RegistryBuilder::model)
            .build()
    }

    pub fn get(&self, model: &str) -> Option<Arc<ModelSchema>> {
        self.models.get(model).cloned()
    }

    /// Like [`SchemaRegistry::get`], failing with `UnknownModel`.
    pub fn require(&self, model: &str) -> SchemaResult<Arc<ModelSchema>> {
        self.get(model)
            .ok_or_else(|| SchemaError::UnknownModel(model.to_string()))
    }

    /// Resolve a model from its plural resource name (the first segment of a
    /// storage path).
    pub fn by_plural(&self, plural: &str) -> Option<Arc<ModelSchema>> {
        self.plurals.get(plural).and_then(|name| self.get(name))
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Arc<ModelSchema>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Find the relation exposed on `secondary` under the reverse lookup
    /// name `name`, returning the owning model and the relation.
    pub fn reverse_relation(
        &self,
        secondary: &str,
        name: &str,
    ) -> Option<(Arc<ModelSchema>, RelationSpec)> {
        let target = self.get(secondary)?;
        target
            .reverse_relation(name, self.models.values().map(Arc::as_ref))
            .and_then(|(owner, rel)| Some((self.get(&owner.model_name)?, rel.clone())))
    }
}

/// Collects definitions, then assembles them into a [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: Vec<ModelDefinition>,
}

impl RegistryBuilder {
    pub fn model(mut self, definition: ModelDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> SchemaResult<SchemaRegistry> {
        let mut by_name: HashMap<&str, &ModelDefinition> = HashMap::new();
        for def in &self.definitions {
            if by_name.insert(def.name.as_str(), def).is_some() {
                return Err(SchemaError::DuplicateModel(def.name.clone()));
            }
            check_own_fields(def)?;
        }

        let mut registry = SchemaRegistry::default();
        for def in &self.definitions {
            let chain = ancestry(def, &by_name)?;
            let fields = collect_fields(&chain);
            for field in &fields {
                validate_field(&def.name, field, &by_name)?;
            }
            let ancestry_names = chain.iter().map(|d| d.name.clone()).collect();
            let schema = ModelSchema::new(def.name.clone(), ancestry_names, fields);

            if let Some(first) = registry
                .plurals
                .insert(schema.resource_name_plural.clone(), def.name.clone())
            {
                return Err(SchemaError::PluralCollision {
                    plural: schema.resource_name_plural.clone(),
                    first,
                    second: def.name.clone(),
                });
            }
            debug!(
                model = %def.name,
                fields = schema.fields().len(),
                plural = %schema.resource_name_plural,
                "assembled model schema"
            );
            registry.models.insert(def.name.clone(), Arc::new(schema));
        }
        Ok(registry)
    }
}

fn check_own_fields(def: &ModelDefinition) -> SchemaResult<()> {
    let mut seen = HashSet::new();
    for field in def.fields() {
        let name = field.name().to_string();
        if is_base_field(&name) {
            return Err(SchemaError::ReservedField {
                model: def.name.clone(),
                field: name,
            });
        }
        if !seen.insert(name.clone()) {
            return Err(SchemaError::DuplicateField {
                model: def.name.clone(),
                field: name,
            });
        }
    }
    Ok(())
}

/// Definitions from the root ancestor down to `def`.
fn ancestry<'a>(
    def: &'a ModelDefinition,
    by_name: &HashMap<&str, &'a ModelDefinition>,
) -> SchemaResult<Vec<&'a ModelDefinition>> {
    let mut chain = vec![def];
    let mut visited = HashSet::from([def.name.as_str()]);
    let mut current = def;
    while let Some(parent) = current.extends.as_deref() {
        let parent_def = by_name
            .get(parent)
            .copied()
            .ok_or_else(|| SchemaError::UnknownParent {
                model: current.name.clone(),
                parent: parent.to_string(),
            })?;
        if !visited.insert(parent_def.name.as_str()) {
            return Err(SchemaError::AncestryCycle(def.name.clone()));
        }
        chain.push(parent_def);
        current = parent_def;
    }
    chain.reverse();
    Ok(chain)
}

/// Walk root to leaf; a redeclaration replaces the inherited spec in place,
/// so the most-derived declaration wins while keeping the inherited position.
fn collect_fields(chain: &[&ModelDefinition]) -> Vec<FieldSpec> {
    let mut fields = base_fields();
    let mut positions: HashMap<String, usize> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name().to_string(), i))
        .collect();
    for def in chain {
        for mut field in def.fields() {
            field.flags_mut().normalize();
            match positions.get(field.name()) {
                Some(&pos) => fields[pos] = field,
                None => {
                    positions.insert(field.name().to_string(), fields.len());
                    fields.push(field);
                }
            }
        }
    }
    fields
}

fn validate_field(
    model: &str,
    field: &FieldSpec,
    by_name: &HashMap<&str, &ModelDefinition>,
) -> SchemaResult<()> {
    let invalid = |reason: &str| SchemaError::InvalidField {
        model: model.to_string(),
        field: field.name().to_string(),
        reason: reason.to_string(),
    };
    match field {
        FieldSpec::Attribute(attr) => {
            if attr.flags.computed && attr.flags.required && attr.default.is_none() {
                return Err(invalid("computed fields cannot be required without a default"));
            }
            if let Some(default) = &attr.default {
                attr.value_type
                    .coerce(default.clone())
                    .map_err(|e| invalid(&format!("default does not match type: {e}")))?;
            }
        }
        FieldSpec::Relation(rel) => {
            if rel.flags.computed {
                return Err(invalid("relations cannot be computed"));
            }
            if !by_name.contains_key(rel.secondary_model.as_str()) {
                return Err(SchemaError::UnknownRelationTarget {
                    model: model.to_string(),
                    relation: rel.name.clone(),
                    target: rel.secondary_model.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{AttributeSpec, RelationSpec};
    use hsdb_types::FieldType;

    fn school() -> ModelDefinition {
        ModelDefinition::new("School")
            .attribute(AttributeSpec::new("name", FieldType::String).required().indexed())
    }

    fn student() -> ModelDefinition {
        ModelDefinition::new("Student")
            .attribute(AttributeSpec::new("name", FieldType::String).required())
            .attribute(AttributeSpec::new("age", FieldType::Integer).indexed())
            .relation(RelationSpec::many_to_one("school", "School").reverse("students"))
    }

    #[test]
    fn unique_fields_from_a_schema_file_are_indexed() {
        let doc = SchemaDocument::from_toml_str(
            r#"
[[models]]
name = "School"

[[models.attributes]]
name = "code"
type = "string"
unique = true
"#,
        )
        .unwrap();
        let registry = SchemaRegistry::from_document(doc).unwrap();
        let school = registry.require("School").unwrap();
        assert!(school.is_indexed("code"));
        assert_eq!(school.indexed_attributes().count(), 1);
    }

    #[test]
    fn builds_registry_with_base_fields() {
        let registry = SchemaRegistry::builder().model(school()).model(student()).build().unwrap();
        assert_eq!(registry.len(), 2);
        let schema = registry.require("Student").unwrap();
        let names: Vec<&str> = schema.fields().iter().map(FieldSpec::name).collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at", "name", "age", "school"]);
    }

    #[test]
    fn most_derived_declaration_wins() {
        let base = ModelDefinition::new("Person")
            .attribute(AttributeSpec::new("name", FieldType::String))
            .attribute(AttributeSpec::new("age", FieldType::Integer));
        let derived = ModelDefinition::new("Teacher")
            .extends("Person")
            .attribute(AttributeSpec::new("name", FieldType::String).required().indexed())
            .attribute(AttributeSpec::new("subject", FieldType::String));
        let registry = SchemaRegistry::builder().model(base).model(derived).build().unwrap();

        let teacher = registry.require("Teacher").unwrap();
        let name = teacher.attribute("name").unwrap();
        assert!(name.flags.required, "derived redefinition must shadow the base one");
        assert!(name.flags.indexed);

        let names: Vec<&str> = teacher.fields().iter().map(FieldSpec::name).collect();
        assert_eq!(names, vec!["id", "created_at", "updated_at", "name", "age", "subject"]);
        assert_eq!(teacher.ancestry, vec!["Person".to_string(), "Teacher".to_string()]);
        assert!(!registry.require("Person").unwrap().attribute("name").unwrap().flags.required);
    }

    #[test]
    fn three_level_ancestry() {
        let a = ModelDefinition::new("A").attribute(AttributeSpec::new("x", FieldType::Integer));
        let b = ModelDefinition::new("B")
            .extends("A")
            .attribute(AttributeSpec::new("x", FieldType::Float));
        let c = ModelDefinition::new("C")
            .extends("B")
            .attribute(AttributeSpec::new("x", FieldType::String));
        let registry = SchemaRegistry::builder().model(c).model(a).model(b).build().unwrap();
        assert_eq!(registry.require("C").unwrap().attribute("x").unwrap().value_type, FieldType::String);
        assert_eq!(registry.require("B").unwrap().attribute("x").unwrap().value_type, FieldType::Float);
    }

    #[test]
    fn rejects_duplicate_models() {
        let err = SchemaRegistry::builder().model(school()).model(school()).build().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateModel(name) if name == "School"));
    }

    #[test]
    fn rejects_unknown_parent() {
        let err = SchemaRegistry::builder()
            .model(ModelDefinition::new("Orphan").extends("Nobody"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownParent { .. }));
    }

    #[test]
    fn rejects_ancestry_cycle() {
        let err = SchemaRegistry::builder()
            .model(ModelDefinition::new("A").extends("B"))
            .model(ModelDefinition::new("B").extends("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::AncestryCycle(_)));
    }

    #[test]
    fn rejects_base_field_redefinition() {
        let err = SchemaRegistry::builder()
            .model(ModelDefinition::new("X").attribute(AttributeSpec::new("id", FieldType::String)))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::ReservedField { .. }));
    }

    #[test]
    fn rejects_duplicate_field_in_one_definition() {
        let err = SchemaRegistry::builder()
            .model(
                ModelDefinition::new("X")
                    .attribute(AttributeSpec::new("a", FieldType::String))
                    .relation(RelationSpec::many_to_one("a", "X")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn rejects_relation_to_unknown_model() {
        let err = SchemaRegistry::builder().model(student()).build().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownRelationTarget { target, .. } if target == "School"));
    }

    #[test]
    fn rejects_default_of_wrong_type() {
        let err = SchemaRegistry::builder()
            .model(ModelDefinition::new("X").attribute(
                AttributeSpec::new("n", FieldType::Integer).with_default("ten"),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));
    }

    #[test]
    fn rejects_plural_collision() {
        let err = SchemaRegistry::builder()
            .model(ModelDefinition::new("Box"))
            .model(ModelDefinition::new("box"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::PluralCollision { .. }));
    }

    #[test]
    fn resolves_plural_names() {
        let registry = SchemaRegistry::builder().model(school()).model(student()).build().unwrap();
        assert_eq!(registry.by_plural("students").unwrap().model_name, "Student");
        assert!(registry.by_plural("teachers").is_none());
    }

    #[test]
    fn finds_reverse_relation() {
        let registry = SchemaRegistry::builder().model(school()).model(student()).build().unwrap();
        let (owner, rel) = registry.reverse_relation("School", "students").unwrap();
        assert_eq!(owner.model_name, "Student");
        assert_eq!(rel.name, "school");
        assert!(registry.reverse_relation("School", "teachers").is_none());
    }

    #[test]
    fn builds_from_document() {
        let doc = SchemaDocument {
            models: vec![school(), student()],
        };
        let registry = SchemaRegistry::from_document(doc).unwrap();
        assert!(registry.contains("School"));
        assert_eq!(registry.model_names().collect::<Vec<_>>(), vec!["School", "Student"]);
    }
}

//! Document materialization: from a raw `doc` section to typed index fields.
//!
//! The [`DocumentMapper`] trait is the engine's boundary; [`DynamicMapper`]
//! is the default implementation. It flattens nested JSON into dot-joined
//! field paths, infers a field kind per leaf, and maintains shared
//! per-type schema state. Materializing a document may auto-create the
//! type or add previously unseen fields; that side effect is intentional
//! and is reported back through
//! [`MaterializedDocument::schema_changed`].
use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use crate::analysis::Token;
use crate::config::MapperConfig;
use crate::error::MapperError;

/// Reserved top-level key that scales every field's contribution.
const BOOST_FIELD: &str = "_boost";

/// How a flattened leaf value reaches the ephemeral index.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A pre-built token stream; indexed verbatim, no analysis.
    Tokens(Vec<Token>),
    /// Free text; re-tokenized through the engine's analyzer.
    Text(String),
    /// A raw value indexed as a single verbatim term.
    Keyword(String),
}

/// Kind recorded in the shared schema for each mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Analyzed full text.
    Text,
    /// Single-term exact value.
    Keyword,
}

/// One indexable field of a materialized document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    /// Flattened dot-joined field path.
    pub name: String,
    /// Value plus its indexing strategy.
    pub value: FieldValue,
    /// Per-field boost; multiplied by the document boost at index build.
    pub boost: f32,
    /// Non-indexed fields are skipped by the ephemeral index builder.
    pub indexed: bool,
}

impl IndexField {
    /// An indexed field with neutral boost.
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            boost: 1.0,
            indexed: true,
        }
    }
}

/// A parsed document ready for ephemeral indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedDocument {
    /// Declared document type (first key of the `doc` section).
    pub doc_type: String,
    /// Flattened fields in source order.
    pub fields: Vec<IndexField>,
    /// Document-level boost applied to every field.
    pub boost: f32,
    /// Whether materializing this document extended the shared schema.
    pub schema_changed: bool,
}

impl MaterializedDocument {
    /// An empty document of the given type, for programmatic construction.
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            fields: Vec::new(),
            boost: 1.0,
            schema_changed: false,
        }
    }

    /// Append a field, builder-style.
    pub fn with_field(mut self, field: IndexField) -> Self {
        self.fields.push(field);
        self
    }
}

/// Maps a `doc` section body into a [`MaterializedDocument`].
pub trait DocumentMapper: Send + Sync {
    /// Materialize `source` as a document of type `doc_type`.
    ///
    /// Implementations may mutate shared schema state; when they do, the
    /// returned document's `schema_changed` flag must be set.
    fn map(&self, doc_type: &str, source: &JsonValue)
        -> Result<MaterializedDocument, MapperError>;
}

#[derive(Debug, Default)]
struct TypeSchema {
    fields: HashMap<String, FieldKind>,
}

/// Default mapper with dynamic schema extension.
///
/// Strings become [`FieldValue::Text`]; numbers and booleans become
/// [`FieldValue::Keyword`] terms of their canonical rendering; nulls are
/// skipped; arrays contribute one value per element; nested objects
/// flatten into `parent.child` paths.
#[derive(Debug, Default)]
pub struct DynamicMapper {
    cfg: MapperConfig,
    schemas: RwLock<HashMap<String, TypeSchema>>,
}

impl DynamicMapper {
    /// Build a mapper from explicit settings.
    pub fn new(cfg: MapperConfig) -> Self {
        Self {
            cfg,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a type mapping already exists.
    pub fn has_type(&self, doc_type: &str) -> bool {
        let guard = self
            .schemas
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.contains_key(doc_type)
    }

    /// Pre-register a type and its fields, so strict mappings can be seeded.
    pub fn define_type<I>(&self, doc_type: &str, fields: I)
    where
        I: IntoIterator<Item = (String, FieldKind)>,
    {
        let mut guard = self
            .schemas
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let schema = guard.entry(doc_type.to_string()).or_default();
        schema.fields.extend(fields);
    }

    fn flatten(
        prefix: &str,
        value: &JsonValue,
        out: &mut Vec<(String, FieldValue, FieldKind)>,
    ) {
        match value {
            JsonValue::Null => {}
            JsonValue::Bool(b) => out.push((
                prefix.to_string(),
                FieldValue::Keyword(b.to_string()),
                FieldKind::Keyword,
            )),
            JsonValue::Number(n) => out.push((
                prefix.to_string(),
                FieldValue::Keyword(n.to_string()),
                FieldKind::Keyword,
            )),
            JsonValue::String(s) => out.push((
                prefix.to_string(),
                FieldValue::Text(s.clone()),
                FieldKind::Text,
            )),
            JsonValue::Array(items) => {
                for item in items {
                    Self::flatten(prefix, item, out);
                }
            }
            JsonValue::Object(map) => {
                for (key, nested) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::flatten(&path, nested, out);
                }
            }
        }
    }
}

impl DocumentMapper for DynamicMapper {
    fn map(
        &self,
        doc_type: &str,
        source: &JsonValue,
    ) -> Result<MaterializedDocument, MapperError> {
        let body = source
            .as_object()
            .ok_or_else(|| MapperError::NotAnObject(doc_type.to_string()))?;

        let mut boost = 1.0f32;
        let mut leaves = Vec::new();
        for (key, value) in body {
            if key == BOOST_FIELD {
                if let Some(b) = value.as_f64() {
                    boost = b as f32;
                }
                continue;
            }
            Self::flatten(key, value, &mut leaves);
        }

        if leaves.len() > self.cfg.max_fields_per_document {
            return Err(MapperError::TooManyFields {
                limit: self.cfg.max_fields_per_document,
            });
        }

        // One write region per document keeps the type's schema update atomic
        // with respect to concurrent materializations.
        let mut schema_changed = false;
        {
            let mut guard = self
                .schemas
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !guard.contains_key(doc_type) {
                if !self.cfg.dynamic {
                    return Err(MapperError::StrictType(doc_type.to_string()));
                }
                guard.insert(doc_type.to_string(), TypeSchema::default());
                schema_changed = true;
            }
            let schema = guard
                .get_mut(doc_type)
                .expect("type schema inserted above");
            for (name, _, kind) in &leaves {
                if schema.fields.contains_key(name) {
                    continue;
                }
                if !self.cfg.dynamic {
                    return Err(MapperError::StrictField {
                        doc_type: doc_type.to_string(),
                        field: name.clone(),
                    });
                }
                schema.fields.insert(name.clone(), *kind);
                schema_changed = true;
            }
        }

        let fields = leaves
            .into_iter()
            .map(|(name, value, _)| IndexField::new(name, value))
            .collect();

        Ok(MaterializedDocument {
            doc_type: doc_type.to_string(),
            fields,
            boost,
            schema_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_materialization_extends_schema() {
        let mapper = DynamicMapper::default();
        let doc = mapper
            .map("tweet", &json!({ "title": "hello", "likes": 3 }))
            .expect("map");
        assert!(doc.schema_changed);
        assert!(mapper.has_type("tweet"));

        let doc = mapper
            .map("tweet", &json!({ "title": "again", "likes": 4 }))
            .expect("map");
        assert!(!doc.schema_changed, "no new fields on the second pass");
    }

    #[test]
    fn new_field_on_known_type_still_flags_change() {
        let mapper = DynamicMapper::default();
        mapper.map("tweet", &json!({ "title": "a" })).expect("map");
        let doc = mapper
            .map("tweet", &json!({ "title": "b", "author": "c" }))
            .expect("map");
        assert!(doc.schema_changed);
    }

    #[test]
    fn nested_objects_flatten_to_dot_paths() {
        let mapper = DynamicMapper::default();
        let doc = mapper
            .map("event", &json!({ "user": { "name": "ada", "id": 7 } }))
            .expect("map");
        let names: Vec<&str> = doc.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["user.name", "user.id"]);
        assert_eq!(doc.fields[1].value, FieldValue::Keyword("7".into()));
    }

    #[test]
    fn arrays_contribute_one_value_per_element() {
        let mapper = DynamicMapper::default();
        let doc = mapper
            .map("event", &json!({ "tags": ["a", "b"] }))
            .expect("map");
        assert_eq!(doc.fields.len(), 2);
        assert!(doc.fields.iter().all(|f| f.name == "tags"));
    }

    #[test]
    fn nulls_are_skipped_and_boost_is_lifted() {
        let mapper = DynamicMapper::default();
        let doc = mapper
            .map("event", &json!({ "gone": null, "title": "x", "_boost": 2.5 }))
            .expect("map");
        assert_eq!(doc.fields.len(), 1);
        assert!((doc.boost - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn strict_mapping_rejects_unknown_type_and_field() {
        let mapper = DynamicMapper::new(MapperConfig {
            dynamic: false,
            ..MapperConfig::default()
        });
        let err = mapper
            .map("tweet", &json!({ "title": "a" }))
            .expect_err("unknown type");
        assert_eq!(err, MapperError::StrictType("tweet".into()));

        mapper.define_type("tweet", [("title".to_string(), FieldKind::Text)]);
        assert!(mapper.map("tweet", &json!({ "title": "a" })).is_ok());

        let err = mapper
            .map("tweet", &json!({ "author": "b" }))
            .expect_err("unknown field");
        assert_eq!(
            err,
            MapperError::StrictField {
                doc_type: "tweet".into(),
                field: "author".into(),
            }
        );
    }

    #[test]
    fn field_budget_enforced() {
        let mapper = DynamicMapper::new(MapperConfig {
            max_fields_per_document: 2,
            ..MapperConfig::default()
        });
        let err = mapper
            .map("event", &json!({ "a": 1, "b": 2, "c": 3 }))
            .expect_err("too many fields");
        assert_eq!(err, MapperError::TooManyFields { limit: 2 });
    }

    #[test]
    fn non_object_body_rejected() {
        let mapper = DynamicMapper::default();
        let err = mapper.map("event", &json!("scalar")).expect_err("not an object");
        assert_eq!(err, MapperError::NotAnObject("event".into()));
    }
}

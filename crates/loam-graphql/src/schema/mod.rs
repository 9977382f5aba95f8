//! Schema compilation: the immutable snapshot, the type builder, and the
//! engine holding the currently active compiled schema.

pub mod builder;
pub mod engine;
pub mod input_types;

pub use builder::TypeBuilder;
pub use engine::{CompiledSchema, ContentEngine};

use loam_core::names::{type_name, ArtifactKind, SchemaPath};
use loam_core::{Collection, NameRegistry, Schema};

use crate::error::EngineError;

/// An immutable, validated view of one schema revision.
///
/// Compiled once and shared by every resolver of the type graph built
/// from it. A schema change produces a whole new snapshot; requests in
/// flight keep the one they started with.
#[derive(Debug)]
pub struct SchemaSnapshot {
    /// The validated schema.
    pub schema: Schema,
    /// Generated type names, keyed for reverse lookup.
    pub names: NameRegistry,
}

impl SchemaSnapshot {
    /// Validates a schema and resolves every generated type name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SchemaCompile`] for any violated schema
    /// invariant, including name collisions.
    pub fn compile(schema: Schema) -> Result<Self, EngineError> {
        schema.validate()?;
        let names = NameRegistry::build(&schema)?;
        Ok(Self { schema, names })
    }

    /// The concrete document type name for a template of a collection.
    ///
    /// For a polymorphic collection this is the per-template type, which
    /// is what union dispatch needs; the collection-level union carries
    /// the undecorated `<Collection>Document` name.
    #[must_use]
    pub fn document_type_name(&self, collection: &Collection, template_name: &str) -> String {
        let base = SchemaPath::root(&collection.name);
        if collection.is_polymorphic() {
            type_name(&base.child(template_name), ArtifactKind::Document)
        } else {
            type_name(&base, ArtifactKind::Document)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compile_validates_and_names() {
        let schema = Schema::from_json(json!({
            "collections": [{
                "name": "posts",
                "path": "content/posts",
                "fields": [{"type": "string", "name": "title"}]
            }]
        }))
        .unwrap();
        let snapshot = SchemaSnapshot::compile(schema).unwrap();
        assert!(snapshot.names.lookup("PostsDocument").is_some());

        let collection = snapshot.schema.collection("posts").unwrap();
        assert_eq!(
            snapshot.document_type_name(collection, "posts"),
            "PostsDocument"
        );
    }

    #[test]
    fn compile_rejects_invalid_schemas() {
        let schema = Schema::from_json(json!({
            "collections": [
                {"name": "a", "path": "content", "fields": [{"type": "string", "name": "t"}]},
                {"name": "b", "path": "content", "fields": [{"type": "string", "name": "t"}]}
            ]
        }))
        .unwrap();
        let err = SchemaSnapshot::compile(schema).unwrap_err();
        assert!(matches!(err, EngineError::SchemaCompile(_)));
    }

    #[test]
    fn polymorphic_document_type_names_include_the_template() {
        let schema = Schema::from_json(json!({
            "collections": [{
                "name": "pages",
                "path": "content/pages",
                "templates": [
                    {"name": "landing", "fields": [{"type": "string", "name": "headline"}]},
                    {"name": "about", "fields": [{"type": "string", "name": "bio"}]}
                ]
            }]
        }))
        .unwrap();
        let snapshot = SchemaSnapshot::compile(schema).unwrap();
        let collection = snapshot.schema.collection("pages").unwrap();
        assert_eq!(
            snapshot.document_type_name(collection, "landing"),
            "PagesLandingDocument"
        );
    }
}

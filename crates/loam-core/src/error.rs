//! Schema compilation errors.
//!
//! All variants here are fatal at schema-load time: a schema that fails to
//! compile never serves queries.

/// Errors raised while validating or compiling a content schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// Two distinct schema paths produced the same generated type name.
    #[error("generated type name `{name}` collides: `{first}` and `{second}`")]
    NameCollision {
        /// The colliding generated name.
        name: String,
        /// Dotted schema path that claimed the name first.
        first: String,
        /// Dotted schema path that collided with it.
        second: String,
    },

    /// Two collections share the same name.
    #[error("duplicate collection name `{0}`")]
    DuplicateCollection(String),

    /// Two collections claim overlapping storage paths.
    #[error("collections `{first}` and `{second}` have overlapping paths at `{path}`")]
    OverlappingPaths {
        /// First collection name.
        first: String,
        /// Second collection name.
        second: String,
        /// The shared path prefix.
        path: String,
    },

    /// A field name is repeated within one template or object scope.
    #[error("duplicate field name `{name}` in `{scope}`")]
    DuplicateField {
        /// Dotted path of the enclosing template/object.
        scope: String,
        /// The repeated field name.
        name: String,
    },

    /// A template name is repeated within one collection or field scope.
    #[error("duplicate template name `{name}` in `{scope}`")]
    DuplicateTemplate {
        /// Dotted path of the enclosing scope.
        scope: String,
        /// The repeated template name.
        name: String,
    },

    /// A reference field targets a collection the schema does not declare.
    #[error("reference field `{field}` targets unknown collection `{target}`")]
    UnknownReferenceTarget {
        /// Dotted path of the reference field.
        field: String,
        /// The undeclared target collection name.
        target: String,
    },

    /// A reference field has no targets at all.
    #[error("reference field `{field}` declares no target collections")]
    EmptyReferenceTargets {
        /// Dotted path of the reference field.
        field: String,
    },

    /// Required reference fields form a cycle with no terminating
    /// non-reference field, which would make resolution unbounded.
    #[error("cyclic required reference chain: {chain}")]
    CyclicReference {
        /// The collection cycle, rendered as `a -> b -> a`.
        chain: String,
    },

    /// A polymorphic collection or block field declares zero templates.
    #[error("`{scope}` declares an empty template list")]
    EmptyTemplates {
        /// Dotted path of the offending scope.
        scope: String,
    },
}

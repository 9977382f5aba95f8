//! Deterministic type-name resolution.
//!
//! Every generated GraphQL artifact (data type, document type, mutation
//! input, connection, edges, union) gets a name derived purely from its
//! path through the schema: PascalCase segments concatenated root-to-leaf
//! plus a fixed suffix per artifact kind. The same schema always yields
//! the same names, which is what makes the compiled type graph cacheable
//! and diffable downstream.
//!
//! [`NameRegistry::build`] walks a schema and assigns every artifact name
//! up front; two distinct paths mapping to one name is a
//! [`SchemaError::NameCollision`] reported with both offending paths.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::SchemaError;
use crate::schema::{Collection, Field, Schema, Template};

/// Kind of generated artifact, determining the name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    /// Plain data type, no suffix (`Posts`).
    Data,
    /// Document type (`PostsDocument`).
    Document,
    /// Mutation input type (`PostsMutation`).
    Mutation,
    /// Connection wrapper (`PostsConnection`).
    Connection,
    /// Connection edge wrapper (`PostsConnectionEdges`).
    ConnectionEdges,
}

impl ArtifactKind {
    /// The fixed suffix appended for this kind.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Data => "",
            Self::Document => "Document",
            Self::Mutation => "Mutation",
            Self::Connection => "Connection",
            Self::ConnectionEdges => "ConnectionEdges",
        }
    }
}

/// A path through the schema: collection, template, field, nested field...
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaPath(Vec<String>);

impl SchemaPath {
    /// A root path with a single segment.
    #[must_use]
    pub fn root(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Extends the path with one more segment.
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Raw segments, root first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Converts a schema segment to PascalCase.
///
/// Splits on `-`, `_`, `.`, and whitespace, uppercasing the first letter
/// of each part while preserving interior capitals (`someField` becomes
/// `SomeField`, `rich-text` becomes `RichText`).
#[must_use]
pub fn pascal_case(segment: &str) -> String {
    segment
        .split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}

/// Pure name resolution: PascalCase path segments plus the kind suffix.
#[must_use]
pub fn type_name(path: &SchemaPath, kind: ArtifactKind) -> String {
    let mut name: String = path.segments().iter().map(|s| pascal_case(s)).collect();
    name.push_str(kind.suffix());
    name
}

/// Registry mapping every generated name back to the schema path and
/// artifact kind that produced it.
///
/// Built once per schema compile; doubles as the collision check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameRegistry {
    names: BTreeMap<String, (SchemaPath, ArtifactKind)>,
}

impl NameRegistry {
    /// Walks the schema and assigns a name to every generated artifact.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NameCollision`] when two distinct paths
    /// produce the same name, naming both paths.
    pub fn build(schema: &Schema) -> Result<Self, SchemaError> {
        let mut registry = Self::default();
        for collection in &schema.collections {
            registry.assign_collection(collection)?;
        }
        Ok(registry)
    }

    fn assign_collection(&mut self, collection: &Collection) -> Result<(), SchemaError> {
        let base = SchemaPath::root(&collection.name);
        self.assign(&base, ArtifactKind::Connection)?;
        self.assign(&base, ArtifactKind::ConnectionEdges)?;
        self.assign(&base, ArtifactKind::Document)?;
        self.assign(&base, ArtifactKind::Mutation)?;

        if collection.is_polymorphic() {
            for template in collection.template_list() {
                let path = base.child(&template.name);
                self.assign(&path, ArtifactKind::Data)?;
                self.assign(&path, ArtifactKind::Document)?;
                self.assign(&path, ArtifactKind::Mutation)?;
                self.assign_fields(&path, &template.fields)?;
            }
        } else {
            self.assign(&base, ArtifactKind::Data)?;
            for template in collection.template_list() {
                self.assign_fields(&base, &template.fields)?;
            }
        }
        Ok(())
    }

    fn assign_fields(&mut self, parent: &SchemaPath, fields: &[Field]) -> Result<(), SchemaError> {
        for field in fields {
            match field {
                Field::Object {
                    fields: nested,
                    templates,
                    ..
                } if templates.is_empty() => {
                    let path = parent.child(field.name());
                    self.assign(&path, ArtifactKind::Data)?;
                    self.assign(&path, ArtifactKind::Mutation)?;
                    self.assign_fields(&path, nested)?;
                }
                Field::Object { templates, .. } | Field::RichText { templates, .. }
                    if !templates.is_empty() =>
                {
                    let path = parent.child(field.name());
                    // Union over the block templates plus its keyed
                    // mutation selector.
                    self.assign(&path, ArtifactKind::Data)?;
                    self.assign(&path, ArtifactKind::Mutation)?;
                    self.assign_block_templates(&path, templates)?;
                }
                // A multi-target reference gets a union over the target
                // document types, named at the field path.
                Field::Reference { to, .. } if to.len() > 1 => {
                    let path = parent.child(field.name());
                    self.assign(&path, ArtifactKind::Document)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn assign_block_templates(
        &mut self,
        parent: &SchemaPath,
        templates: &[Template],
    ) -> Result<(), SchemaError> {
        for template in templates {
            let path = parent.child(&template.name);
            self.assign(&path, ArtifactKind::Data)?;
            self.assign(&path, ArtifactKind::Mutation)?;
            self.assign_fields(&path, &template.fields)?;
        }
        Ok(())
    }

    fn assign(&mut self, path: &SchemaPath, kind: ArtifactKind) -> Result<String, SchemaError> {
        let name = type_name(path, kind);
        match self.names.get(&name) {
            Some((existing_path, existing_kind))
                if existing_path != path || *existing_kind != kind =>
            {
                Err(SchemaError::NameCollision {
                    name,
                    first: existing_path.to_string(),
                    second: path.to_string(),
                })
            }
            Some(_) => Ok(name),
            None => {
                self.names.insert(name.clone(), (path.clone(), kind));
                Ok(name)
            }
        }
    }

    /// Looks up the origin of a generated name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&(SchemaPath, ArtifactKind)> {
        self.names.get(name)
    }

    /// All generated names in deterministic (sorted) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Number of generated names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

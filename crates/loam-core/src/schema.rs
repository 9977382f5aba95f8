//! The declarative content schema.
//!
//! A [`Schema`] is the single authority over collections, templates, and
//! fields. It is deserialized once from the external configuration layer
//! and validated before any type compilation happens. The field definition
//! set is a closed tagged union so the type builder can match exhaustively
//! instead of inspecting loose dictionaries at runtime.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// File format a collection persists its documents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Markdown with frontmatter.
    #[default]
    Md,
    /// MDX with frontmatter.
    Mdx,
    /// Plain JSON.
    Json,
}

impl Format {
    /// File extension for this format, without the dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Md => "md",
            Self::Mdx => "mdx",
            Self::Json => "json",
        }
    }
}

/// Shared metadata carried by every field variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Field name, unique within its enclosing template or object.
    pub name: String,
    /// Human-readable label for editing UIs.
    #[serde(default)]
    pub label: Option<String>,
    /// Whether a value must be present after every mutation.
    #[serde(default)]
    pub required: bool,
    /// Whether the field holds a list of values.
    #[serde(default)]
    pub list: bool,
    /// Default value used when a pending document is created.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Marks the raw content payload field of a template.
    #[serde(default, rename = "isBody")]
    pub is_body: bool,
}

impl FieldMeta {
    /// Label, falling back to the field name.
    #[must_use]
    pub fn label_or_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// A typed field definition.
///
/// The variant set is closed: adding a field kind means adding a variant
/// here and handling it in the type builder, the input-type builder, and
/// the merge/validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Field {
    /// Short text, stored as a string.
    #[serde(rename = "string")]
    String {
        #[serde(flatten)]
        meta: FieldMeta,
    },
    /// Long-form text, stored as a string.
    #[serde(rename = "text")]
    Text {
        #[serde(flatten)]
        meta: FieldMeta,
    },
    /// Numeric value.
    #[serde(rename = "number")]
    Number {
        #[serde(flatten)]
        meta: FieldMeta,
    },
    /// Boolean flag.
    #[serde(rename = "boolean")]
    Boolean {
        #[serde(flatten)]
        meta: FieldMeta,
    },
    /// ISO-8601 datetime string.
    #[serde(rename = "datetime")]
    Datetime {
        #[serde(flatten)]
        meta: FieldMeta,
    },
    /// Image path string.
    #[serde(rename = "image")]
    Image {
        #[serde(flatten)]
        meta: FieldMeta,
    },
    /// Foreign key into one or more collections, stored as a path string.
    #[serde(rename = "reference")]
    Reference {
        #[serde(flatten)]
        meta: FieldMeta,
        /// Names of the collections this reference may point at.
        to: Vec<String>,
    },
    /// Nested object. Either a fixed field list or a template union
    /// (polymorphic repeatable blocks).
    #[serde(rename = "object")]
    Object {
        #[serde(flatten)]
        meta: FieldMeta,
        /// Fixed nested fields (exclusive with `templates`).
        #[serde(default)]
        fields: Vec<Field>,
        /// Embeddable block templates (exclusive with `fields`).
        #[serde(default)]
        templates: Vec<Template>,
    },
    /// Rich text payload, optionally embedding block templates.
    #[serde(rename = "rich-text")]
    RichText {
        #[serde(flatten)]
        meta: FieldMeta,
        /// Embeddable block templates.
        #[serde(default)]
        templates: Vec<Template>,
    },
}

impl Field {
    /// Shared metadata of this field.
    #[must_use]
    pub fn meta(&self) -> &FieldMeta {
        match self {
            Self::String { meta }
            | Self::Text { meta }
            | Self::Number { meta }
            | Self::Boolean { meta }
            | Self::Datetime { meta }
            | Self::Image { meta }
            | Self::Reference { meta, .. }
            | Self::Object { meta, .. }
            | Self::RichText { meta, .. } => meta,
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.meta().name
    }

    /// Stable tag string matching the serialized `type` key.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Boolean { .. } => "boolean",
            Self::Datetime { .. } => "datetime",
            Self::Image { .. } => "image",
            Self::Reference { .. } => "reference",
            Self::Object { .. } => "object",
            Self::RichText { .. } => "rich-text",
        }
    }

    /// Block templates, if this field is union-shaped.
    #[must_use]
    pub fn block_templates(&self) -> Option<&[Template]> {
        match self {
            Self::Object { templates, .. } | Self::RichText { templates, .. }
                if !templates.is_empty() =>
            {
                Some(templates)
            }
            _ => None,
        }
    }
}

/// A field schema describing the shape of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template name; the discriminator stored in document metadata.
    pub name: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Ordered field list.
    pub fields: Vec<Field>,
}

impl Template {
    /// Label, falling back to the template name.
    #[must_use]
    pub fn label_or_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// The field marked as the raw content payload, if any.
    #[must_use]
    pub fn body_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.meta().is_body)
    }
}

/// Template shape of a collection: a single implicit template or an
/// explicit polymorphic template list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionTemplates {
    /// Single implicit template described by a flat field list.
    Fields {
        /// The implicit template's fields.
        fields: Vec<Field>,
    },
    /// Polymorphic collection; documents carry a template discriminator.
    Templates {
        /// The declared templates.
        templates: Vec<Template>,
    },
}

/// A named set of content documents sharing storage rules and templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Unique collection name.
    pub name: String,
    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Storage path prefix, e.g. `content/posts`.
    pub path: String,
    /// Persisted file format.
    #[serde(default)]
    pub format: Format,
    /// Optional path-match glob restricting which files belong here.
    #[serde(default, rename = "match")]
    pub match_glob: Option<String>,
    /// Template shape.
    #[serde(flatten)]
    pub templates: CollectionTemplates,
}

impl Collection {
    /// URL-safe identifier; collections are addressed by name.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.name
    }

    /// Label, falling back to the collection name.
    #[must_use]
    pub fn label_or_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Whether documents carry a template discriminator.
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        matches!(&self.templates, CollectionTemplates::Templates { templates } if templates.len() > 1)
    }

    /// Normalized template list. A flat field list becomes one implicit
    /// template named after the collection.
    #[must_use]
    pub fn template_list(&self) -> Vec<Template> {
        match &self.templates {
            CollectionTemplates::Fields { fields } => vec![Template {
                name: self.name.clone(),
                label: self.label.clone(),
                fields: fields.clone(),
            }],
            CollectionTemplates::Templates { templates } => templates.clone(),
        }
    }

    /// Looks up a declared template by name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<Template> {
        self.template_list().into_iter().find(|t| t.name == name)
    }
}

/// The full content schema: the single authority over all collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Declared collections.
    pub collections: Vec<Collection>,
}

impl Schema {
    /// Deserializes a schema from its JSON description.
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error for malformed input.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Looks up a collection by name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Validates the schema against all structural invariants.
    ///
    /// Checks, in order: unique collection names, non-overlapping storage
    /// paths, unique field/template names per scope, declared reference
    /// targets, non-empty template lists, and the absence of required
    /// reference cycles.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`SchemaError`].
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.check_collection_names()?;
        self.check_path_overlap()?;
        for collection in &self.collections {
            match &collection.templates {
                CollectionTemplates::Fields { fields } => {
                    self.check_fields(&collection.name, fields)?;
                }
                CollectionTemplates::Templates { templates } => {
                    if templates.is_empty() {
                        return Err(SchemaError::EmptyTemplates {
                            scope: collection.name.clone(),
                        });
                    }
                    let mut seen = HashSet::new();
                    for template in templates {
                        if !seen.insert(template.name.as_str()) {
                            return Err(SchemaError::DuplicateTemplate {
                                scope: collection.name.clone(),
                                name: template.name.clone(),
                            });
                        }
                        let scope = format!("{}.{}", collection.name, template.name);
                        self.check_fields(&scope, &template.fields)?;
                    }
                }
            }
        }
        self.check_reference_cycles()
    }

    fn check_collection_names(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.name.as_str()) {
                return Err(SchemaError::DuplicateCollection(collection.name.clone()));
            }
        }
        Ok(())
    }

    fn check_path_overlap(&self) -> Result<(), SchemaError> {
        for (i, a) in self.collections.iter().enumerate() {
            for b in &self.collections[i + 1..] {
                let pa = normalize_path(&a.path);
                let pb = normalize_path(&b.path);
                if pa == pb || pa.starts_with(&format!("{pb}/")) || pb.starts_with(&format!("{pa}/"))
                {
                    // Distinct match globs may disambiguate a shared prefix.
                    // A glob-less collection claims everything under its
                    // path, so both sides need one.
                    if a.match_glob.is_none()
                        || b.match_glob.is_none()
                        || a.match_glob == b.match_glob
                    {
                        return Err(SchemaError::OverlappingPaths {
                            first: a.name.clone(),
                            second: b.name.clone(),
                            path: if pa.len() <= pb.len() { pa } else { pb },
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_fields(&self, scope: &str, fields: &[Field]) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(field.name()) {
                return Err(SchemaError::DuplicateField {
                    scope: scope.to_string(),
                    name: field.name().to_string(),
                });
            }
            let field_scope = format!("{scope}.{}", field.name());
            match field {
                Field::Reference { to, .. } => {
                    if to.is_empty() {
                        return Err(SchemaError::EmptyReferenceTargets {
                            field: field_scope,
                        });
                    }
                    for target in to {
                        if self.collection(target).is_none() {
                            return Err(SchemaError::UnknownReferenceTarget {
                                field: field_scope,
                                target: target.clone(),
                            });
                        }
                    }
                }
                Field::Object {
                    fields: nested,
                    templates,
                    ..
                } => {
                    if nested.is_empty() && templates.is_empty() {
                        return Err(SchemaError::EmptyTemplates { scope: field_scope });
                    }
                    if !nested.is_empty() {
                        self.check_fields(&field_scope, nested)?;
                    }
                    self.check_block_templates(&field_scope, templates)?;
                }
                Field::RichText { templates, .. } => {
                    self.check_block_templates(&field_scope, templates)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_block_templates(
        &self,
        scope: &str,
        templates: &[Template],
    ) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for template in templates {
            if !seen.insert(template.name.as_str()) {
                return Err(SchemaError::DuplicateTemplate {
                    scope: scope.to_string(),
                    name: template.name.clone(),
                });
            }
            let template_scope = format!("{scope}.{}", template.name);
            self.check_fields(&template_scope, &template.fields)?;
        }
        Ok(())
    }

    /// Detects cycles in the graph of *required* single references between
    /// collections. An optional reference terminates resolution (the value
    /// may be absent), so only required chains can recurse without bound.
    fn check_reference_cycles(&self) -> Result<(), SchemaError> {
        let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for collection in &self.collections {
            let mut targets = Vec::new();
            for template in collection.template_list() {
                collect_required_reference_targets(&template.fields, &mut targets);
            }
            edges.insert(
                &collection.name,
                targets
                    .into_iter()
                    .filter_map(|t| self.collection(&t).map(|c| c.name.as_str()))
                    .collect::<Vec<_>>(),
            );
        }

        // Keys collected up front so the borrow on `edges` stays shared.
        let names: Vec<&str> = edges.keys().copied().collect();
        for start in names {
            let mut stack = vec![start];
            if let Some(chain) = walk_for_cycle(&edges, start, &mut stack) {
                return Err(SchemaError::CyclicReference { chain });
            }
        }
        Ok(())
    }
}

fn collect_required_reference_targets(fields: &[Field], out: &mut Vec<String>) {
    for field in fields {
        match field {
            Field::Reference { meta, to } if meta.required && !meta.list => {
                out.extend(to.iter().cloned());
            }
            Field::Object {
                meta,
                fields: nested,
                templates,
            } if meta.required => {
                collect_required_reference_targets(nested, out);
                for template in templates {
                    collect_required_reference_targets(&template.fields, out);
                }
            }
            _ => {}
        }
    }
}

fn walk_for_cycle<'a>(
    edges: &BTreeMap<&'a str, Vec<&'a str>>,
    node: &'a str,
    stack: &mut Vec<&'a str>,
) -> Option<String> {
    for &next in edges.get(node).map(Vec::as_slice).unwrap_or_default() {
        if stack.contains(&next) {
            let mut chain: Vec<&str> = stack.clone();
            chain.push(next);
            return Some(chain.join(" -> "));
        }
        stack.push(next);
        if let Some(chain) = walk_for_cycle(edges, next, stack) {
            return Some(chain);
        }
        stack.pop();
    }
    None
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

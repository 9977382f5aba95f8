//! Document system metadata, global ids, and form descriptors.
//!
//! A document is identified by `(collection, relativePath)`. The global id
//! used by the `node` query is the two joined with a single `/`; collection
//! names never contain `/`, so the encoding is reversible by splitting on
//! the first separator.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::schema::{Collection, Field, Template};

/// System metadata attached to every resolved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// File name without extension.
    pub filename: String,
    /// File name with extension.
    pub basename: String,
    /// Path components of the relative path, extension stripped.
    pub breadcrumbs: Vec<String>,
    /// Full storage path (collection path + relative path).
    pub path: String,
    /// Path relative to the collection root.
    pub relative_path: String,
    /// File extension with the leading dot.
    pub extension: String,
    /// Name of the template this document conforms to.
    pub template: String,
    /// Owning collection name.
    pub collection: String,
}

impl SystemInfo {
    /// Derives system metadata for a document in `collection`.
    #[must_use]
    pub fn new(collection: &Collection, relative_path: &str, template: &str) -> Self {
        let basename = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();
        let (filename, extension) = match basename.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
            None => (basename.clone(), String::new()),
        };
        let breadcrumbs = relative_path
            .split('/')
            .map(|part| part.rsplit_once('.').map_or(part, |(stem, _)| stem).to_string())
            .collect();
        let path = format!(
            "{}/{}",
            collection.path.trim_end_matches('/'),
            relative_path
        );
        Self {
            filename,
            basename,
            breadcrumbs,
            path,
            relative_path: relative_path.to_string(),
            extension,
            template: template.to_string(),
            collection: collection.name.clone(),
        }
    }
}

/// Encodes a global document id from its collection and relative path.
#[must_use]
pub fn encode_id(collection: &str, relative_path: &str) -> String {
    format!("{collection}/{relative_path}")
}

/// Decodes a global document id back into `(collection, relativePath)`.
///
/// Returns `None` for ids without a separator.
#[must_use]
pub fn decode_id(id: &str) -> Option<(&str, &str)> {
    id.split_once('/').filter(|(c, p)| !c.is_empty() && !p.is_empty())
}

/// Builds the `form` descriptor for a template: enough field metadata for
/// the (external) admin surface to render an edit form.
#[must_use]
pub fn form_descriptor(label: &str, name: &str, template: &Template) -> Value {
    json!({
        "label": label,
        "name": name,
        "fields": template
            .fields
            .iter()
            .map(field_descriptor)
            .collect::<Vec<_>>(),
    })
}

/// JSON description of a single field, recursing into nested shapes.
#[must_use]
pub fn field_descriptor(field: &Field) -> Value {
    let meta = field.meta();
    let mut obj = serde_json::Map::new();
    obj.insert("name".into(), json!(meta.name));
    obj.insert("label".into(), json!(meta.label_or_name()));
    obj.insert("type".into(), json!(field.kind()));
    obj.insert("required".into(), json!(meta.required));
    obj.insert("list".into(), json!(meta.list));
    if let Some(default) = &meta.default {
        obj.insert("default".into(), default.clone());
    }
    if meta.is_body {
        obj.insert("isBody".into(), Value::Bool(true));
    }
    match field {
        Field::Reference { to, .. } => {
            obj.insert("collections".into(), json!(to));
        }
        Field::Object {
            fields, templates, ..
        } => {
            if !fields.is_empty() {
                obj.insert(
                    "fields".into(),
                    json!(fields.iter().map(field_descriptor).collect::<Vec<_>>()),
                );
            }
            if !templates.is_empty() {
                obj.insert("templates".into(), template_descriptors(templates));
            }
        }
        Field::RichText { templates, .. } if !templates.is_empty() => {
            obj.insert("templates".into(), template_descriptors(templates));
        }
        _ => {}
    }
    Value::Object(obj)
}

fn template_descriptors(templates: &[Template]) -> Value {
    json!(templates
        .iter()
        .map(|t| json!({
            "name": t.name,
            "label": t.label_or_name(),
            "fields": t.fields.iter().map(field_descriptor).collect::<Vec<_>>(),
        }))
        .collect::<Vec<_>>())
}

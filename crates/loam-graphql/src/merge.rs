//! Partial mutation merge and value validation.
//!
//! Mutation payloads are partial: a key that is present overwrites the
//! stored value, an omitted key leaves the stored value alone, and an
//! explicit `null` clears it. Lists are replaced wholesale. Block union
//! entries arrive as keyed selector objects (`{"hero": {...}}`) and are
//! normalized to their stored shape, which carries a `_template`
//! discriminator.
//!
//! After the merge the full document is validated against its template
//! before a single write goes to the store, so a rejected mutation never
//! corrupts unrelated fields.

use serde_json::{Map, Value};

use loam_core::{Field, Template};

use crate::error::EngineError;

/// Discriminator key stored inside block union entries.
pub(crate) const TEMPLATE_KEY: &str = "_template";

/// Initial values for a pending document: every declared default, with
/// non-list fixed objects recursed so nested defaults apply too.
pub(crate) fn defaults(template: &Template) -> Value {
    Value::Object(field_defaults(&template.fields))
}

fn field_defaults(fields: &[Field]) -> Map<String, Value> {
    let mut out = Map::new();
    for field in fields {
        let meta = field.meta();
        if let Some(default) = &meta.default {
            out.insert(meta.name.clone(), default.clone());
            continue;
        }
        if let Field::Object {
            fields: nested,
            templates,
            ..
        } = field
        {
            if !meta.list && templates.is_empty() {
                let nested_defaults = field_defaults(nested);
                if !nested_defaults.is_empty() {
                    out.insert(meta.name.clone(), Value::Object(nested_defaults));
                }
            }
        }
    }
    out
}

/// Applies a partial mutation payload on top of the stored values.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] for unknown keys, malformed block
/// selectors, or payloads of the wrong shape. The stored values are never
/// touched on error.
pub(crate) fn apply(
    template: &Template,
    existing: &Value,
    params: &Value,
) -> Result<Value, EngineError> {
    apply_fields(&template.name, &template.fields, existing, params)
}

fn apply_fields(
    scope: &str,
    fields: &[Field],
    existing: &Value,
    params: &Value,
) -> Result<Value, EngineError> {
    let Value::Object(params) = params else {
        return Err(EngineError::validation(scope, "expected an object payload"));
    };
    let mut result = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in params {
        let path = format!("{scope}.{key}");
        let Some(field) = fields.iter().find(|f| f.name() == key) else {
            return Err(EngineError::validation(path, "unknown field"));
        };
        if value.is_null() {
            result.remove(key);
            continue;
        }
        let merged = merge_field(&path, field, result.get(key.as_str()), value)?;
        result.insert(key.clone(), merged);
    }
    Ok(Value::Object(result))
}

fn merge_field(
    path: &str,
    field: &Field,
    existing: Option<&Value>,
    value: &Value,
) -> Result<Value, EngineError> {
    let meta = field.meta();
    match field {
        Field::Object {
            fields: nested,
            templates,
            ..
        } if templates.is_empty() => {
            if meta.list {
                // List entries are replaced wholesale, each normalized on
                // its own.
                let Value::Array(items) = value else {
                    return Err(EngineError::validation(path, "expected a list"));
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(apply_fields(path, nested, &Value::Null, item)?);
                }
                Ok(Value::Array(out))
            } else {
                let base = existing.cloned().unwrap_or(Value::Null);
                apply_fields(path, nested, &base, value)
            }
        }
        Field::Object { templates, .. } | Field::RichText { templates, .. }
            if !templates.is_empty() =>
        {
            if meta.list {
                let Value::Array(items) = value else {
                    return Err(EngineError::validation(path, "expected a list of blocks"));
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(merge_block(path, templates, item)?);
                }
                Ok(Value::Array(out))
            } else {
                merge_block(path, templates, value)
            }
        }
        // Scalars, references, and plain rich text take the payload value.
        _ => Ok(value.clone()),
    }
}

/// Normalizes a keyed block selector (`{"hero": {...}}`) into stored form.
fn merge_block(path: &str, templates: &[Template], value: &Value) -> Result<Value, EngineError> {
    let Value::Object(selector) = value else {
        return Err(EngineError::validation(path, "expected a block selector"));
    };
    if selector.len() != 1 {
        return Err(EngineError::validation(
            path,
            "a block selector must name exactly one template",
        ));
    }
    let (name, inner) = selector
        .iter()
        .next()
        .ok_or_else(|| EngineError::internal("empty selector after length check"))?;
    let Some(template) = templates.iter().find(|t| &t.name == name) else {
        return Err(EngineError::validation(
            format!("{path}.{name}"),
            "unknown block template",
        ));
    };
    let mut merged = match apply_fields(path, &template.fields, &Value::Null, inner)? {
        Value::Object(map) => map,
        other => {
            return Err(EngineError::internal(format!(
                "block merge produced a non-object: {other}"
            )))
        }
    };
    merged.insert(TEMPLATE_KEY.to_string(), Value::String(name.clone()));
    Ok(Value::Object(merged))
}

/// Validates a full document against its template.
///
/// Required fields must be present and non-null; present values must
/// match their declared kind. Keys the template does not declare are
/// ignored so foreign frontmatter survives untouched.
///
/// # Errors
///
/// Returns [`EngineError::Validation`] naming the dotted field path of
/// the first violation.
pub(crate) fn validate(template: &Template, values: &Value) -> Result<(), EngineError> {
    validate_fields(&template.name, &template.fields, values)
}

fn validate_fields(scope: &str, fields: &[Field], values: &Value) -> Result<(), EngineError> {
    let Value::Object(map) = values else {
        return Err(EngineError::validation(scope, "expected an object"));
    };
    for field in fields {
        let meta = field.meta();
        let path = format!("{scope}.{}", meta.name);
        match map.get(&meta.name) {
            None | Some(Value::Null) => {
                if meta.required {
                    return Err(EngineError::validation(path, "required field missing"));
                }
            }
            Some(value) if meta.list => {
                let Value::Array(items) = value else {
                    return Err(EngineError::validation(path, "expected a list"));
                };
                for item in items {
                    validate_element(&path, field, item)?;
                }
            }
            Some(value) => validate_element(&path, field, value)?,
        }
    }
    Ok(())
}

fn validate_element(path: &str, field: &Field, value: &Value) -> Result<(), EngineError> {
    match field {
        Field::String { .. }
        | Field::Text { .. }
        | Field::Datetime { .. }
        | Field::Image { .. }
        | Field::Reference { .. } => {
            if !value.is_string() {
                return Err(EngineError::validation(path, "expected a string"));
            }
        }
        Field::Number { .. } => {
            if !value.is_number() {
                return Err(EngineError::validation(path, "expected a number"));
            }
        }
        Field::Boolean { .. } => {
            if !value.is_boolean() {
                return Err(EngineError::validation(path, "expected a boolean"));
            }
        }
        Field::Object {
            fields: nested,
            templates,
            ..
        } if templates.is_empty() => validate_fields(path, nested, value)?,
        Field::Object { templates, .. } => validate_block(path, templates, value)?,
        Field::RichText { templates, .. } => {
            if templates.is_empty() {
                // Plain rich text stores either a raw string or a
                // structured payload.
                if !value.is_string() && !value.is_object() {
                    return Err(EngineError::validation(
                        path,
                        "expected a string or structured payload",
                    ));
                }
            } else {
                validate_block(path, templates, value)?;
            }
        }
    }
    Ok(())
}

fn validate_block(path: &str, templates: &[Template], value: &Value) -> Result<(), EngineError> {
    let Value::Object(map) = value else {
        return Err(EngineError::validation(path, "expected a block object"));
    };
    let Some(Value::String(name)) = map.get(TEMPLATE_KEY) else {
        return Err(EngineError::validation(
            path,
            "block entry is missing its template discriminator",
        ));
    };
    let Some(template) = templates.iter().find(|t| &t.name == name) else {
        return Err(EngineError::validation(
            path,
            format!("unknown block template `{name}`"),
        ));
    };
    validate_fields(path, &template.fields, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::FieldMeta;
    use serde_json::json;

    fn meta(name: &str) -> FieldMeta {
        FieldMeta {
            name: name.into(),
            label: None,
            required: false,
            list: false,
            default: None,
            is_body: false,
        }
    }

    fn post_template() -> Template {
        let mut title = meta("title");
        title.required = true;
        let mut rating = meta("rating");
        rating.default = Some(json!(3));
        Template {
            name: "posts".into(),
            label: None,
            fields: vec![
                Field::String { meta: title },
                Field::Number { meta: rating },
                Field::Boolean {
                    meta: meta("published"),
                },
                Field::Object {
                    meta: meta("seo"),
                    fields: vec![Field::String {
                        meta: meta("description"),
                    }],
                    templates: vec![],
                },
            ],
        }
    }

    fn blocks_template() -> Template {
        let mut blocks = meta("blocks");
        blocks.list = true;
        Template {
            name: "pages".into(),
            label: None,
            fields: vec![Field::Object {
                meta: blocks,
                fields: vec![],
                templates: vec![
                    Template {
                        name: "hero".into(),
                        label: None,
                        fields: vec![Field::String {
                            meta: meta("heading"),
                        }],
                    },
                    Template {
                        name: "cta".into(),
                        label: None,
                        fields: vec![Field::String { meta: meta("label") }],
                    },
                ],
            }],
        }
    }

    #[test]
    fn present_keys_overwrite_and_omitted_keys_survive() {
        let existing = json!({"title": "Old", "published": true, "rating": 4});
        let merged = apply(
            &post_template(),
            &existing,
            &json!({"title": "New"}),
        )
        .unwrap();
        assert_eq!(merged["title"], "New");
        assert_eq!(merged["published"], true);
        assert_eq!(merged["rating"], 4);
    }

    #[test]
    fn explicit_null_clears_a_field() {
        let existing = json!({"title": "Old", "published": true});
        let merged = apply(
            &post_template(),
            &existing,
            &json!({"published": null}),
        )
        .unwrap();
        assert!(merged.get("published").is_none());
        assert_eq!(merged["title"], "Old");
    }

    #[test]
    fn nested_object_merges_key_by_key() {
        let existing = json!({"title": "T", "seo": {"description": "old"}});
        let merged = apply(
            &post_template(),
            &existing,
            &json!({"seo": {"description": "new"}}),
        )
        .unwrap();
        assert_eq!(merged["seo"]["description"], "new");
        assert_eq!(merged["title"], "T");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = apply(&post_template(), &json!({}), &json!({"bogus": 1})).unwrap_err();
        assert!(matches!(err, EngineError::Validation { path, .. } if path == "posts.bogus"));
    }

    #[test]
    fn block_selectors_normalize_to_stored_form() {
        let merged = apply(
            &blocks_template(),
            &json!({}),
            &json!({"blocks": [
                {"hero": {"heading": "Hi"}},
                {"cta": {"label": "Go"}}
            ]}),
        )
        .unwrap();
        assert_eq!(merged["blocks"][0]["_template"], "hero");
        assert_eq!(merged["blocks"][0]["heading"], "Hi");
        assert_eq!(merged["blocks"][1]["_template"], "cta");
    }

    #[test]
    fn block_selector_must_name_one_template() {
        let err = apply(
            &blocks_template(),
            &json!({}),
            &json!({"blocks": [{"hero": {}, "cta": {}}]}),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));

        let err = apply(
            &blocks_template(),
            &json!({}),
            &json!({"blocks": [{"banner": {}}]}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation { path, .. } if path.ends_with("banner")
        ));
    }

    #[test]
    fn validate_enforces_required_and_kinds() {
        let template = post_template();
        assert!(validate(&template, &json!({"title": "ok"})).is_ok());

        let err = validate(&template, &json!({"published": true})).unwrap_err();
        assert!(matches!(err, EngineError::Validation { path, .. } if path == "posts.title"));

        let err = validate(&template, &json!({"title": "ok", "rating": "high"})).unwrap_err();
        assert!(matches!(err, EngineError::Validation { path, .. } if path == "posts.rating"));
    }

    #[test]
    fn validate_ignores_undeclared_keys() {
        let template = post_template();
        assert!(validate(&template, &json!({"title": "ok", "legacy": 1})).is_ok());
    }

    #[test]
    fn validate_checks_block_discriminators() {
        let template = blocks_template();
        assert!(validate(
            &template,
            &json!({"blocks": [{"_template": "hero", "heading": "Hi"}]}),
        )
        .is_ok());

        let err = validate(&template, &json!({"blocks": [{"heading": "Hi"}]})).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn defaults_include_nested_objects() {
        let mut description = meta("description");
        description.default = Some(json!("A page"));
        let template = Template {
            name: "posts".into(),
            label: None,
            fields: vec![
                Field::Number {
                    meta: {
                        let mut m = meta("rating");
                        m.default = Some(json!(3));
                        m
                    },
                },
                Field::Object {
                    meta: meta("seo"),
                    fields: vec![Field::String { meta: description }],
                    templates: vec![],
                },
            ],
        };
        let values = defaults(&template);
        assert_eq!(values["rating"], 3);
        assert_eq!(values["seo"]["description"], "A page");
    }
}

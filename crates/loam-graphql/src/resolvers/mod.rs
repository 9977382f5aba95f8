//! Field resolvers for the generated type graph.
//!
//! Resolved documents travel through the executor as plain GraphQL
//! values. Every document value carries a `_type` key naming its
//! concrete generated type so abstract positions (unions, `node`) can
//! dispatch without re-deriving the type from the schema.

pub(crate) mod collection;
pub(crate) mod create;
pub(crate) mod list;
pub(crate) mod read;
pub(crate) mod update;

use std::collections::HashMap;

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use async_graphql::{ErrorExtensions, Value as GqlValue};
use serde_json::json;

use loam_core::{encode_id, form_descriptor, Collection, SystemInfo};
use loam_storage::StoredDocument;

use crate::error::EngineError;
use crate::merge::TEMPLATE_KEY;
use crate::schema::SchemaSnapshot;

/// Key carrying the concrete generated type name inside document values.
pub(crate) const TYPE_KEY: &str = "_type";

/// Converts resolver-side JSON into a GraphQL value.
pub(crate) fn json_value(value: serde_json::Value) -> Result<GqlValue, async_graphql::Error> {
    GqlValue::from_json(value)
        .map_err(|e| EngineError::internal(format!("json conversion failed: {e}")).extend())
}

/// Wraps a value for the executor, attaching its concrete type name when
/// the value carries one.
pub(crate) fn typed_field_value(value: GqlValue) -> FieldValue<'static> {
    if let GqlValue::Object(map) = &value {
        if let Some(GqlValue::String(ty)) = map.get(TYPE_KEY) {
            let ty = ty.clone();
            return FieldValue::value(value).with_type(ty);
        }
    }
    FieldValue::value(value)
}

/// Resolver that looks a key up in the parent object value.
///
/// Lists are unpacked element by element so object-typed elements keep
/// their concrete type annotation.
pub(crate) fn extract(
    field_name: impl Into<String>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    let field_name = field_name.into();
    move |ctx| {
        let field_name = field_name.clone();
        FieldFuture::new(async move {
            let Some(GqlValue::Object(map)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            match map.get(field_name.as_str()) {
                None | Some(GqlValue::Null) => Ok(None),
                Some(GqlValue::List(items)) => Ok(Some(FieldValue::list(
                    items.clone().into_iter().map(typed_field_value),
                ))),
                Some(value) => Ok(Some(typed_field_value(value.clone()))),
            }
        })
    }
}

/// Resolver that returns the parent object's value for a key untouched.
///
/// Used for JSON-scalar fields, where an array value is the scalar
/// itself and must not be unpacked into field values.
pub(crate) fn extract_raw(
    field_name: impl Into<String>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    let field_name = field_name.into();
    move |ctx| {
        let field_name = field_name.clone();
        FieldFuture::new(async move {
            let Some(GqlValue::Object(map)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            match map.get(field_name.as_str()) {
                None | Some(GqlValue::Null) => Ok(None),
                Some(value) => Ok(Some(FieldValue::value(value.clone()))),
            }
        })
    }
}

/// Resolver for a block union field: entries are dispatched to their
/// member type by the stored template discriminator.
pub(crate) fn blocks(
    field_name: impl Into<String>,
    members: HashMap<String, String>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    let field_name = field_name.into();
    move |ctx| {
        let field_name = field_name.clone();
        let members = members.clone();
        FieldFuture::new(async move {
            let Some(GqlValue::Object(map)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            match map.get(field_name.as_str()) {
                None | Some(GqlValue::Null) => Ok(None),
                Some(GqlValue::List(items)) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items.clone() {
                        out.push(block_member(&members, item)?);
                    }
                    Ok(Some(FieldValue::list(out)))
                }
                Some(value) => Ok(Some(block_member(&members, value.clone())?)),
            }
        })
    }
}

fn block_member(
    members: &HashMap<String, String>,
    value: GqlValue,
) -> Result<FieldValue<'static>, async_graphql::Error> {
    let GqlValue::Object(map) = &value else {
        return Err(EngineError::mismatch("block entry is not an object").extend());
    };
    let Some(GqlValue::String(tag)) = map.get(TEMPLATE_KEY) else {
        return Err(
            EngineError::mismatch("block entry is missing its template discriminator").extend(),
        );
    };
    let Some(ty) = members.get(tag.as_str()) else {
        return Err(EngineError::mismatch(format!("unknown block template `{tag}`")).extend());
    };
    Ok(FieldValue::value(value).with_type(ty.clone()))
}

/// Assembles the full resolved shape of a stored document.
pub(crate) fn document_value(
    snapshot: &SchemaSnapshot,
    collection: &Collection,
    relative_path: &str,
    stored: &StoredDocument,
) -> Result<serde_json::Value, EngineError> {
    let template = collection.template(&stored.template).ok_or_else(|| {
        EngineError::mismatch(format!(
            "document `{}/{}` declares unknown template `{}`",
            collection.name, relative_path, stored.template
        ))
    })?;
    let sys = SystemInfo::new(collection, relative_path, &template.name);
    let sys = serde_json::to_value(&sys).map_err(|e| EngineError::internal(e.to_string()))?;
    let form = form_descriptor(template.label_or_name(), &collection.name, &template);
    Ok(json!({
        "id": encode_id(&collection.name, relative_path),
        "sys": sys,
        "data": stored.values,
        "form": form,
        "values": stored.values,
        "_type": snapshot.document_type_name(collection, &template.name),
    }))
}

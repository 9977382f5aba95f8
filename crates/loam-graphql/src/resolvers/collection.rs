//! Collection metadata resolvers: `getCollection`, `getCollections`, and
//! `getDocumentFields`.

use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use async_graphql::{ErrorExtensions, Value as GqlValue};
use serde_json::{json, Map, Value};

use loam_core::document::field_descriptor;
use loam_core::{Collection, CollectionTemplates};

use crate::error::EngineError;
use crate::resolvers::{json_value, typed_field_value};
use crate::schema::SchemaSnapshot;

/// JSON description of a collection's declared shape.
pub(crate) fn collection_descriptor(collection: &Collection) -> Value {
    let mut out = Map::new();
    out.insert("name".into(), json!(collection.name));
    out.insert("slug".into(), json!(collection.slug()));
    out.insert("label".into(), json!(collection.label_or_name()));
    out.insert("path".into(), json!(collection.path));
    out.insert("format".into(), json!(collection.format));
    out.insert("matches".into(), json!(collection.match_glob));
    match &collection.templates {
        CollectionTemplates::Fields { fields } => {
            out.insert(
                "fields".into(),
                json!(fields.iter().map(field_descriptor).collect::<Vec<_>>()),
            );
        }
        CollectionTemplates::Templates { templates } => {
            out.insert(
                "templates".into(),
                json!(templates
                    .iter()
                    .map(|t| json!({
                        "name": t.name,
                        "label": t.label_or_name(),
                        "fields": t.fields.iter().map(field_descriptor).collect::<Vec<_>>(),
                    }))
                    .collect::<Vec<_>>()),
            );
        }
    }
    Value::Object(out)
}

/// `getCollection(collection)`.
pub(crate) fn get_collection(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let name = ctx.args.try_get("collection")?.string()?.to_string();
            let collection = snapshot
                .schema
                .collection(&name)
                .ok_or_else(|| EngineError::not_found(&name, "*").extend())?;
            Ok(Some(typed_field_value(json_value(collection_descriptor(
                collection,
            ))?)))
        })
    }
}

/// `getCollections`.
pub(crate) fn get_collections(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |_ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let mut out = Vec::with_capacity(snapshot.schema.collections.len());
            for collection in &snapshot.schema.collections {
                out.push(typed_field_value(json_value(collection_descriptor(
                    collection,
                ))?));
            }
            Ok(Some(FieldValue::list(out)))
        })
    }
}

/// `getDocumentFields`: the full field definition map, keyed by
/// collection name.
pub(crate) fn get_document_fields(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |_ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let mut out = Map::new();
            for collection in &snapshot.schema.collections {
                let entry = match &collection.templates {
                    CollectionTemplates::Fields { fields } => json!({
                        "collection": collection.name,
                        "fields": fields.iter().map(field_descriptor).collect::<Vec<_>>(),
                    }),
                    CollectionTemplates::Templates { templates } => {
                        let mut by_name = Map::new();
                        for template in templates {
                            by_name.insert(
                                template.name.clone(),
                                json!({
                                    "label": template.label_or_name(),
                                    "fields": template
                                        .fields
                                        .iter()
                                        .map(field_descriptor)
                                        .collect::<Vec<_>>(),
                                }),
                            );
                        }
                        json!({
                            "collection": collection.name,
                            "templates": by_name,
                        })
                    }
                };
                out.insert(collection.name.clone(), entry);
            }
            Ok(Some(FieldValue::value(json_value(Value::Object(out))?)))
        })
    }
}

/// `SystemInfo.collection`: expands the owning collection name recorded
/// in the document's system metadata into the full descriptor.
pub(crate) fn sys_collection(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let Some(GqlValue::Object(map)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            let Some(GqlValue::String(name)) = map.get("collection") else {
                return Ok(None);
            };
            let collection = snapshot
                .schema
                .collection(name)
                .ok_or_else(|| {
                    EngineError::internal(format!("collection `{name}` vanished")).extend()
                })?;
            Ok(Some(FieldValue::value(json_value(collection_descriptor(
                collection,
            ))?)))
        })
    }
}

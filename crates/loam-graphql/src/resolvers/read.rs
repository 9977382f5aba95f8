//! Single-document read resolvers: `node`, `getDocument`, per-collection
//! getters, and reference fields.

use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use async_graphql::{ErrorExtensions, Value as GqlValue};
use futures_util::future::try_join_all;
use tracing::debug;

use loam_core::decode_id;

use crate::context::GraphQLContext;
use crate::error::EngineError;
use crate::resolvers::{document_value, json_value, typed_field_value};
use crate::schema::SchemaSnapshot;

/// Loads a document and assembles its resolved shape.
pub(crate) async fn load_document(
    gctx: &GraphQLContext,
    snapshot: &SchemaSnapshot,
    collection_name: &str,
    relative_path: &str,
) -> Result<serde_json::Value, async_graphql::Error> {
    let collection = snapshot
        .schema
        .collection(collection_name)
        .ok_or_else(|| EngineError::not_found(collection_name, relative_path).extend())?;
    let stored = gctx
        .store
        .read(collection_name, relative_path)
        .await
        .map_err(|e| EngineError::from(e).extend())?
        .ok_or_else(|| EngineError::not_found(collection_name, relative_path).extend())?;
    document_value(snapshot, collection, relative_path, &stored).map_err(|e| e.extend())
}

/// `node(id)`: global lookup by encoded document id.
pub(crate) fn node(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let id = ctx.args.try_get("id")?.string()?.to_string();
            let Some((collection, relative_path)) = decode_id(&id) else {
                return Err(EngineError::validation("id", "malformed document id").extend());
            };
            debug!(request_id = %gctx.request_id, %id, "resolving node");
            let doc = load_document(gctx, &snapshot, collection, relative_path).await?;
            Ok(Some(typed_field_value(json_value(doc)?)))
        })
    }
}

/// `getDocument(collection, relativePath)`.
pub(crate) fn get_document(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let collection = ctx.args.try_get("collection")?.string()?.to_string();
            let relative_path = ctx.args.try_get("relativePath")?.string()?.to_string();
            let doc = load_document(gctx, &snapshot, &collection, &relative_path).await?;
            Ok(Some(typed_field_value(json_value(doc)?)))
        })
    }
}

/// `get<Collection>Document(relativePath)` with the collection baked in.
pub(crate) fn get_collection_document(
    snapshot: Arc<SchemaSnapshot>,
    collection: String,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        let collection = collection.clone();
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let relative_path = ctx.args.try_get("relativePath")?.string()?.to_string();
            let doc = load_document(gctx, &snapshot, &collection, &relative_path).await?;
            Ok(Some(typed_field_value(json_value(doc)?)))
        })
    }
}

/// Resolver for a reference field: dereferences the stored path value
/// (or each value of a list) into the target document.
pub(crate) fn reference(
    field_name: String,
    targets: Vec<String>,
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let field_name = field_name.clone();
        let targets = targets.clone();
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let Some(GqlValue::Object(map)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            match map.get(field_name.as_str()) {
                None | Some(GqlValue::Null) => Ok(None),
                Some(GqlValue::String(raw)) => {
                    let doc = resolve_reference(gctx, &snapshot, &targets, raw).await?;
                    Ok(Some(typed_field_value(json_value(doc)?)))
                }
                Some(GqlValue::List(items)) => {
                    let mut raws = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            GqlValue::String(raw) => raws.push(raw.clone()),
                            other => {
                                return Err(EngineError::mismatch(format!(
                                    "reference list entry is not a string: {other}"
                                ))
                                .extend())
                            }
                        }
                    }
                    // Sibling dereferences are independent reads.
                    let docs = try_join_all(
                        raws.iter()
                            .map(|raw| resolve_reference(gctx, &snapshot, &targets, raw)),
                    )
                    .await?;
                    let mut out = Vec::with_capacity(docs.len());
                    for doc in docs {
                        out.push(typed_field_value(json_value(doc)?));
                    }
                    Ok(Some(FieldValue::list(out)))
                }
                Some(other) => Err(EngineError::mismatch(format!(
                    "reference value is not a string: {other}"
                ))
                .extend()),
            }
        })
    }
}

/// Resolves one stored reference value against the declared targets.
///
/// A value of the form `collection/relativePath` must name a declared
/// target. A bare relative path is accepted only when the field has
/// exactly one target.
async fn resolve_reference(
    gctx: &GraphQLContext,
    snapshot: &SchemaSnapshot,
    targets: &[String],
    raw: &str,
) -> Result<serde_json::Value, async_graphql::Error> {
    if let Some((collection, rest)) = raw.split_once('/') {
        if targets.iter().any(|t| t == collection) {
            return load_document(gctx, snapshot, collection, rest).await;
        }
    }
    if let [only] = targets {
        return load_document(gctx, snapshot, only, raw).await;
    }
    Err(EngineError::mismatch(format!(
        "reference value `{raw}` does not name a declared target collection"
    ))
    .extend())
}

//! `updateDocument` and per-collection update mutations.
//!
//! A mutation holds its document's lock for the whole read-merge-write
//! cycle, so concurrent mutations on one path conflict instead of
//! interleaving. Validation happens on the fully merged document before
//! the single write goes out.

use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use async_graphql::ErrorExtensions;
use serde_json::{json, Value};
use tracing::debug;

use loam_storage::StoredDocument;

use crate::context::GraphQLContext;
use crate::error::EngineError;
use crate::merge;
use crate::resolvers::{document_value, json_value, typed_field_value};
use crate::schema::SchemaSnapshot;

/// `updateDocument(collection, relativePath, params)`: the generic form,
/// whose params are keyed by collection name.
pub(crate) fn update_document(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let collection = ctx.args.try_get("collection")?.string()?.to_string();
            let relative_path = ctx.args.try_get("relativePath")?.string()?.to_string();
            let params: Value = ctx.args.try_get("params")?.deserialize()?;

            let Value::Object(selector) = params else {
                return Err(EngineError::validation("params", "expected an object").extend());
            };
            if selector.len() != 1 {
                return Err(EngineError::validation(
                    "params",
                    "params must name exactly one collection",
                )
                .extend());
            }
            let Some(inner) = selector.get(&collection) else {
                return Err(EngineError::validation(
                    "params",
                    format!("params do not match collection `{collection}`"),
                )
                .extend());
            };

            let doc =
                perform_update(gctx, &snapshot, &collection, &relative_path, inner.clone())
                    .await?;
            Ok(Some(typed_field_value(json_value(doc)?)))
        })
    }
}

/// `update<Collection>Document(relativePath, params)`.
pub(crate) fn update_collection_document(
    snapshot: Arc<SchemaSnapshot>,
    collection: String,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        let collection = collection.clone();
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let relative_path = ctx.args.try_get("relativePath")?.string()?.to_string();
            let params: Value = ctx.args.try_get("params")?.deserialize()?;
            let doc = perform_update(gctx, &snapshot, &collection, &relative_path, params).await?;
            Ok(Some(typed_field_value(json_value(doc)?)))
        })
    }
}

/// The shared read-merge-validate-write cycle.
async fn perform_update(
    gctx: &GraphQLContext,
    snapshot: &SchemaSnapshot,
    collection_name: &str,
    relative_path: &str,
    params: Value,
) -> Result<serde_json::Value, async_graphql::Error> {
    let collection = snapshot
        .schema
        .collection(collection_name)
        .ok_or_else(|| EngineError::not_found(collection_name, relative_path).extend())?;

    let _guard = gctx
        .locks
        .acquire(collection_name, relative_path)
        .map_err(|e| e.extend())?;
    let stored = gctx
        .store
        .read(collection_name, relative_path)
        .await
        .map_err(|e| EngineError::from(e).extend())?
        .ok_or_else(|| EngineError::not_found(collection_name, relative_path).extend())?;

    let (template, payload, base) = if collection.is_polymorphic() {
        let Value::Object(selector) = &params else {
            return Err(
                EngineError::validation("params", "expected a template selector").extend(),
            );
        };
        if selector.len() != 1 {
            return Err(EngineError::validation(
                "params",
                "params must name exactly one template",
            )
            .extend());
        }
        let (name, inner) = selector
            .iter()
            .next()
            .ok_or_else(|| EngineError::internal("empty selector after length check").extend())?;
        let template = collection.template(name).ok_or_else(|| {
            EngineError::validation(
                "params",
                format!("collection `{collection_name}` has no template `{name}`"),
            )
            .extend()
        })?;
        // Naming a different template re-shapes the document from scratch.
        let base = if template.name == stored.template {
            stored.values.clone()
        } else {
            json!({})
        };
        (template, inner.clone(), base)
    } else {
        let template = collection
            .template_list()
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::internal("collection has no templates").extend())?;
        // A foreign stored discriminator fails the read path; merging over
        // it would silently re-template the document.
        if stored.template != template.name {
            return Err(EngineError::mismatch(format!(
                "document `{collection_name}/{relative_path}` declares unknown template `{}`",
                stored.template
            ))
            .extend());
        }
        (template, params, stored.values.clone())
    };

    let merged = merge::apply(&template, &base, &payload).map_err(|e| e.extend())?;
    merge::validate(&template, &merged).map_err(|e| e.extend())?;
    debug!(
        request_id = %gctx.request_id,
        collection = %collection_name,
        relative_path = %relative_path,
        template = %template.name,
        "updating document"
    );
    gctx.store
        .write(collection_name, relative_path, &template.name, &merged)
        .await
        .map_err(|e| EngineError::from(e).extend())?;

    let stored = StoredDocument::new(&template.name, merged);
    document_value(snapshot, collection, relative_path, &stored).map_err(|e| e.extend())
}

//! Connection resolvers with Relay-style cursor pagination.
//!
//! The full result set is the sorted list of document keys
//! (`collection/relativePath`); a cursor is the opaque encoding of the
//! key it points at. Sorting by the key keeps pages deterministic for a
//! fixed store and keeps cursors valid across unrelated writes.

use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use async_graphql::{ErrorExtensions, Value as GqlValue};
use serde_json::json;
use tracing::{debug, warn};

use loam_core::{decode_id, encode_id};

use crate::context::GraphQLContext;
use crate::error::EngineError;
use crate::resolvers::{document_value, json_value, typed_field_value};
use crate::schema::SchemaSnapshot;

/// Page size applied when neither `first` nor `last` is given.
const DEFAULT_PAGE_SIZE: usize = 10;

pub(crate) mod cursor {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    /// Encodes a document key as an opaque cursor.
    pub(crate) fn encode(key: &str) -> String {
        URL_SAFE_NO_PAD.encode(key)
    }

    /// Decodes a cursor back to its document key.
    pub(crate) fn decode(cursor: &str) -> Option<String> {
        let bytes = URL_SAFE_NO_PAD.decode(cursor).ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Pagination arguments shared by every connection field.
#[derive(Debug, Default)]
pub(crate) struct PageArgs {
    first: Option<usize>,
    last: Option<usize>,
    after: Option<String>,
    before: Option<String>,
}

impl PageArgs {
    /// Extracts and sanity-checks the pagination arguments.
    pub(crate) fn from_ctx(ctx: &ResolverContext<'_>) -> Result<Self, async_graphql::Error> {
        let count = |name: &str| -> Result<Option<usize>, async_graphql::Error> {
            match ctx.args.get(name) {
                None => Ok(None),
                Some(v) => {
                    let n = v.i64()?;
                    usize::try_from(n)
                        .map(Some)
                        .map_err(|_| EngineError::validation(name, "must be non-negative").extend())
                }
            }
        };
        let key = |name: &str| -> Result<Option<String>, async_graphql::Error> {
            match ctx.args.get(name) {
                None => Ok(None),
                Some(v) => cursor::decode(v.string()?)
                    .map(Some)
                    .ok_or_else(|| EngineError::validation(name, "malformed cursor").extend()),
            }
        };
        Ok(Self {
            first: count("first")?,
            last: count("last")?,
            after: key("after")?,
            before: key("before")?,
        })
    }
}

/// Resolves a page of documents, scoped to one collection or spanning
/// all of them.
pub(crate) async fn resolve_connection(
    gctx: &GraphQLContext,
    snapshot: &SchemaSnapshot,
    filter: Option<&str>,
    args: PageArgs,
) -> Result<serde_json::Value, async_graphql::Error> {
    let collections: Vec<&str> = match filter {
        Some(name) => {
            if snapshot.schema.collection(name).is_none() {
                return Err(EngineError::not_found(name, "*").extend());
            }
            vec![name]
        }
        None => snapshot
            .schema
            .collections
            .iter()
            .map(|c| c.name.as_str())
            .collect(),
    };

    let mut keys = Vec::new();
    for name in collections {
        for relative_path in gctx
            .store
            .list(name)
            .await
            .map_err(|e| EngineError::from(e).extend())?
        {
            keys.push(encode_id(name, &relative_path));
        }
    }
    keys.sort();
    let total = keys.len();

    // Relay window: cursors bound the range, then first/last trim it.
    let mut start = match &args.after {
        Some(after) => keys.partition_point(|k| k.as_str() <= after.as_str()),
        None => 0,
    };
    let mut end = match &args.before {
        Some(before) => keys.partition_point(|k| k.as_str() < before.as_str()),
        None => total,
    };
    end = end.max(start);
    if let Some(first) = args.first {
        end = end.min(start + first);
    }
    if let Some(last) = args.last {
        start = start.max(end.saturating_sub(last));
    }
    if args.first.is_none() && args.last.is_none() {
        end = end.min(start + DEFAULT_PAGE_SIZE);
    }

    debug!(
        request_id = %gctx.request_id,
        collection = filter.unwrap_or("*"),
        total,
        page = end - start,
        "resolving connection"
    );

    let mut edges = Vec::with_capacity(end - start);
    for key in &keys[start..end] {
        let Some((collection_name, relative_path)) = decode_id(key) else {
            return Err(EngineError::internal(format!("malformed document key `{key}`")).extend());
        };
        let collection = snapshot.schema.collection(collection_name).ok_or_else(|| {
            EngineError::internal(format!("collection `{collection_name}` vanished")).extend()
        })?;
        let Some(stored) = gctx
            .store
            .read(collection_name, relative_path)
            .await
            .map_err(|e| EngineError::from(e).extend())?
        else {
            // Deleted between list and read; the page is best effort.
            warn!(request_id = %gctx.request_id, key = %key, "document vanished during pagination");
            continue;
        };
        let node =
            document_value(snapshot, collection, relative_path, &stored).map_err(|e| e.extend())?;
        edges.push(json!({
            "cursor": cursor::encode(key),
            "node": node,
        }));
    }

    let start_cursor = edges.first().map(|e| e["cursor"].clone());
    let end_cursor = edges.last().map(|e| e["cursor"].clone());
    Ok(json!({
        "pageInfo": {
            "hasPreviousPage": start > 0,
            "hasNextPage": end < total,
            "startCursor": start_cursor,
            "endCursor": end_cursor,
        },
        "totalCount": total,
        "edges": edges,
    }))
}

/// `getDocumentList(collection?, ...)`: optionally filtered global list.
pub(crate) fn get_document_list(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let args = PageArgs::from_ctx(&ctx)?;
            let filter = match ctx.args.get("collection") {
                Some(v) => Some(v.string()?.to_string()),
                None => None,
            };
            let page = resolve_connection(gctx, &snapshot, filter.as_deref(), args).await?;
            Ok(Some(typed_field_value(json_value(page)?)))
        })
    }
}

/// `get<Collection>List(...)` with the collection baked in.
pub(crate) fn get_collection_list(
    snapshot: Arc<SchemaSnapshot>,
    collection: String,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        let collection = collection.clone();
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let args = PageArgs::from_ctx(&ctx)?;
            let page = resolve_connection(gctx, &snapshot, Some(&collection), args).await?;
            Ok(Some(typed_field_value(json_value(page)?)))
        })
    }
}

/// `Collection.documents`: pages the collection named by the parent value.
pub(crate) fn collection_documents(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let args = PageArgs::from_ctx(&ctx)?;
            let Some(GqlValue::Object(map)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            let Some(GqlValue::String(name)) = map.get("name") else {
                return Err(
                    EngineError::internal("collection value is missing its name").extend(),
                );
            };
            let name = name.clone();
            let page = resolve_connection(gctx, &snapshot, Some(&name), args).await?;
            Ok(Some(typed_field_value(json_value(page)?)))
        })
    }
}

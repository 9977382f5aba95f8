//! `addPendingDocument`: registers a new document seeded from its
//! template's declared defaults.

use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use async_graphql::ErrorExtensions;
use tracing::debug;

use loam_core::Template;
use loam_storage::StoredDocument;

use crate::context::GraphQLContext;
use crate::error::EngineError;
use crate::merge;
use crate::resolvers::{document_value, json_value, typed_field_value};
use crate::schema::SchemaSnapshot;

pub(crate) fn add_pending_document(
    snapshot: Arc<SchemaSnapshot>,
) -> impl for<'b> Fn(ResolverContext<'b>) -> FieldFuture<'b> + Send + Sync + 'static {
    move |ctx| {
        let snapshot = Arc::clone(&snapshot);
        FieldFuture::new(async move {
            let gctx = ctx.data::<GraphQLContext>()?;
            let collection_name = ctx.args.try_get("collection")?.string()?.to_string();
            let relative_path = ctx.args.try_get("relativePath")?.string()?.to_string();
            let template_arg = match ctx.args.get("template") {
                Some(v) => Some(v.string()?.to_string()),
                None => None,
            };

            let collection = snapshot
                .schema
                .collection(&collection_name)
                .ok_or_else(|| {
                    EngineError::not_found(&collection_name, &relative_path).extend()
                })?;

            let _guard = gctx
                .locks
                .acquire(&collection_name, &relative_path)
                .map_err(|e| e.extend())?;
            if gctx
                .store
                .exists(&collection_name, &relative_path)
                .await
                .map_err(|e| EngineError::from(e).extend())?
            {
                return Err(
                    EngineError::already_exists(&collection_name, &relative_path).extend(),
                );
            }

            let template =
                select_template(collection, template_arg.as_deref()).map_err(|e| e.extend())?;
            let values = merge::defaults(&template);
            debug!(
                request_id = %gctx.request_id,
                collection = %collection_name,
                relative_path = %relative_path,
                template = %template.name,
                "adding pending document"
            );
            gctx.store
                .write(&collection_name, &relative_path, &template.name, &values)
                .await
                .map_err(|e| EngineError::from(e).extend())?;

            let stored = StoredDocument::new(&template.name, values);
            let doc = document_value(&snapshot, collection, &relative_path, &stored)
                .map_err(|e| e.extend())?;
            Ok(Some(typed_field_value(json_value(doc)?)))
        })
    }
}

/// Picks the template for a new document. Polymorphic collections demand
/// an explicit choice; single-template collections allow it only when it
/// matches.
fn select_template(
    collection: &loam_core::Collection,
    template_arg: Option<&str>,
) -> Result<Template, EngineError> {
    if collection.is_polymorphic() {
        let name = template_arg.ok_or_else(|| {
            EngineError::validation(
                "template",
                format!(
                    "collection `{}` is polymorphic; a template must be named",
                    collection.name
                ),
            )
        })?;
        collection.template(name).ok_or_else(|| {
            EngineError::validation(
                "template",
                format!("collection `{}` has no template `{name}`", collection.name),
            )
        })
    } else {
        let template = collection
            .template_list()
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::internal("collection has no templates"))?;
        if let Some(name) = template_arg {
            if name != template.name {
                return Err(EngineError::validation(
                    "template",
                    format!("collection `{}` has no template `{name}`", collection.name),
                ));
            }
        }
        Ok(template)
    }
}

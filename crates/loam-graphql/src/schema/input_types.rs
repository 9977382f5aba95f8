//! Mutation input types.
//!
//! Every field of an input type is optional: a mutation payload is a
//! partial overlay. Block union fields take keyed selector inputs
//! (`{"hero": {...}}`) with one field per member template, and the
//! top-level `DocumentMutation` input is the same shape one level up,
//! keyed by collection name.

use async_graphql::dynamic::{InputObject, InputValue, TypeRef};

use loam_core::names::{type_name, ArtifactKind, SchemaPath};
use loam_core::Field;

use crate::error::EngineError;
use crate::schema::SchemaSnapshot;

fn list_ref(name: impl Into<String>, list: bool) -> TypeRef {
    if list {
        TypeRef::named_list(name)
    } else {
        TypeRef::named(name)
    }
}

/// Builds every mutation input type for a snapshot.
///
/// # Errors
///
/// Returns an internal error for a collection with no templates, which
/// schema validation rules out.
pub(crate) fn build(snapshot: &SchemaSnapshot) -> Result<Vec<InputObject>, EngineError> {
    let mut out = Vec::new();
    let mut document_mutation = InputObject::new("DocumentMutation");

    for collection in &snapshot.schema.collections {
        let base = SchemaPath::root(&collection.name);
        let mutation_name = type_name(&base, ArtifactKind::Mutation);

        if collection.is_polymorphic() {
            let mut selector = InputObject::new(&mutation_name);
            for template in collection.template_list() {
                let path = base.child(&template.name);
                let template_input = fields_input(&path, &template.fields, &mut out);
                selector = selector.field(InputValue::new(
                    &template.name,
                    TypeRef::named(template_input),
                ));
            }
            out.push(selector);
        } else {
            let template = collection
                .template_list()
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::internal("collection has no templates"))?;
            fields_input(&base, &template.fields, &mut out);
        }

        document_mutation = document_mutation.field(InputValue::new(
            &collection.name,
            TypeRef::named(&mutation_name),
        ));
    }

    out.push(document_mutation);
    Ok(out)
}

/// Registers the input object for a field list and returns its name.
fn fields_input(path: &SchemaPath, fields: &[Field], out: &mut Vec<InputObject>) -> String {
    let name = type_name(path, ArtifactKind::Mutation);
    let mut input = InputObject::new(&name);
    for field in fields {
        let meta = field.meta();
        let ty = match field {
            Field::String { .. }
            | Field::Text { .. }
            | Field::Datetime { .. }
            | Field::Image { .. }
            | Field::Reference { .. } => list_ref(TypeRef::STRING, meta.list),
            Field::Number { .. } => list_ref(TypeRef::FLOAT, meta.list),
            Field::Boolean { .. } => list_ref(TypeRef::BOOLEAN, meta.list),
            Field::Object {
                fields: nested,
                templates,
                ..
            } if templates.is_empty() => {
                let nested_name = fields_input(&path.child(field.name()), nested, out);
                list_ref(nested_name, meta.list)
            }
            Field::Object { templates, .. } | Field::RichText { templates, .. }
                if !templates.is_empty() =>
            {
                let child = path.child(field.name());
                let selector_name = type_name(&child, ArtifactKind::Mutation);
                let mut selector = InputObject::new(&selector_name);
                for template in templates {
                    let member = fields_input(&child.child(&template.name), &template.fields, out);
                    selector = selector.field(InputValue::new(
                        &template.name,
                        TypeRef::named(member),
                    ));
                }
                out.push(selector);
                list_ref(selector_name, meta.list)
            }
            Field::RichText { .. } => list_ref("JSON", meta.list),
            // Schema validation rejects object fields with neither fields
            // nor templates; the match still has to be total.
            Field::Object { .. } => list_ref("JSON", meta.list),
        };
        input = input.field(InputValue::new(field.name(), ty));
    }
    out.push(input);
    name
}

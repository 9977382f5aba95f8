//! Builds the dynamic GraphQL type graph from a schema snapshot.
//!
//! Every collection contributes its data types (one per template, plus
//! nested objects and block unions), a document type, a connection pair,
//! and its entries on the root `Query` and `Mutation` objects. The
//! cross-collection surface is the `DocumentNode` union, the generic
//! `getDocument`/`getDocumentList` operations, and `updateDocument`.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{
    Field, InputValue, Object, Scalar, Schema as DynamicSchema, TypeRef, Union,
};
use tracing::debug;

use loam_core::names::{pascal_case, type_name, ArtifactKind, SchemaPath};
use loam_core::{Collection, Field as SchemaField};

use crate::error::EngineError;
use crate::resolvers::{
    self, collection as collections, create, extract, extract_raw, list, read, update,
};
use crate::schema::{input_types, SchemaSnapshot};

/// Name of the cross-collection document union.
const DOCUMENT_NODE: &str = "DocumentNode";

fn list_ref(name: impl Into<String>, list: bool) -> TypeRef {
    if list {
        TypeRef::named_list(name)
    } else {
        TypeRef::named(name)
    }
}

fn paginated(field: Field) -> Field {
    field
        .argument(InputValue::new("before", TypeRef::named(TypeRef::STRING)))
        .argument(InputValue::new("after", TypeRef::named(TypeRef::STRING)))
        .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new("last", TypeRef::named(TypeRef::INT)))
}

/// Compiles one snapshot into an executable GraphQL schema.
pub struct TypeBuilder {
    snapshot: Arc<SchemaSnapshot>,
    objects: Vec<Object>,
    unions: Vec<Union>,
}

impl TypeBuilder {
    /// Creates a builder over a compiled snapshot.
    #[must_use]
    pub fn new(snapshot: Arc<SchemaSnapshot>) -> Self {
        Self {
            snapshot,
            objects: Vec::new(),
            unions: Vec::new(),
        }
    }

    /// Builds the executable schema.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SchemaBuild`] if the GraphQL layer rejects
    /// the assembled type graph.
    pub fn build(mut self) -> Result<DynamicSchema, EngineError> {
        let snapshot = Arc::clone(&self.snapshot);

        for collection in &snapshot.schema.collections {
            self.register_collection(collection)?;
        }
        self.register_connection("DocumentConnection", "DocumentConnectionEdges", DOCUMENT_NODE);

        let mut builder = DynamicSchema::build("Query", Some("Mutation"), None)
            .register(Scalar::new("JSON"))
            .register(page_info_type())
            .register(system_info_type(Arc::clone(&snapshot)))
            .register(collection_type(Arc::clone(&snapshot)))
            .register(self.document_node_union())
            .register(self.query_type())
            .register(self.mutation_type());

        let type_count = self.objects.len() + self.unions.len();
        for object in self.objects {
            builder = builder.register(object);
        }
        for union in self.unions {
            builder = builder.register(union);
        }
        for input in input_types::build(&snapshot)? {
            builder = builder.register(input);
        }

        debug!(
            collections = snapshot.schema.collections.len(),
            generated_types = type_count,
            "building graphql schema"
        );
        builder
            .finish()
            .map_err(|e| EngineError::SchemaBuild(e.to_string()))
    }

    fn register_collection(&mut self, collection: &Collection) -> Result<(), EngineError> {
        let base = SchemaPath::root(&collection.name);
        let doc_name = type_name(&base, ArtifactKind::Document);

        if collection.is_polymorphic() {
            let mut union = Union::new(doc_name.clone());
            for template in collection.template_list() {
                let path = base.child(&template.name);
                let data_name = self.register_data_object(&path, &template.fields)?;
                let member = type_name(&path, ArtifactKind::Document);
                self.objects.push(document_object(&member, &data_name));
                union = union.possible_type(member);
            }
            self.unions.push(union);
        } else {
            let template = collection
                .template_list()
                .into_iter()
                .next()
                .ok_or_else(|| EngineError::internal("collection has no templates"))?;
            let data_name = self.register_data_object(&base, &template.fields)?;
            self.objects.push(document_object(&doc_name, &data_name));
        }

        let connection = type_name(&base, ArtifactKind::Connection);
        let edges = type_name(&base, ArtifactKind::ConnectionEdges);
        self.register_connection(&connection, &edges, &doc_name);
        Ok(())
    }

    fn register_data_object(
        &mut self,
        path: &SchemaPath,
        fields: &[SchemaField],
    ) -> Result<String, EngineError> {
        let name = type_name(path, ArtifactKind::Data);
        let mut object = Object::new(&name);
        for field in fields {
            object = object.field(self.data_field(path, field)?);
        }
        self.objects.push(object);
        Ok(name)
    }

    fn data_field(
        &mut self,
        parent: &SchemaPath,
        field: &SchemaField,
    ) -> Result<Field, EngineError> {
        let meta = field.meta();
        let name = field.name().to_string();
        Ok(match field {
            SchemaField::String { .. }
            | SchemaField::Text { .. }
            | SchemaField::Datetime { .. }
            | SchemaField::Image { .. } => Field::new(
                name.clone(),
                list_ref(TypeRef::STRING, meta.list),
                extract(name),
            ),
            SchemaField::Number { .. } => Field::new(
                name.clone(),
                list_ref(TypeRef::FLOAT, meta.list),
                extract(name),
            ),
            SchemaField::Boolean { .. } => Field::new(
                name.clone(),
                list_ref(TypeRef::BOOLEAN, meta.list),
                extract(name),
            ),
            SchemaField::Reference { to, .. } => {
                let target = if let [only] = to.as_slice() {
                    type_name(&SchemaPath::root(only), ArtifactKind::Document)
                } else {
                    // Union over the document types of every listed target,
                    // named at the field path.
                    let union_name = type_name(&parent.child(&name), ArtifactKind::Document);
                    let mut union = Union::new(union_name.clone());
                    for member in to.iter().flat_map(|t| self.document_type_names(t)) {
                        union = union.possible_type(member);
                    }
                    self.unions.push(union);
                    union_name
                };
                Field::new(
                    name.clone(),
                    list_ref(target, meta.list),
                    read::reference(name, to.clone(), Arc::clone(&self.snapshot)),
                )
            }
            SchemaField::Object {
                fields: nested,
                templates,
                ..
            } if templates.is_empty() => {
                let path = parent.child(&name);
                let nested_name = self.register_data_object(&path, nested)?;
                Field::new(name.clone(), list_ref(nested_name, meta.list), extract(name))
            }
            SchemaField::Object { templates, .. } | SchemaField::RichText { templates, .. }
                if !templates.is_empty() =>
            {
                let path = parent.child(&name);
                let union_name = type_name(&path, ArtifactKind::Data);
                let mut union = Union::new(union_name.clone());
                let mut members = HashMap::new();
                for template in templates {
                    let member =
                        self.register_data_object(&path.child(&template.name), &template.fields)?;
                    union = union.possible_type(member.clone());
                    members.insert(template.name.clone(), member);
                }
                self.unions.push(union);
                Field::new(
                    name.clone(),
                    list_ref(union_name, meta.list),
                    resolvers::blocks(name, members),
                )
            }
            SchemaField::RichText { .. } => {
                if meta.list {
                    Field::new(name.clone(), TypeRef::named_list("JSON"), extract(name))
                } else {
                    Field::new(name.clone(), TypeRef::named("JSON"), extract_raw(name))
                }
            }
            // Schema validation rejects object fields with neither fields
            // nor templates; the match still has to be total.
            SchemaField::Object { .. } => {
                return Err(EngineError::internal(format!(
                    "object field `{name}` has neither fields nor templates"
                )))
            }
        })
    }

    fn register_connection(&mut self, connection: &str, edges: &str, node_type: &str) {
        self.objects.push(
            Object::new(edges)
                .field(Field::new(
                    "cursor",
                    TypeRef::named_nn(TypeRef::STRING),
                    extract("cursor"),
                ))
                .field(Field::new("node", TypeRef::named(node_type), extract("node"))),
        );
        self.objects.push(
            Object::new(connection)
                .field(Field::new(
                    "pageInfo",
                    TypeRef::named_nn("PageInfo"),
                    extract("pageInfo"),
                ))
                .field(Field::new(
                    "totalCount",
                    TypeRef::named_nn(TypeRef::INT),
                    extract("totalCount"),
                ))
                .field(Field::new(
                    "edges",
                    TypeRef::named_list(edges),
                    extract("edges"),
                )),
        );
    }

    /// Concrete document type names a collection contributes to unions.
    ///
    /// Polymorphic collections contribute one type per template; others a
    /// single document type. Unknown names contribute nothing (schema
    /// validation rejects unknown reference targets before this runs).
    fn document_type_names(&self, collection: &str) -> Vec<String> {
        let Some(collection) = self.snapshot.schema.collection(collection) else {
            return Vec::new();
        };
        let base = SchemaPath::root(&collection.name);
        if collection.is_polymorphic() {
            collection
                .template_list()
                .into_iter()
                .map(|t| type_name(&base.child(&t.name), ArtifactKind::Document))
                .collect()
        } else {
            vec![type_name(&base, ArtifactKind::Document)]
        }
    }

    fn document_node_union(&self) -> Union {
        let mut union = Union::new(DOCUMENT_NODE);
        for collection in &self.snapshot.schema.collections {
            for member in self.document_type_names(&collection.name) {
                union = union.possible_type(member);
            }
        }
        union
    }

    fn query_type(&self) -> Object {
        let snapshot = &self.snapshot;
        let mut query = Object::new("Query")
            .field(
                Field::new(
                    "getCollection",
                    TypeRef::named_nn("Collection"),
                    collections::get_collection(Arc::clone(snapshot)),
                )
                .argument(InputValue::new(
                    "collection",
                    TypeRef::named_nn(TypeRef::STRING),
                )),
            )
            .field(Field::new(
                "getCollections",
                TypeRef::named_nn_list_nn("Collection"),
                collections::get_collections(Arc::clone(snapshot)),
            ))
            .field(Field::new(
                "getDocumentFields",
                TypeRef::named_nn("JSON"),
                collections::get_document_fields(Arc::clone(snapshot)),
            ))
            .field(
                Field::new(
                    "node",
                    TypeRef::named(DOCUMENT_NODE),
                    read::node(Arc::clone(snapshot)),
                )
                .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::STRING))),
            )
            .field(
                Field::new(
                    "getDocument",
                    TypeRef::named_nn(DOCUMENT_NODE),
                    read::get_document(Arc::clone(snapshot)),
                )
                .argument(InputValue::new(
                    "collection",
                    TypeRef::named_nn(TypeRef::STRING),
                ))
                .argument(InputValue::new(
                    "relativePath",
                    TypeRef::named_nn(TypeRef::STRING),
                )),
            )
            .field(
                paginated(Field::new(
                    "getDocumentList",
                    TypeRef::named_nn("DocumentConnection"),
                    list::get_document_list(Arc::clone(snapshot)),
                ))
                .argument(InputValue::new("collection", TypeRef::named(TypeRef::STRING))),
            );

        for collection in &snapshot.schema.collections {
            let base = SchemaPath::root(&collection.name);
            let pascal = pascal_case(&collection.name);
            query = query
                .field(
                    Field::new(
                        format!("get{pascal}Document"),
                        TypeRef::named_nn(type_name(&base, ArtifactKind::Document)),
                        read::get_collection_document(
                            Arc::clone(snapshot),
                            collection.name.clone(),
                        ),
                    )
                    .argument(InputValue::new(
                        "relativePath",
                        TypeRef::named_nn(TypeRef::STRING),
                    )),
                )
                .field(paginated(Field::new(
                    format!("get{pascal}List"),
                    TypeRef::named_nn(type_name(&base, ArtifactKind::Connection)),
                    list::get_collection_list(Arc::clone(snapshot), collection.name.clone()),
                )));
        }
        query
    }

    fn mutation_type(&self) -> Object {
        let snapshot = &self.snapshot;
        let mut mutation = Object::new("Mutation")
            .field(
                Field::new(
                    "addPendingDocument",
                    TypeRef::named_nn(DOCUMENT_NODE),
                    create::add_pending_document(Arc::clone(snapshot)),
                )
                .argument(InputValue::new(
                    "collection",
                    TypeRef::named_nn(TypeRef::STRING),
                ))
                .argument(InputValue::new(
                    "relativePath",
                    TypeRef::named_nn(TypeRef::STRING),
                ))
                .argument(InputValue::new("template", TypeRef::named(TypeRef::STRING))),
            )
            .field(
                Field::new(
                    "updateDocument",
                    TypeRef::named_nn(DOCUMENT_NODE),
                    update::update_document(Arc::clone(snapshot)),
                )
                .argument(InputValue::new(
                    "collection",
                    TypeRef::named_nn(TypeRef::STRING),
                ))
                .argument(InputValue::new(
                    "relativePath",
                    TypeRef::named_nn(TypeRef::STRING),
                ))
                .argument(InputValue::new(
                    "params",
                    TypeRef::named_nn("DocumentMutation"),
                )),
            );

        for collection in &snapshot.schema.collections {
            let base = SchemaPath::root(&collection.name);
            let pascal = pascal_case(&collection.name);
            mutation = mutation.field(
                Field::new(
                    format!("update{pascal}Document"),
                    TypeRef::named_nn(type_name(&base, ArtifactKind::Document)),
                    update::update_collection_document(
                        Arc::clone(snapshot),
                        collection.name.clone(),
                    ),
                )
                .argument(InputValue::new(
                    "relativePath",
                    TypeRef::named_nn(TypeRef::STRING),
                ))
                .argument(InputValue::new(
                    "params",
                    TypeRef::named_nn(type_name(&base, ArtifactKind::Mutation)),
                )),
            );
        }
        mutation
    }
}

fn document_object(name: &str, data_name: &str) -> Object {
    Object::new(name)
        .field(Field::new("id", TypeRef::named_nn(TypeRef::ID), extract("id")))
        .field(Field::new(
            "sys",
            TypeRef::named_nn("SystemInfo"),
            extract("sys"),
        ))
        .field(Field::new(
            "data",
            TypeRef::named_nn(data_name),
            extract("data"),
        ))
        .field(Field::new(
            "form",
            TypeRef::named_nn("JSON"),
            extract_raw("form"),
        ))
        .field(Field::new(
            "values",
            TypeRef::named_nn("JSON"),
            extract_raw("values"),
        ))
}

fn page_info_type() -> Object {
    Object::new("PageInfo")
        .field(Field::new(
            "hasPreviousPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            extract("hasPreviousPage"),
        ))
        .field(Field::new(
            "hasNextPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            extract("hasNextPage"),
        ))
        .field(Field::new(
            "startCursor",
            TypeRef::named(TypeRef::STRING),
            extract("startCursor"),
        ))
        .field(Field::new(
            "endCursor",
            TypeRef::named(TypeRef::STRING),
            extract("endCursor"),
        ))
}

fn system_info_type(snapshot: Arc<SchemaSnapshot>) -> Object {
    Object::new("SystemInfo")
        .field(Field::new(
            "filename",
            TypeRef::named_nn(TypeRef::STRING),
            extract("filename"),
        ))
        .field(Field::new(
            "basename",
            TypeRef::named_nn(TypeRef::STRING),
            extract("basename"),
        ))
        .field(Field::new(
            "breadcrumbs",
            TypeRef::named_nn_list_nn(TypeRef::STRING),
            extract("breadcrumbs"),
        ))
        .field(Field::new(
            "path",
            TypeRef::named_nn(TypeRef::STRING),
            extract("path"),
        ))
        .field(Field::new(
            "relativePath",
            TypeRef::named_nn(TypeRef::STRING),
            extract("relativePath"),
        ))
        .field(Field::new(
            "extension",
            TypeRef::named_nn(TypeRef::STRING),
            extract("extension"),
        ))
        .field(Field::new(
            "template",
            TypeRef::named_nn(TypeRef::STRING),
            extract("template"),
        ))
        .field(Field::new(
            "collection",
            TypeRef::named_nn("Collection"),
            collections::sys_collection(snapshot),
        ))
}

fn collection_type(snapshot: Arc<SchemaSnapshot>) -> Object {
    Object::new("Collection")
        .field(Field::new(
            "name",
            TypeRef::named_nn(TypeRef::STRING),
            extract("name"),
        ))
        .field(Field::new(
            "slug",
            TypeRef::named_nn(TypeRef::STRING),
            extract("slug"),
        ))
        .field(Field::new(
            "label",
            TypeRef::named(TypeRef::STRING),
            extract("label"),
        ))
        .field(Field::new(
            "path",
            TypeRef::named_nn(TypeRef::STRING),
            extract("path"),
        ))
        .field(Field::new(
            "format",
            TypeRef::named_nn(TypeRef::STRING),
            extract("format"),
        ))
        .field(Field::new(
            "matches",
            TypeRef::named(TypeRef::STRING),
            extract("matches"),
        ))
        .field(Field::new(
            "templates",
            TypeRef::named("JSON"),
            extract_raw("templates"),
        ))
        .field(Field::new(
            "fields",
            TypeRef::named("JSON"),
            extract_raw("fields"),
        ))
        .field(paginated(Field::new(
            "documents",
            TypeRef::named_nn("DocumentConnection"),
            list::collection_documents(snapshot),
        )))
}

//! End-to-end queries and mutations against an in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use loam_core::Schema;
use loam_db_memory::MemoryStore;
use loam_graphql::ContentEngine;
use loam_storage::{DocumentStore, DynStore, StorageError, StoredDocument};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn content_schema() -> Schema {
    Schema::from_json(json!({
        "collections": [{
            "name": "posts",
            "label": "Blog Posts",
            "path": "content/posts",
            "fields": [
                {"type": "string", "name": "title", "required": true},
                {"type": "boolean", "name": "published"},
                {"type": "number", "name": "rating"},
                {"type": "string", "name": "tags", "list": true},
                {"type": "reference", "name": "author", "to": ["authors"]},
                {"type": "reference", "name": "featured", "to": ["posts", "pages"]},
                {"type": "object", "name": "seo", "fields": [
                    {"type": "string", "name": "description"}
                ]},
                {"type": "object", "name": "blocks", "list": true, "templates": [
                    {"name": "hero", "fields": [{"type": "string", "name": "heading"}]},
                    {"name": "cta", "fields": [{"type": "string", "name": "label"}]}
                ]},
                {"type": "rich-text", "name": "body", "isBody": true}
            ]
        }, {
            "name": "authors",
            "path": "content/authors",
            "fields": [
                {"type": "string", "name": "name"},
                {"type": "image", "name": "avatar"}
            ]
        }, {
            "name": "pages",
            "path": "content/pages",
            "templates": [
                {"name": "landing", "fields": [{"type": "string", "name": "headline"}]},
                {"name": "about", "fields": [{"type": "string", "name": "bio"}]}
            ]
        }]
    }))
    .expect("fixture schema deserializes")
}

fn seeded_engine() -> ContentEngine {
    init_tracing();
    let store = MemoryStore::new();
    store.insert(
        "posts",
        "a.md",
        "posts",
        json!({
            "title": "Alpha",
            "published": true,
            "rating": 4,
            "tags": ["tech", "rust"],
            "author": "authors/jane.md",
            "featured": "pages/home.md",
            "seo": {"description": "First post"},
            "blocks": [
                {"_template": "hero", "heading": "Big Heading"},
                {"_template": "cta", "label": "Read more"}
            ],
            "body": "hello world"
        }),
    );
    store.insert(
        "posts",
        "b.md",
        "posts",
        json!({"title": "B", "featured": "authors/jane.md"}),
    );
    for name in ["c", "d", "e"] {
        store.insert(
            "posts",
            &format!("{name}.md"),
            "posts",
            json!({"title": name.to_uppercase()}),
        );
    }
    store.insert(
        "authors",
        "jane.md",
        "authors",
        json!({"name": "Jane", "avatar": "jane.png"}),
    );
    store.insert("pages", "home.md", "landing", json!({"headline": "Welcome"}));
    store.insert("pages", "about.md", "about", json!({"bio": "All about us"}));

    ContentEngine::new(content_schema(), Arc::new(store)).expect("engine compiles")
}

async fn execute(engine: &ContentEngine, query: &str) -> Value {
    let response = engine.execute(query).await;
    assert!(
        response.errors.is_empty(),
        "unexpected errors: {:?}",
        response.errors
    );
    response.data.into_json().expect("response data is json")
}

async fn execute_err(engine: &ContentEngine, query: &str) -> async_graphql::ServerError {
    let mut response = engine.execute(query).await;
    assert!(!response.errors.is_empty(), "expected errors, got none");
    response.errors.remove(0)
}

fn error_code(err: &async_graphql::ServerError) -> String {
    serde_json::to_value(err)
        .ok()
        .and_then(|v| v["extensions"]["code"].as_str().map(str::to_string))
        .unwrap_or_default()
}

#[tokio::test]
async fn sdl_lists_generated_types() {
    let engine = seeded_engine();
    let sdl = engine.sdl();
    for ty in [
        "type Posts ",
        "type PostsDocument ",
        "type PostsConnection ",
        "type PostsConnectionEdges ",
        "union PostsBlocks ",
        "type PostsBlocksHero ",
        "type PagesLandingDocument ",
        "union PagesDocument ",
        "union PostsFeaturedDocument ",
        "union DocumentNode ",
        "input DocumentMutation ",
        "input PostsMutation ",
    ] {
        assert!(sdl.contains(ty.trim_end()), "sdl is missing `{ty}`");
    }
}

#[tokio::test]
async fn get_document_resolves_data_and_sys() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            getPostsDocument(relativePath: "a.md") {
                id
                sys { filename basename extension relativePath path template breadcrumbs
                      collection { name format } }
                data { title published rating tags }
            }
        }"#,
    )
    .await;

    let doc = &data["getPostsDocument"];
    assert_eq!(doc["id"], "posts/a.md");
    assert_eq!(doc["sys"]["filename"], "a");
    assert_eq!(doc["sys"]["basename"], "a.md");
    assert_eq!(doc["sys"]["extension"], ".md");
    assert_eq!(doc["sys"]["path"], "content/posts/a.md");
    assert_eq!(doc["sys"]["template"], "posts");
    assert_eq!(doc["sys"]["breadcrumbs"], json!(["a"]));
    assert_eq!(doc["sys"]["collection"]["name"], "posts");
    assert_eq!(doc["data"]["title"], "Alpha");
    assert_eq!(doc["data"]["published"], true);
    assert_eq!(doc["data"]["rating"], 4.0);
    assert_eq!(doc["data"]["tags"], json!(["tech", "rust"]));
}

#[tokio::test]
async fn collections_are_queryable() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            getCollections { name }
            getCollection(collection: "posts") { name label path format }
        }"#,
    )
    .await;

    let names: Vec<&str> = data["getCollections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["posts", "authors", "pages"]);
    assert_eq!(data["getCollection"]["label"], "Blog Posts");
    assert_eq!(data["getCollection"]["path"], "content/posts");
    assert_eq!(data["getCollection"]["format"], "md");
}

#[tokio::test]
async fn get_document_fields_maps_every_collection() {
    let engine = seeded_engine();
    let data = execute(&engine, "{ getDocumentFields }").await;
    let fields = &data["getDocumentFields"];
    assert_eq!(fields["posts"]["fields"][0]["name"], "title");
    assert!(fields["pages"]["templates"]["landing"]["fields"].is_array());
}

#[tokio::test]
async fn node_round_trips_the_global_id() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            node(id: "posts/a.md") {
                __typename
                ... on PostsDocument { id data { title } }
            }
        }"#,
    )
    .await;
    assert_eq!(data["node"]["__typename"], "PostsDocument");
    assert_eq!(data["node"]["id"], "posts/a.md");
    assert_eq!(data["node"]["data"]["title"], "Alpha");
}

#[tokio::test]
async fn blocks_dispatch_to_their_template_types() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            getPostsDocument(relativePath: "a.md") {
                data {
                    blocks {
                        __typename
                        ... on PostsBlocksHero { heading }
                        ... on PostsBlocksCta { label }
                    }
                }
            }
        }"#,
    )
    .await;
    let blocks = data["getPostsDocument"]["data"]["blocks"].as_array().unwrap();
    assert_eq!(blocks[0]["__typename"], "PostsBlocksHero");
    assert_eq!(blocks[0]["heading"], "Big Heading");
    assert_eq!(blocks[1]["__typename"], "PostsBlocksCta");
    assert_eq!(blocks[1]["label"], "Read more");
}

#[tokio::test]
async fn polymorphic_documents_resolve_through_their_union() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            home: getPagesDocument(relativePath: "home.md") {
                __typename
                ... on PagesLandingDocument { data { headline } sys { template } }
            }
            about: getPagesDocument(relativePath: "about.md") {
                __typename
                ... on PagesAboutDocument { data { bio } }
            }
        }"#,
    )
    .await;
    assert_eq!(data["home"]["__typename"], "PagesLandingDocument");
    assert_eq!(data["home"]["data"]["headline"], "Welcome");
    assert_eq!(data["home"]["sys"]["template"], "landing");
    assert_eq!(data["about"]["__typename"], "PagesAboutDocument");
    assert_eq!(data["about"]["data"]["bio"], "All about us");
}

#[tokio::test]
async fn references_dereference_to_target_documents() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            getPostsDocument(relativePath: "a.md") {
                data {
                    author { id data { name avatar } }
                }
            }
        }"#,
    )
    .await;
    let author = &data["getPostsDocument"]["data"]["author"];
    assert_eq!(author["id"], "authors/jane.md");
    assert_eq!(author["data"]["name"], "Jane");
    assert_eq!(author["data"]["avatar"], "jane.png");
}

#[tokio::test]
async fn multi_target_references_resolve_through_their_union() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            getPostsDocument(relativePath: "a.md") {
                data {
                    featured {
                        __typename
                        ... on PagesLandingDocument { data { headline } }
                    }
                }
            }
        }"#,
    )
    .await;
    let featured = &data["getPostsDocument"]["data"]["featured"];
    assert_eq!(featured["__typename"], "PagesLandingDocument");
    assert_eq!(featured["data"]["headline"], "Welcome");
}

#[tokio::test]
async fn reference_outside_declared_targets_is_a_mismatch() {
    let engine = seeded_engine();
    let err = execute_err(
        &engine,
        r#"{
            getPostsDocument(relativePath: "b.md") {
                data { featured { __typename } }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "SCHEMA_MISMATCH");
}

#[tokio::test]
async fn forward_pagination_walks_every_document_once() {
    let engine = seeded_engine();
    let mut seen = Vec::new();
    let mut after = String::new();

    loop {
        let query = if after.is_empty() {
            r#"{ getPostsList(first: 2) {
                totalCount
                pageInfo { hasNextPage endCursor }
                edges { node { ... on PostsDocument { sys { relativePath } } } }
            } }"#
                .to_string()
        } else {
            format!(
                r#"{{ getPostsList(first: 2, after: "{after}") {{
                    totalCount
                    pageInfo {{ hasNextPage endCursor }}
                    edges {{ node {{ ... on PostsDocument {{ sys {{ relativePath }} }} }} }}
                }} }}"#
            )
        };
        let data = execute(&engine, &query).await;
        let list = &data["getPostsList"];
        assert_eq!(list["totalCount"], 5);
        for edge in list["edges"].as_array().unwrap() {
            seen.push(edge["node"]["sys"]["relativePath"].as_str().unwrap().to_string());
        }
        if !list["pageInfo"]["hasNextPage"].as_bool().unwrap() {
            break;
        }
        after = list["pageInfo"]["endCursor"].as_str().unwrap().to_string();
    }

    assert_eq!(seen, vec!["a.md", "b.md", "c.md", "d.md", "e.md"]);
}

#[tokio::test]
async fn backward_pagination_takes_the_tail() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{ getPostsList(last: 2) {
            pageInfo { hasPreviousPage hasNextPage }
            edges { node { ... on PostsDocument { sys { relativePath } } } }
        } }"#,
    )
    .await;
    let list = &data["getPostsList"];
    let paths: Vec<&str> = list["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["node"]["sys"]["relativePath"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["d.md", "e.md"]);
    assert_eq!(list["pageInfo"]["hasPreviousPage"], true);
    assert_eq!(list["pageInfo"]["hasNextPage"], false);
}

#[tokio::test]
async fn document_list_spans_collections_unless_filtered() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{
            all: getDocumentList(first: 100) { totalCount }
            posts: getDocumentList(first: 100, collection: "posts") { totalCount }
        }"#,
    )
    .await;
    assert_eq!(data["all"]["totalCount"], 8);
    assert_eq!(data["posts"]["totalCount"], 5);
}

#[tokio::test]
async fn collection_documents_field_pages_its_own_collection() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"{ getCollection(collection: "authors") {
            documents(first: 10) { totalCount }
        } }"#,
    )
    .await;
    assert_eq!(data["getCollection"]["documents"]["totalCount"], 1);
}

#[tokio::test]
async fn update_preserves_unmentioned_fields() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"mutation {
            updatePostsDocument(relativePath: "a.md", params: { title: "Renamed" }) {
                ... on PostsDocument { values }
            }
        }"#,
    )
    .await;
    let values = &data["updatePostsDocument"]["values"];
    assert_eq!(values["title"], "Renamed");
    assert_eq!(values["published"], true);
    assert_eq!(values["rating"], 4);
    assert_eq!(values["seo"]["description"], "First post");
    assert_eq!(values["blocks"][0]["heading"], "Big Heading");

    // Read back through the query path: the merge is durable.
    let data = execute(
        &engine,
        r#"{ getPostsDocument(relativePath: "a.md") { data { title rating } } }"#,
    )
    .await;
    assert_eq!(data["getPostsDocument"]["data"]["title"], "Renamed");
    assert_eq!(data["getPostsDocument"]["data"]["rating"], 4.0);
}

#[tokio::test]
async fn explicit_null_clears_a_field() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"mutation {
            updatePostsDocument(relativePath: "a.md", params: { published: null }) {
                ... on PostsDocument { values }
            }
        }"#,
    )
    .await;
    let values = &data["updatePostsDocument"]["values"];
    assert!(values.get("published").is_none());
    assert_eq!(values["title"], "Alpha");
}

#[tokio::test]
async fn clearing_a_required_field_is_rejected() {
    let engine = seeded_engine();
    let err = execute_err(
        &engine,
        r#"mutation {
            updatePostsDocument(relativePath: "a.md", params: { title: null }) {
                ... on PostsDocument { id }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "VALIDATION_ERROR");
    assert!(err.message.contains("posts.title"));

    // The rejected mutation never reached the store.
    let data = execute(
        &engine,
        r#"{ getPostsDocument(relativePath: "a.md") { data { title } } }"#,
    )
    .await;
    assert_eq!(data["getPostsDocument"]["data"]["title"], "Alpha");
}

#[tokio::test]
async fn undeclared_params_fail_query_validation() {
    let engine = seeded_engine();
    let err = execute_err(
        &engine,
        r#"mutation {
            updatePostsDocument(relativePath: "a.md", params: { bogus: "x" }) {
                ... on PostsDocument { id }
            }
        }"#,
    )
    .await;
    assert!(err.message.contains("bogus"));
}

#[tokio::test]
async fn generic_update_selects_collection_and_template() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"mutation {
            updateDocument(
                collection: "pages",
                relativePath: "home.md",
                params: { pages: { landing: { headline: "Hello" } } }
            ) {
                ... on PagesLandingDocument { data { headline } }
            }
        }"#,
    )
    .await;
    assert_eq!(data["updateDocument"]["data"]["headline"], "Hello");
}

#[tokio::test]
async fn generic_update_rejects_mismatched_selector() {
    let engine = seeded_engine();
    let err = execute_err(
        &engine,
        r#"mutation {
            updateDocument(
                collection: "pages",
                relativePath: "home.md",
                params: { posts: { title: "X" } }
            ) {
                ... on PagesLandingDocument { id }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "VALIDATION_ERROR");
}

#[tokio::test]
async fn update_rejects_a_foreign_stored_template() {
    init_tracing();
    let store = MemoryStore::new();
    store.insert("posts", "odd.md", "legacy", json!({"title": "Odd"}));
    let engine = ContentEngine::new(content_schema(), Arc::new(store)).expect("engine compiles");

    let err = execute_err(
        &engine,
        r#"mutation {
            updatePostsDocument(relativePath: "odd.md", params: { title: "X" }) {
                ... on PostsDocument { id }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "SCHEMA_MISMATCH");

    // The read path reports the same mismatch.
    let err = execute_err(
        &engine,
        r#"{ getPostsDocument(relativePath: "odd.md") { ... on PostsDocument { id } } }"#,
    )
    .await;
    assert_eq!(error_code(&err), "SCHEMA_MISMATCH");
}

/// Delegates to a memory store but parks the first read after arming,
/// holding its caller mid-mutation until released.
struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    entered: Notify,
    release: Semaphore,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn read(
        &self,
        collection: &str,
        relative_path: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|e| StorageError::internal(e.to_string()))?;
        }
        self.inner.read(collection, relative_path).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(collection).await
    }

    async fn write(
        &self,
        collection: &str,
        relative_path: &str,
        template: &str,
        values: &Value,
    ) -> Result<(), StorageError> {
        self.inner
            .write(collection, relative_path, template, values)
            .await
    }

    async fn exists(&self, collection: &str, relative_path: &str) -> Result<bool, StorageError> {
        self.inner.exists(collection, relative_path).await
    }
}

#[tokio::test]
async fn concurrent_updates_on_one_path_conflict() {
    init_tracing();
    let store = Arc::new(GatedStore::new());
    store
        .inner
        .insert("posts", "a.md", "posts", json!({"title": "Alpha", "published": true}));
    let dyn_store: DynStore = store.clone();
    let engine =
        Arc::new(ContentEngine::new(content_schema(), dyn_store).expect("engine compiles"));

    store.armed.store(true, Ordering::SeqCst);
    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .execute(
                    r#"mutation {
                        updatePostsDocument(relativePath: "a.md", params: { title: "First" }) {
                            ... on PostsDocument { id }
                        }
                    }"#,
                )
                .await
        }
    });
    // The first mutation is now parked inside its read, lock held.
    store.entered.notified().await;

    let err = execute_err(
        &engine,
        r#"mutation {
            updatePostsDocument(relativePath: "a.md", params: { title: "Second" }) {
                ... on PostsDocument { id }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "CONFLICT");

    store.release.add_permits(1);
    let response = first.await.expect("update task completes");
    assert!(
        response.errors.is_empty(),
        "unexpected errors: {:?}",
        response.errors
    );

    // The stored state is exactly the winning mutation's result.
    let doc = store
        .read("posts", "a.md")
        .await
        .expect("store read succeeds")
        .expect("document exists");
    assert_eq!(doc.values["title"], "First");
    assert_eq!(doc.values["published"], true);
}

#[tokio::test]
async fn add_pending_document_seeds_defaults_and_rejects_duplicates() {
    let engine = seeded_engine();
    let data = execute(
        &engine,
        r#"mutation {
            addPendingDocument(collection: "authors", relativePath: "sam.md") {
                ... on AuthorsDocument { id sys { template } }
            }
        }"#,
    )
    .await;
    assert_eq!(data["addPendingDocument"]["id"], "authors/sam.md");
    assert_eq!(data["addPendingDocument"]["sys"]["template"], "authors");

    let err = execute_err(
        &engine,
        r#"mutation {
            addPendingDocument(collection: "authors", relativePath: "sam.md") {
                ... on AuthorsDocument { id }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "ALREADY_EXISTS");
}

#[tokio::test]
async fn add_pending_polymorphic_requires_a_template() {
    let engine = seeded_engine();
    let err = execute_err(
        &engine,
        r#"mutation {
            addPendingDocument(collection: "pages", relativePath: "new.md") {
                ... on PagesLandingDocument { id }
            }
        }"#,
    )
    .await;
    assert_eq!(error_code(&err), "VALIDATION_ERROR");

    let data = execute(
        &engine,
        r#"mutation {
            addPendingDocument(collection: "pages", relativePath: "new.md", template: "about") {
                __typename
                ... on PagesAboutDocument { sys { template } }
            }
        }"#,
    )
    .await;
    assert_eq!(data["addPendingDocument"]["__typename"], "PagesAboutDocument");
    assert_eq!(data["addPendingDocument"]["sys"]["template"], "about");
}

#[tokio::test]
async fn missing_documents_surface_not_found() {
    let engine = seeded_engine();
    let err = execute_err(
        &engine,
        r#"{ getDocument(collection: "posts", relativePath: "ghost.md") {
            ... on PostsDocument { id }
        } }"#,
    )
    .await;
    assert_eq!(error_code(&err), "NOT_FOUND");

    let err = execute_err(&engine, r#"{ node(id: "malformed") { __typename } }"#).await;
    assert_eq!(error_code(&err), "VALIDATION_ERROR");
}

#[tokio::test]
async fn rebuild_swaps_in_the_new_schema() {
    let engine = seeded_engine();
    assert!(!engine.sdl().contains("type EventsDocument"));

    let mut schema = content_schema();
    let extra = Schema::from_json(json!({
        "collections": [{
            "name": "events",
            "path": "content/events",
            "fields": [{"type": "string", "name": "venue"}]
        }]
    }))
    .unwrap();
    schema.collections.extend(extra.collections);
    engine.rebuild(schema).unwrap();

    assert!(engine.sdl().contains("EventsDocument"));
    let data = execute(&engine, r#"{ getCollection(collection: "events") { name } }"#).await;
    assert_eq!(data["getCollection"]["name"], "events");
}

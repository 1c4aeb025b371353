//! Integration tests for the fetch engine over SQLite.

use std::rc::Rc;

use ormfetch_core::catalog::{EntitySchema, SchemaRegistry};
use ormfetch_core::entity::{Entity, FetchContext, RelationState};
use ormfetch_core::metrics::{new_shared_metrics, SharedFetchMetrics};
use ormfetch_core::query::{FetchExecutor, FetchResults};
use ormfetch_core::storage::{SqliteStorage, StoreConfig};
use ormfetch_core::Error;
use ormfetch_proto::{FetchSpec, Predicate, RelationDescriptor, SortKey, Value};

const SCHEMA: &str = "
    CREATE TABLE ZUSER (
        Z_ID INTEGER PRIMARY KEY,
        ZNAME TEXT NOT NULL,
        ZAGE INTEGER,
        ZCITY TEXT
    );
    CREATE TABLE ZPOST (
        Z_ID INTEGER PRIMARY KEY,
        ZTITLE TEXT NOT NULL,
        ZAUTHOR INTEGER REFERENCES ZUSER(Z_ID),
        ZVIEWS INTEGER
    );
    CREATE TABLE ZPROFILE (
        Z_ID INTEGER PRIMARY KEY,
        ZBIO TEXT,
        ZUSER INTEGER REFERENCES ZUSER(Z_ID)
    );
";

const SEED: &str = "
    INSERT INTO ZUSER VALUES (1, 'alice', 30, 'berlin');
    INSERT INTO ZUSER VALUES (2, 'bob', 25, 'paris');
    INSERT INTO ZUSER VALUES (3, 'carol', 35, 'berlin');
    INSERT INTO ZUSER VALUES (4, 'dave', 19, 'rome');
    INSERT INTO ZUSER VALUES (5, 'erin', 42, 'paris');

    INSERT INTO ZPOST VALUES (10, 'hello', 1, 100);
    INSERT INTO ZPOST VALUES (11, 'again', 1, 5);
    INSERT INTO ZPOST VALUES (12, 'notes', 3, 40);
    INSERT INTO ZPOST VALUES (13, 'one', 5, 1);
    INSERT INTO ZPOST VALUES (14, 'two', 5, 2);
    INSERT INTO ZPOST VALUES (15, 'three', 5, 3);

    INSERT INTO ZPROFILE VALUES (100, 'likes rust', 1);
    INSERT INTO ZPROFILE VALUES (101, 'likes sql', 3);
";

struct TestContext {
    storage: SqliteStorage,
    registry: SchemaRegistry,
    metrics: SharedFetchMetrics,
}

impl TestContext {
    fn new() -> Self {
        Self::with_storage(SqliteStorage::in_memory().unwrap())
    }

    fn with_storage(storage: SqliteStorage) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            storage,
            registry: blog_registry(),
            metrics: new_shared_metrics(),
        }
    }

    fn seeded() -> Self {
        let ctx = Self::new();
        ctx.storage.execute_batch(SCHEMA).unwrap();
        ctx.storage.execute_batch(SEED).unwrap();
        ctx
    }

    fn executor(&self) -> FetchExecutor<'_> {
        FetchExecutor::new(&self.storage, &self.registry).with_metrics(self.metrics.clone())
    }
}

fn blog_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_schema(EntitySchema::conventional("User", ["name", "age", "city"]))
        .with_schema(EntitySchema::conventional("Post", ["title", "author", "views"]))
        .with_schema(EntitySchema::conventional("Profile", ["bio", "user"]))
}

fn keys(entities: &[Rc<Entity>]) -> Vec<i64> {
    entities.iter().map(|e| e.primary_key()).collect()
}

fn names(entities: &[Rc<Entity>]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| e.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn loaded(results: FetchResults<'_>) -> Vec<Rc<Entity>> {
    match results {
        FetchResults::Loaded(entities) => entities,
        FetchResults::Windowed(_) => panic!("expected loaded results"),
    }
}

#[test]
fn test_fetch_with_predicate_and_sort() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_predicate(Predicate::new().gte("age", 25))
        .with_sort(SortKey::desc("age"));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(names(&users), vec!["erin", "carol", "alice", "bob"]);
    assert_eq!(users[0].get("city"), Some(&Value::String("paris".into())));
    assert_eq!(users[0].get("age"), Some(&Value::Int64(42)));
}

#[test]
fn test_or_and_nested_predicates() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_predicate(
            Predicate::new()
                .eq("city", "berlin")
                .or(Predicate::new().eq("name", "bob").eq("age", 25)),
        )
        .with_sort(SortKey::asc("id"));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(keys(&users), vec![1, 2, 3]);
}

#[test]
fn test_in_predicate() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User").with_predicate(Predicate::new().is_in("id", [4i64, 2]));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    // Unsorted fetches still order by primary key.
    assert_eq!(keys(&users), vec![2, 4]);
}

#[test]
fn test_unmapped_property_is_dropped_from_predicate() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User").with_predicate(
        Predicate::new()
            .eq("nickname", "al")
            .eq("city", "rome"),
    );
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(keys(&users), vec![4]);
}

#[test]
fn test_limit_offset_and_projection() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_sort(SortKey::asc("name"))
        .with_limit(2)
        .with_offset(1)
        .with_properties(vec!["name".into()]);
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(names(&users), vec!["bob", "carol"]);
    assert!(users[0].get("age").is_none());
}

#[test]
fn test_group_by() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_group_by("city")
        .with_properties(vec!["city".into()]);
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    let mut cities: Vec<&str> = users
        .iter()
        .filter_map(|u| u.get("city").and_then(Value::as_str))
        .collect();
    cities.sort_unstable();
    assert_eq!(cities, vec!["berlin", "paris", "rome"]);
}

#[test]
fn test_windowed_fetch_materializes_on_access() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_sort(SortKey::asc("name"))
        .with_batch_size(2);
    let results = ctx.executor().fetch(&spec, &fetch_ctx).unwrap();
    let list = results.as_windowed().unwrap();

    assert_eq!(list.len(), 5);
    assert_eq!(list.keys(), &[1, 2, 3, 4, 5]);
    assert_eq!(list.materialized_count(), 0);
    assert_eq!(ctx.metrics.query_count(), 1);

    let alice = list.get(0).unwrap().unwrap();
    assert_eq!(ctx.metrics.query_count(), 2);
    assert_eq!(list.materialized_count(), 2);

    // Same window, same instance, no new query.
    let again = list.get(0).unwrap().unwrap();
    let bob = list.get(1).unwrap().unwrap();
    assert!(Rc::ptr_eq(&alice, &again));
    assert_eq!(bob.get("name"), Some(&Value::String("bob".into())));
    assert_eq!(ctx.metrics.query_count(), 2);
    assert_eq!(ctx.metrics.window_fills(), 1);
}

#[test]
fn test_windowed_and_loaded_agree() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("Post")
        .with_predicate(Predicate::new().gt("views", 1))
        .with_sort(SortKey::desc("views"));
    let eager = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    let lazy_ctx = FetchContext::new();
    let lazy = ctx
        .executor()
        .fetch(&spec.clone().with_batch_size(2), &lazy_ctx)
        .unwrap()
        .to_vec()
        .unwrap();

    assert_eq!(keys(&eager), vec![10, 12, 11, 15, 14]);
    assert_eq!(keys(&eager), keys(&lazy));
}

#[test]
fn test_has_many_prefetch() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_predicate(Predicate::new().is_in("id", [1i64, 2, 3]))
        .with_relation(RelationDescriptor::has_many("posts", "Post", "author"));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    let sizes: Vec<usize> = users
        .iter()
        .map(|u| u.has_many("posts").unwrap().len())
        .collect();
    assert_eq!(sizes, vec![2, 0, 1]);

    let posts = users[0].has_many("posts").unwrap();
    assert_eq!(keys(&posts), vec![10, 11]);
    for post in posts.iter() {
        assert!(Rc::ptr_eq(&post.back_reference("author").unwrap(), &users[0]));
    }

    // One primary query and one query per relation.
    assert_eq!(ctx.metrics.query_count(), 2);
    assert_eq!(ctx.metrics.prefetch_passes(), 1);
}

#[test]
fn test_has_one_prefetch() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_limit(3)
        .with_relation(RelationDescriptor::has_one("profile", "Profile", "user"));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    let alice_profile = users[0].has_one("profile").unwrap().unwrap();
    assert_eq!(alice_profile.primary_key(), 100);
    assert!(Rc::ptr_eq(
        &alice_profile.back_reference("user").unwrap(),
        &users[0]
    ));

    assert!(matches!(users[1].has_one("profile"), Some(None)));
    assert_eq!(users[2].has_one("profile").unwrap().unwrap().primary_key(), 101);
}

#[test]
fn test_relations_resolved_when_nothing_is_related() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_predicate(Predicate::new().is_in("id", [2i64, 4]))
        .with_relation(RelationDescriptor::has_many("posts", "Post", "author"))
        .with_relation(RelationDescriptor::has_one("profile", "Profile", "user"));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    for user in &users {
        assert!(user.has_many("posts").unwrap().is_empty());
        assert!(matches!(user.has_one("profile"), Some(None)));
    }
}

#[test]
fn test_identity_across_fetch_and_prefetch() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();
    let executor = ctx.executor();

    let spec = FetchSpec::new("User")
        .with_predicate(Predicate::new().eq("id", 1))
        .with_relation(RelationDescriptor::has_many("posts", "Post", "author"));
    let users = loaded(executor.fetch(&spec, &fetch_ctx).unwrap());
    let prefetched = users[0].has_many("posts").unwrap();

    let post = executor
        .first(
            &FetchSpec::new("Post").with_predicate(Predicate::new().eq("id", 10)),
            &fetch_ctx,
        )
        .unwrap()
        .unwrap();

    assert!(Rc::ptr_eq(&post, &prefetched[0]));
    assert_eq!(ctx.metrics.identity_hits(), 1);

    let author = executor
        .first(
            &FetchSpec::new("User").with_predicate(Predicate::new().eq("name", "alice")),
            &fetch_ctx,
        )
        .unwrap()
        .unwrap();
    assert!(Rc::ptr_eq(&author, &users[0]));
}

#[test]
fn test_entity_reference_in_predicate() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();
    let executor = ctx.executor();

    let carol = executor
        .first(
            &FetchSpec::new("User").with_predicate(Predicate::new().eq("name", "carol")),
            &fetch_ctx,
        )
        .unwrap()
        .unwrap();

    let spec =
        FetchSpec::new("Post").with_predicate(Predicate::new().eq("author", Value::from(&*carol)));
    let posts = loaded(executor.fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(keys(&posts), vec![12]);
}

#[test]
fn test_back_reference_does_not_keep_parent_alive() {
    let ctx = TestContext::seeded();

    let post = {
        let fetch_ctx = FetchContext::new();
        let spec = FetchSpec::new("User")
            .with_predicate(Predicate::new().eq("id", 3))
            .with_relation(RelationDescriptor::has_many("posts", "Post", "author"));
        let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());
        let post = Rc::clone(&users[0].has_many("posts").unwrap()[0]);
        assert!(post.back_reference("author").is_some());
        post
    };

    assert!(post.back_reference("author").is_none());
}

#[test]
fn test_prefetch_per_window() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_batch_size(2)
        .with_relation(RelationDescriptor::has_many("posts", "Post", "author"));
    let results = ctx.executor().fetch(&spec, &fetch_ctx).unwrap();

    let alice = results.get(0).unwrap().unwrap();
    let bob = results.get(1).unwrap().unwrap();
    assert_eq!(alice.has_many("posts").unwrap().len(), 2);
    assert!(bob.has_many("posts").unwrap().is_empty());

    // Key query, one window, one relation query.
    assert_eq!(ctx.metrics.query_count(), 3);

    let erin = results.get(4).unwrap().unwrap();
    assert_eq!(erin.has_many("posts").unwrap().len(), 3);
    assert_eq!(ctx.metrics.query_count(), 5);
}

#[test]
fn test_malformed_relations_are_skipped() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let incomplete = RelationDescriptor {
        name: Some("posts".into()),
        ..Default::default()
    };
    let spec = FetchSpec::new("User")
        .with_relation(incomplete)
        .with_relation(RelationDescriptor::has_many("things", "Thing", "owner"))
        .with_relation(RelationDescriptor::has_many("posts", "Post", "writer"));
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(users.len(), 5);
    assert!(matches!(users[0].relation("posts"), RelationState::Unresolved));
    assert_eq!(ctx.metrics.relations_skipped(), 3);
    assert_eq!(ctx.metrics.query_count(), 1);
}

#[test]
fn test_count() {
    let ctx = TestContext::seeded();
    let executor = ctx.executor();

    assert_eq!(executor.count(&FetchSpec::new("User")).unwrap(), 5);
    assert_eq!(
        executor
            .count(&FetchSpec::new("User").with_predicate(Predicate::new().eq("city", "paris")))
            .unwrap(),
        2
    );
    assert_eq!(
        executor
            .count(&FetchSpec::new("User").with_limit(2).with_offset(4))
            .unwrap(),
        1
    );
    assert_eq!(
        executor
            .count(&FetchSpec::new("User").with_offset(10))
            .unwrap(),
        0
    );
}

#[test]
fn test_first_and_primary_keys() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();
    let executor = ctx.executor();

    let oldest = executor
        .first(&FetchSpec::new("User").with_sort(SortKey::desc("age")), &fetch_ctx)
        .unwrap()
        .unwrap();
    assert_eq!(oldest.get("name"), Some(&Value::String("erin".into())));

    let nobody = executor
        .first(
            &FetchSpec::new("User").with_predicate(Predicate::new().gt("age", 100)),
            &fetch_ctx,
        )
        .unwrap();
    assert!(nobody.is_none());

    let spec = FetchSpec::new("User")
        .with_sort(SortKey::desc("name"))
        .with_limit(2)
        .with_offset(1);
    assert_eq!(executor.primary_keys(&spec).unwrap(), vec![4, 3]);
}

#[test]
fn test_errors() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();
    let executor = ctx.executor();

    assert!(matches!(
        executor.fetch(&FetchSpec::new("Nope"), &fetch_ctx),
        Err(Error::UnknownModel(name)) if name == "Nope"
    ));

    let results = executor.fetch(&FetchSpec::new("User"), &fetch_ctx).unwrap();
    assert!(matches!(
        results.get(5),
        Err(Error::IndexOutOfRange { index: 5, len: 5 })
    ));

    let windowed = executor
        .fetch(&FetchSpec::new("User").with_batch_size(3), &fetch_ctx)
        .unwrap();
    let list = windowed.as_windowed().unwrap();
    assert!(matches!(list.clear(), Err(Error::ReadOnly("clear"))));
}

#[test]
fn test_spec_from_json() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let json = serde_json::json!({
        "model": "User",
        "predicate": {
            "terms": [
                {"Comparison": {
                    "combinator": "And",
                    "property": "city",
                    "op": "Eq",
                    "value": {"String": "paris"}
                }}
            ]
        },
        "sort": [{"property": "name", "ascending": true}],
        "relations": [
            {"name": "posts", "related_model": "Post", "foreign_key": "author", "kind": "HasMany"}
        ]
    });
    let spec = FetchSpec::from_json(&json.to_string()).unwrap();
    let users = loaded(ctx.executor().fetch(&spec, &fetch_ctx).unwrap());

    assert_eq!(names(&users), vec!["bob", "erin"]);
    assert_eq!(users[1].has_many("posts").unwrap().len(), 3);
}

#[test]
fn test_file_backed_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blog.sqlite");

    {
        let storage = SqliteStorage::open(StoreConfig::new(&path)).unwrap();
        storage.execute_batch(SCHEMA).unwrap();
        storage.execute_batch(SEED).unwrap();
    }

    let ctx = TestContext::with_storage(SqliteStorage::open(StoreConfig::new(&path)).unwrap());
    let fetch_ctx = FetchContext::new();
    let posts = loaded(
        ctx.executor()
            .fetch(&FetchSpec::new("Post").with_sort(SortKey::desc("views")), &fetch_ctx)
            .unwrap(),
    );

    assert_eq!(posts.len(), 6);
    assert_eq!(posts[0].primary_key(), 10);
    assert!(!ctx.storage.config().is_in_memory());
}

#[test]
fn test_metrics_export() {
    let ctx = TestContext::seeded();
    let fetch_ctx = FetchContext::new();

    let spec = FetchSpec::new("User")
        .with_relation(RelationDescriptor::has_many("posts", "Post", "author"));
    ctx.executor().fetch(&spec, &fetch_ctx).unwrap();

    let by_model = ctx.metrics.queries_by_model();
    assert_eq!(by_model.get("User"), Some(&1));
    assert_eq!(by_model.get("Post"), Some(&1));
    assert_eq!(ctx.metrics.rows_materialized(), 11);

    let text = ctx.metrics.to_prometheus();
    assert!(text.contains("ormfetch_queries_total 2\n"));
}

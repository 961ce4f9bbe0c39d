use crate::error::JsonLiteError;
use crate::executor::*;
use crate::path;
use crate::query::{Filter, PathSegment, Q};
use crate::storage::MISSING;
use crate::Config;
use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::{Value, json};

fn beatles() -> Vec<Value> {
    vec![
        json!({"first": "John", "last": "Lennon", "born": 1940, "role": "guitar"}),
        json!({"first": "Paul", "last": "McCartney", "born": 1942, "role": "bass"}),
        json!({"first": "George", "last": "Harrison", "born": 1943, "role": "guitar"}),
        json!({"first": "Ringo", "last": "Starr", "born": 1940, "role": "drums"}),
        json!({"first": "George", "last": "Martin", "born": 1926, "role": "producer"}),
    ]
}

fn beatles_db() -> JsonLiteDb {
    let db = JsonLiteDb::memory(Config::default().with_table("mytable")).unwrap();
    let items = beatles();
    db.insert_many(&items[..3], Duplicates::Reject).unwrap();
    db.insert(&items[3], Duplicates::Reject).unwrap();
    db.insert_raw([serde_json::to_string_pretty(&items[4]).unwrap()], Duplicates::Reject)
        .unwrap();
    db
}

fn lasts(res: QueryResult) -> Vec<String> {
    res.values()
        .unwrap()
        .iter()
        .map(|doc| doc["last"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_insert_and_query() {
    let db = beatles_db();
    assert_eq!(db.len().unwrap(), 5);
    assert_eq!(db.to_string(), "JsonLiteDb(\":memory:\", table=\"mytable\")");

    let paul = Filter::from(Q::new().field("first").eq("Paul").unwrap());
    let found = db.query(&paul).unwrap().values().unwrap();
    assert_eq!(found, vec![beatles()[1].clone()]);

    // equality shorthand selects the same rows
    let shorthand = db.query(&Filter::new().eq("first", "Paul")).unwrap().values().unwrap();
    assert_eq!(shorthand, found);

    let guitar = Filter::new().eq("role", "guitar");
    assert_eq!(db.count(&guitar).unwrap(), 2);
    assert_eq!(db.count(&guitar.clone().limit(1)).unwrap(), 1);
}

#[test]
fn test_empty_filter_returns_everything() {
    let db = beatles_db();
    assert_eq!(db.query(&Filter::new()).unwrap().all().unwrap().len(), 5);
    assert_eq!(db.items().unwrap().all().unwrap().len(), 5);
}

#[test]
fn test_order_by() {
    let db = beatles_db();

    let by = |specs: Vec<crate::query::OrderSpec>| {
        let mut filter = Filter::new();
        for spec in specs {
            filter = filter.order_by(spec);
        }
        lasts(db.query(&filter).unwrap())
    };

    assert_eq!(
        by(vec!["born".into(), "-last".into()]),
        vec!["Martin", "Starr", "Lennon", "McCartney", "Harrison"]
    );
    assert_eq!(
        by(vec![Q::new().field("first").into(), "-born".into()]),
        vec!["Harrison", "Martin", "Lennon", "McCartney", "Starr"]
    );
    assert_eq!(
        by(vec![(-Q::new().field("first")).into(), "-born".into()]),
        vec!["Starr", "McCartney", "Lennon", "Harrison", "Martin"]
    );
}

#[test]
fn test_query_one() {
    let db = beatles_db();
    let george = db
        .query_one(&Filter::new().eq("first", "George").order_by("born"))
        .unwrap()
        .unwrap();
    assert_eq!(george["last"], "Martin");

    let nobody = db.query_one(&Filter::new().eq("first", "Pete")).unwrap();
    assert!(nobody.is_none());
}

#[test]
fn test_logic_and_patterns() {
    let db = beatles_db();

    let q = Q::new()
        .field("born")
        .eq(1940)
        .unwrap()
        .and(Q::new().field("role").ne("drums").unwrap())
        .unwrap();
    assert_eq!(lasts(db.query(&q.into()).unwrap()), vec!["Lennon"]);

    let like = Q::new().field("last").like("%art%").unwrap();
    let mut found = lasts(db.query(&like.into()).unwrap());
    found.sort();
    assert_eq!(found, vec!["Martin", "McCartney"]);

    let glob = Q::new().field("first").glob("G*").unwrap();
    assert_eq!(db.count(&glob.into()).unwrap(), 2);

    let regexp = Q::new().field("last").regexp("^(Len|Sta)").unwrap();
    assert_eq!(db.count(&regexp.into()).unwrap(), 2);

    let not_guitar = Q::new().field("role").eq("guitar").unwrap().invert().unwrap();
    assert_eq!(db.count(&not_guitar.into()).unwrap(), 3);
}

#[test]
fn test_null_awareness() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert(&json!({"a": {"b": 1}}), Duplicates::Reject).unwrap();

    let exists = db.query_by_path_exists(path!["a", "b"], &[]).unwrap().values().unwrap();
    assert_eq!(exists, vec![json!({"a": {"b": 1}})]);

    db.insert(&json!({"a": {"b": null}}), Duplicates::Reject).unwrap();
    db.insert(&json!({"c": 3}), Duplicates::Reject).unwrap();

    let is_null = Q::new().field("a").field("b").eq(Value::Null).unwrap();
    let mut rows = db.query(&is_null.into()).unwrap().values().unwrap();
    // JSON_EXTRACT of a missing key is NULL as well
    rows.sort_by_key(|v| v.to_string());
    assert_eq!(rows, vec![json!({"a": {"b": null}}), json!({"c": 3})]);

    let not_null = Q::new().field("a").field("b").ne(Value::Null).unwrap();
    assert_eq!(
        db.query(&not_null.into()).unwrap().values().unwrap(),
        vec![json!({"a": {"b": 1}})]
    );

    // existence sees the present null but not the missing key
    assert_eq!(db.count_by_path_exists(path!["a", "b"]).unwrap(), 2);
    assert_eq!(db.count_by_path_exists(path!["made", "up"]).unwrap(), 0);
    assert_eq!(db.count_by_path_exists(path![]).unwrap(), 0);
}

#[test]
fn test_path_exists_by_index() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert_many(
        [
            json!({"kids": ["a", "b"]}),
            json!({"kids": ["c"]}),
            json!({"kids": []}),
        ],
        Duplicates::Reject,
    )
    .unwrap();

    let found = db.query_by_path_exists(Q::new().field("kids").item(1), &[]).unwrap();
    assert_eq!(found.values().unwrap(), vec![json!({"kids": ["a", "b"]})]);

    let assigned = Q::new().field("kids").eq(1).unwrap();
    assert!(matches!(
        db.query_by_path_exists(assigned, &[]),
        Err(JsonLiteError::AssignedPath(_))
    ));
}

#[test]
fn test_duplicate_rows_stay_distinct() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert_many([json!({"a": 1}), json!({"a": 1})], Duplicates::Reject).unwrap();
    assert_eq!(db.query_by_path_exists("a", &[]).unwrap().all().unwrap().len(), 2);
}

#[test]
fn test_duplicate_policies() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.create_index(["first", "last"], true).unwrap();
    db.insert(&json!({"first": "John", "last": "Lennon", "v": 1}), Duplicates::Reject)
        .unwrap();
    let conflict = json!({"first": "John", "last": "Lennon", "v": 2});

    let err = db.insert(&conflict, Duplicates::Reject).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(db.len().unwrap(), 1);

    assert_eq!(db.insert(&conflict, Duplicates::Ignore).unwrap(), 0);
    assert_eq!(db.len().unwrap(), 1);
    assert_eq!(db.query_one(&Filter::new()).unwrap().unwrap()["v"], 1);

    db.insert(&conflict, Duplicates::Replace).unwrap();
    assert_eq!(db.len().unwrap(), 1);
    assert_eq!(db.query_one(&Filter::new()).unwrap().unwrap()["v"], 2);
}

#[test]
fn test_failed_batch_rolls_back() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.create_index(["k"], true).unwrap();
    let err = db
        .insert_many([json!({"k": 1}), json!({"k": 2}), json!({"k": 1})], Duplicates::Reject)
        .unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(db.len().unwrap(), 0);
}

#[test]
fn test_insert_raw_validates() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    assert!(db.insert_raw(["{not json"], Duplicates::Reject).is_err());
    assert_eq!(db.len().unwrap(), 0);

    db.insert_raw(["{\"a\":  [1, 2]}"], Duplicates::Reject).unwrap();
    // stored minified by JSON()
    let raw = db.items().unwrap().raw().unwrap();
    assert_eq!(raw[0].data, "{\"a\":[1,2]}");
}

#[test]
fn test_indexes() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    let name = db.create_index(["first", "last"], false).unwrap();
    assert_eq!(name, "ix_items_250e4243");
    // creating again is a no-op with the same name
    assert_eq!(db.create_index(["first", "last"], false).unwrap(), name);

    let unique = db
        .create_index([Q::new().field("first"), Q::new().field("last")], true)
        .unwrap();
    assert_eq!(unique, "ix_items_250e4243_UNIQUE");

    let indexes = db.indexes().unwrap();
    assert_eq!(indexes.len(), 2);
    assert_eq!(
        indexes[&name],
        vec!["$.\"first\"".to_string(), "$.\"last\"".to_string()]
    );

    // the non-unique name does not touch the unique index
    db.drop_index(["first", "last"], false).unwrap();
    assert_eq!(db.indexes().unwrap().keys().collect::<Vec<_>>(), vec![&unique]);

    db.drop_index_by_name(&unique).unwrap();
    assert!(db.indexes().unwrap().is_empty());

    assert!(matches!(
        db.create_index(Vec::<&str>::new(), false),
        Err(JsonLiteError::InvalidInput(_))
    ));
    assert!(matches!(
        db.create_index([Q::new().field("a").eq(1).unwrap()], false),
        Err(JsonLiteError::AssignedPath(_))
    ));
}

#[test]
fn test_query_uses_index() {
    let db = beatles_db();
    db.create_index(["last"], false).unwrap();
    let plan = db.explain_query(&Filter::new().eq("last", "Starr")).unwrap();
    assert!(
        plan.iter().any(|detail| detail.contains("ix_mytable_")),
        "{:?}",
        plan
    );

    // "$.last" is different text from "$.\"last\"" so the index is not used
    let plan = db.explain_query(&Filter::new().eq("$.last", "Starr")).unwrap();
    assert!(plan.iter().all(|detail| !detail.contains("ix_mytable_")), "{:?}", plan);
}

#[test]
fn test_get_update_delete() {
    let db = beatles_db();
    let mut ringo = db.query_one(&Filter::new().eq("first", "Ringo")).unwrap().unwrap();
    let rowid = ringo.rowid;

    ringo["role"] = json!("vocals");
    assert_eq!(db.update(&ringo, Duplicates::Reject).unwrap(), 1);

    let fetched = db.get(rowid).unwrap();
    assert_eq!(fetched.rowid, rowid);
    assert_eq!(fetched["role"], "vocals");
    assert_eq!(db.len().unwrap(), 5);

    assert!(db.get_by_rowid(999).unwrap().is_none());
    assert!(matches!(db.get(999), Err(JsonLiteError::RowNotFound(999))));

    db.delete(rowid).unwrap();
    assert!(db.get_by_rowid(rowid).unwrap().is_none());
    assert!(matches!(db.delete(rowid), Err(JsonLiteError::RowNotFound(_))));
    assert_eq!(db.len().unwrap(), 4);
}

#[test]
fn test_null_document_is_not_missing() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert(&Value::Null, Duplicates::Reject).unwrap();
    let doc = db.get_by_rowid(1).unwrap().unwrap();
    assert!(doc.is_null());
}

#[test]
fn test_update_by_rowid_typed() {
    #[derive(serde::Serialize, Deserialize, Debug, PartialEq)]
    struct Member {
        first: String,
        born: i64,
    }

    let db = JsonLiteDb::memory(Config::default()).unwrap();
    let pete = Member {
        first: "Pete".to_string(),
        born: 1941,
    };
    db.insert(&pete, Duplicates::Reject).unwrap();
    let doc = db.get(1).unwrap();
    assert_eq!(doc.deserialize::<Member>().unwrap(), pete);

    let stu = Member {
        first: "Stuart".to_string(),
        born: 1940,
    };
    db.update_by_rowid(1, &stu, Duplicates::Reject).unwrap();
    assert_eq!(db.get(1).unwrap().deserialize::<Member>().unwrap(), stu);
}

#[test]
fn test_remove() {
    let db = beatles_db();
    assert_eq!(db.remove(&Filter::new().eq("first", "George")).unwrap(), 2);
    assert_eq!(db.len().unwrap(), 3);

    assert_eq!(db.remove_by_rowid(&[1, 2, 99]).unwrap(), 2);
    assert_eq!(db.len().unwrap(), 1);

    assert_eq!(db.purge().unwrap(), 1);
    assert!(db.is_empty().unwrap());
}

#[test]
fn test_patch() {
    let db = beatles_db();
    let patched = db
        .patch(
            &json!({"role": null, "band": "Beatles"}),
            &Filter::new().eq("first", "John"),
        )
        .unwrap();
    assert_eq!(patched, 1);

    let john = db.query_one(&Filter::new().eq("first", "John")).unwrap().unwrap();
    assert_eq!(
        john.value,
        json!({"first": "John", "last": "Lennon", "born": 1940, "band": "Beatles"})
    );
    assert_eq!(db.count(&Filter::new().eq("band", "Beatles")).unwrap(), 1);
}

#[test]
fn test_path_counts() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert_many(
        [
            json!({"a": 1, "b": {"x": 1}}),
            json!({"a": 2, "b": {"y": 1}}),
            json!({"a": 3, "c": [1, 2]}),
        ],
        Duplicates::Reject,
    )
    .unwrap();

    let counts = db.path_counts("$").unwrap();
    assert_eq!(counts[0], (PathSegment::Key("a".to_string()), 3));
    assert_eq!(counts[1], (PathSegment::Key("b".to_string()), 2));
    assert_eq!(counts[2], (PathSegment::Key("c".to_string()), 1));

    let mut nested = db.keys("b").unwrap();
    nested.sort_by_key(|s| s.to_string());
    assert_eq!(nested, crate::path!["x", "y"]);

    let mut indices = db.path_counts("c").unwrap();
    indices.sort_by_key(|(segment, _)| segment.to_string());
    assert_eq!(
        indices,
        vec![(PathSegment::Index(0), 1), (PathSegment::Index(1), 1)]
    );
}

#[test]
fn test_aggregate() {
    let db = beatles_db();
    assert_eq!(db.aggregate("born", AggregateFunction::Max).unwrap(), json!(1943));
    assert_eq!(db.aggregate("born", AggregateFunction::Min).unwrap(), json!(1926));
    assert_eq!(db.aggregate("born", AggregateFunction::Count).unwrap(), json!(5));
    assert_eq!(db.aggregate("born", AggregateFunction::Sum).unwrap(), json!(9691));
    assert_eq!(db.aggregate("born", AggregateFunction::Total).unwrap(), json!(9691.0));
    assert_eq!(db.aggregate("missing", AggregateFunction::Avg).unwrap(), Value::Null);
}

#[test]
fn test_transaction_groups_writes() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    {
        let _scope = db.transaction().unwrap();
        db.insert(&json!({"a": 1}), Duplicates::Reject).unwrap();
        db.insert(&json!({"a": 2}), Duplicates::Reject).unwrap();
        // dropped without commit
    }
    assert_eq!(db.len().unwrap(), 0);

    let scope = db.transaction().unwrap();
    db.insert(&json!({"a": 1}), Duplicates::Reject).unwrap();
    db.insert(&json!({"a": 2}), Duplicates::Reject).unwrap();
    scope.commit().unwrap();
    assert_eq!(db.len().unwrap(), 2);
}

#[test]
fn test_about_and_stats() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert_many([json!({"a": 1}), json!({"a": 2})], Duplicates::Reject).unwrap();
    db.create_index(["a"], false).unwrap();

    let about = db.about().unwrap();
    assert!(about.version.starts_with("jsonlite-"));

    let stats = db.stats().unwrap();
    assert_eq!(stats.dbpath, ":memory:");
    assert_eq!(stats.table, "items");
    assert_eq!(stats.rows, 2);
    assert_eq!(stats.indexes, db.indexes().unwrap());
    assert!(stats.page_size > 0);
    assert!(stats.page_count >= 1);
    assert_eq!(stats.bytes, stats.page_size * stats.page_count);
}

#[test]
fn test_reopen_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let dbpath = dir.path().join("people.db");

    let db = JsonLiteDb::open(&dbpath, Config::default()).unwrap();
    db.insert(&json!({"first": "John"}), Duplicates::Reject).unwrap();
    db.create_index(["first"], false).unwrap();
    let about = db.about().unwrap();
    db.wal_checkpoint(Some(CheckpointMode::Truncate));
    db.close().unwrap();

    let db = JsonLiteDb::open(&dbpath, Config::default()).unwrap();
    assert_eq!(db.about().unwrap(), about);
    assert_eq!(db.len().unwrap(), 1);
    assert_eq!(db.indexes().unwrap().len(), 1);
    db.close().unwrap();

    let ro = JsonLiteDb::read_only(&dbpath, Config::default()).unwrap();
    assert_eq!(ro.len().unwrap(), 1);
    assert!(ro.insert(&json!({"first": "Paul"}), Duplicates::Reject).is_err());
}

#[test]
fn test_disable_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let dbpath = dir.path().join("nometa.db");
    let config = Config::default().with_disable_metadata(true);

    let db = JsonLiteDb::open(&dbpath, config.clone()).unwrap();
    db.insert(&json!({"x": 1}), Duplicates::Reject).unwrap();
    assert_eq!(db.about().unwrap().created, MISSING);
    db.close().unwrap();

    let db = JsonLiteDb::open(&dbpath, config).unwrap();
    assert_eq!(db.len().unwrap(), 1);
    assert_eq!(db.about().unwrap().version, MISSING);
}

#[test]
fn test_disable_regex() {
    let db = JsonLiteDb::memory(Config::default().with_disable_regex(true)).unwrap();
    db.insert(&json!({"a": "TE.ST"}), Duplicates::Reject).unwrap();
    let q = Q::new().field("a").regexp("TE.ST").unwrap();
    let err = db.query(&q.into()).unwrap_err();
    assert!(err.to_string().contains("no such function"));
}

#[test]
fn test_import_export() {
    let dir = tempfile::tempdir().unwrap();
    let items = vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})];

    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert_many(&items, Duplicates::Reject).unwrap();
    let jsonl = dir.path().join("data.jsonl");
    assert_eq!(db.export_jsonl(&jsonl).unwrap(), 3);

    let db2 = JsonLiteDb::memory(Config::default()).unwrap();
    assert_eq!(db2.import_jsonl(&jsonl, Duplicates::Reject).unwrap(), 3);
    assert_eq!(db2.items().unwrap().values().unwrap(), items);

    let json_path = dir.path().join("data.json");
    std::fs::write(&json_path, serde_json::to_string(&items).unwrap()).unwrap();
    let db3 = JsonLiteDb::memory(Config::default()).unwrap();
    db3.import_jsonl(&json_path, Duplicates::Reject).unwrap();
    assert_eq!(db3.items().unwrap().values().unwrap(), items);

    let single = dir.path().join("single.json");
    std::fs::write(&single, "{\"a\": 10}").unwrap();
    let db4 = JsonLiteDb::memory(Config::default()).unwrap();
    db4.import_jsonl(&single, Duplicates::Reject).unwrap();
    assert_eq!(db4.items().unwrap().values().unwrap(), vec![json!({"a": 10})]);

    // a pretty-printed array read line by line
    let pretty = dir.path().join("pretty.jsonl");
    std::fs::write(&pretty, "[\n{\"a\": 1},\n{\"a\": 2}\n]\n\n").unwrap();
    let db5 = JsonLiteDb::memory(Config::default()).unwrap();
    assert_eq!(db5.import_jsonl(&pretty, Duplicates::Reject).unwrap(), 2);
}

#[test]
fn test_unicode_round_trip() {
    let db = JsonLiteDb::memory(Config::default().with_table("uni")).unwrap();
    db.insert(&json!({"kéy": "vælů€"}), Duplicates::Reject).unwrap();
    let found = db.query(&Filter::new().eq("kéy", "vælů€")).unwrap().values().unwrap();
    assert_eq!(found, vec![json!({"kéy": "vælů€"})]);
    assert!(db.items().unwrap().raw().unwrap()[0].data.contains("vælů€"));
}

#[test]
fn test_fetched_document_writes_back_as_value() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert(&json!({"a": 1, "b": {"c": [1, 2]}}), Duplicates::Reject).unwrap();

    let doc = db.get(1).unwrap();
    db.insert(&doc, Duplicates::Reject).unwrap();
    db.insert_many([&doc, &doc], Duplicates::Reject).unwrap();

    let copy = db.get_raw_by_rowid(2).unwrap().unwrap();
    assert_eq!(copy.data, "{\"a\":1,\"b\":{\"c\":[1,2]}}");
    assert_eq!(db.count(&Filter::new().eq("a", 1)).unwrap(), 4);
    assert_eq!(db.count_by_path_exists("rowid").unwrap(), 0);
}

#[test]
fn test_query_reads_rows_as_iterated() {
    let db = JsonLiteDb::memory(Config::default()).unwrap();
    db.insert(&json!({"a": 1}), Duplicates::Reject).unwrap();
    // bypasses JSON() so the engine only fails when it reaches this row
    db.connection()
        .execute("INSERT INTO items(data) VALUES ('{bad')", [])
        .unwrap();

    let mut result = db.query(&Filter::new().eq("a", 1)).unwrap();
    let mut docs = result.iter().unwrap();
    let first = docs.next().unwrap().unwrap();
    assert_eq!(first, Document::new(1, json!({"a": 1})));
    assert!(matches!(docs.next(), Some(Err(JsonLiteError::Engine(_)))));
    assert!(docs.next().is_none());
}

#[test]
fn test_zero_limit_returns_every_row() {
    let db = beatles_db();
    let everything = Filter::new().limit(0);
    assert_eq!(db.query(&everything).unwrap().all().unwrap().len(), 5);
    assert_eq!(db.count(&everything).unwrap(), 5);
    assert_eq!(db.count(&Filter::new().eq("born", 1940).limit(0)).unwrap(), 2);
}

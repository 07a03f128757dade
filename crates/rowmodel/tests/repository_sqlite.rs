use rowmodel::prelude::*;
use rowmodel::{QueryErrorKind, SchemaErrorKind};
use std::sync::Arc;

fn players() -> Arc<ModelSchema> {
    ModelSchema::builder("players")
        .field(Field::serial("id"))
        .field(Field::text("name").not_null())
        .field(Field::decimal("score"))
        .field(Field::bool("active").not_null().default_sql("1"))
        .field(Field::timestamp("joined").not_null().default_now())
        .primary_key(["id"])
        .build()
        .expect("valid players schema")
}

fn repo() -> Repository<SqliteConnection> {
    let schema = players();
    let db = SqliteDatabase::open_memory(&[Arc::clone(&schema)]).expect("open sqlite memory db");
    Repository::new(Arc::new(db), schema)
}

fn player(repo: &Repository<SqliteConnection>, name: &str, score: f64) -> Model {
    repo.create()
        .with("name", name)
        .and_then(|m| m.with("score", score))
        .expect("known fields")
}

#[test]
fn sqlite_insert_then_read_back_by_id() {
    let repo = repo();
    let model = player(&repo, "ann", 12.5);

    let stored = repo.save(&model).expect("insert");
    let id = stored.get("id").expect("id field").clone();
    assert_eq!(id, Value::Int(1));

    let loaded = repo.find(&[id]).expect("find").expect("row present");
    assert_eq!(loaded, stored);
    for field in ["name", "score"] {
        assert_eq!(loaded.get(field).unwrap(), model.get(field).unwrap());
    }
}

#[test]
fn sqlite_defaults_fill_omitted_columns() {
    let repo = repo();
    let stored = repo.save(&player(&repo, "ann", 1.0)).expect("insert");

    // The engine returns booleans as integers.
    assert_eq!(stored.get("active").unwrap().as_bool(), Some(true));
    let joined = stored.get("joined").unwrap();
    assert!(joined.as_str().is_some_and(|s| s.len() >= 19), "{joined:?}");
}

#[test]
fn sqlite_text_filter_matches_substring() {
    let repo = repo();
    for name in ["bobby", "alice", "bob"] {
        repo.save(&player(&repo, name, 0.0)).expect("insert");
    }

    let found = repo
        .load_by(&Filter::new().eq("name", "bob"))
        .expect("load_by");
    let names: Vec<_> = found
        .iter()
        .map(|m| m.get("name").unwrap().to_string())
        .collect();
    assert_eq!(names, ["bobby", "bob"]);
    assert_eq!(repo.count_by(&Filter::new().eq("name", "bob")).unwrap(), 2);
}

#[test]
fn sqlite_incompatible_value_writes_nothing() {
    let repo = repo();
    let bad = repo
        .create()
        .with("name", "ann")
        .and_then(|m| m.with("score", "lots"))
        .unwrap();

    let err = repo.save(&bad).expect_err("text into decimal");
    assert!(err.is_type_mismatch());
    assert!(err.to_string().contains("incompatible value"), "{err}");
    assert!(err.to_string().contains("score"), "{err}");
    assert_eq!(repo.count_by(&Filter::new()).unwrap(), 0);
}

#[test]
fn sqlite_unknown_field_is_reported() {
    let repo = repo();
    let err = repo
        .load_by(&Filter::new().eq("nickname", "x"))
        .expect_err("unknown field");
    assert_eq!(err.schema_kind(), Some(SchemaErrorKind::FieldNotFound));
    assert!(err.to_string().contains("nickname"), "{err}");
    assert!(err.to_string().contains("players"), "{err}");
}

#[test]
fn sqlite_update_and_remove_by_key() {
    let repo = repo();
    let mut stored = repo.save(&player(&repo, "ann", 1.0)).unwrap();
    repo.save(&player(&repo, "bea", 2.0)).unwrap();

    stored.set("score", 9.5).unwrap();
    assert_eq!(repo.update(&stored).unwrap(), 1);
    let reloaded = repo.find(&[Value::Int(1)]).unwrap().unwrap();
    assert_eq!(reloaded.get("score").unwrap(), &Value::Double(9.5));

    assert_eq!(repo.remove(&stored).unwrap(), 1);
    let rest = repo.load_all().unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].get("name").unwrap(), &Value::from("bea"));
}

#[test]
fn sqlite_save_all_reports_failures_by_position() {
    let repo = repo();
    let mut models = vec![
        player(&repo, "ann", 1.0),
        player(&repo, "bea", 2.0),
        player(&repo, "cid", 3.0),
    ];
    models[1].set("score", "bad").unwrap();

    let report = repo.save_all(models).expect("batch");
    assert!(report.completion().is_committed());
    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].0, 1);
    assert!(!report.is_clean());

    let names: Vec<_> = repo
        .load_all()
        .unwrap()
        .iter()
        .map(|m| m.get("name").unwrap().to_string())
        .collect();
    assert_eq!(names, ["ann", "cid"]);
}

#[test]
fn sqlite_update_all_and_remove_all() {
    let repo = repo();
    let report = repo
        .save_all(vec![player(&repo, "ann", 1.0), player(&repo, "bea", 2.0)])
        .unwrap();
    assert!(report.is_clean());

    let mut all = repo.load_all().unwrap();
    for model in &mut all {
        model.set("score", 0.5).unwrap();
    }
    assert!(repo.update_all(all.clone()).unwrap().is_clean());
    assert_eq!(repo.count_by(&Filter::new().eq("score", 0.5)).unwrap(), 2);

    assert!(repo.remove_all(all).unwrap().is_clean());
    assert_eq!(repo.count_by(&Filter::new()).unwrap(), 0);
}

#[test]
fn sqlite_missing_required_value_is_rejected_before_sql() {
    let repo = repo();
    let err = repo.save(&repo.create()).expect_err("missing name");
    assert!(err.is_type_mismatch());
    assert!(err.sql().is_none());
}

#[test]
fn sqlite_constraint_violation_carries_sql() {
    let repo = repo();
    let first = player(&repo, "ann", 1.0).with("id", 5).unwrap();
    repo.save(&first).unwrap();

    let err = repo.save(&first).expect_err("duplicate key");
    match err {
        Error::Query(q) => {
            assert_eq!(q.kind, QueryErrorKind::Constraint);
            assert!(q.sql.is_some_and(|s| s.starts_with("INSERT INTO players")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn sqlite_file_database_persists() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("players.db").to_string_lossy().into_owned();
    let schema = players();

    {
        let db = SqliteDatabase::open_file(path.clone(), &[Arc::clone(&schema)]).unwrap();
        let repo = Repository::new(Arc::new(db), Arc::clone(&schema));
        repo.save(&player(&repo, "ann", 1.0)).unwrap();
    }

    let db = SqliteDatabase::open_file(path, &[Arc::clone(&schema)]).unwrap();
    let repo = Repository::new(Arc::new(db), schema);
    assert_eq!(repo.load_all().unwrap().len(), 1);
}

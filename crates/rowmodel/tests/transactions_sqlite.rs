use rowmodel::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn items() -> Arc<ModelSchema> {
    ModelSchema::builder("items")
        .field(Field::serial("id"))
        .field(Field::text("label").not_null())
        .primary_key(["id"])
        .build()
        .expect("valid items schema")
}

fn setup() -> (Arc<SqliteDatabase>, Arc<ModelSchema>) {
    let schema = items();
    let db = SqliteDatabase::open_memory(&[Arc::clone(&schema)]).expect("open sqlite memory db");
    (Arc::new(db), schema)
}

fn item(schema: &Arc<ModelSchema>, label: &str) -> Model {
    Model::new(schema).with("label", label).expect("label field")
}

fn labels(db: &SqliteDatabase) -> Vec<String> {
    db.query("SELECT label FROM items ORDER BY ROWID")
        .unwrap()
        .iter()
        .map(|row| row.get(0).map(ToString::to_string).unwrap_or_default())
        .collect()
}

#[test]
fn sqlite_nested_requests_are_deferred_and_commit_together() {
    let (db, schema) = setup();

    let completion = db
        .transaction(move |db| {
            db.insert(&item(&schema, "outer"))?;
            for label in ["a", "b"] {
                let model = item(&schema, label);
                let nested = db.transaction(move |db| db.insert(&model).map(drop))?;
                assert_eq!(nested, Completion::Deferred);
            }
            // Deferred work has not run yet.
            assert_eq!(db.query("SELECT * FROM items")?.len(), 1);
            Ok(())
        })
        .unwrap();

    assert_eq!(completion, Completion::Committed);
    assert!(!db.in_transaction());
    assert_eq!(labels(&db), ["outer", "a", "b"]);
}

#[test]
fn sqlite_failing_deferred_action_rolls_back_everything() {
    let (db, schema) = setup();
    let ran_after = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran_after);

    let err = db
        .transaction(move |db| {
            db.insert(&item(&schema, "outer"))?;
            let first = item(&schema, "first");
            db.transaction(move |db| db.insert(&first).map(drop))?;
            db.transaction(|_| Err(Error::Custom("nested failure".to_string())))?;
            db.transaction(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })?;
            Ok(())
        })
        .expect_err("nested failure propagates");

    assert_eq!(err.to_string(), "nested failure");
    assert_eq!(ran_after.load(Ordering::SeqCst), 0, "queue discarded");
    assert!(labels(&db).is_empty());
    assert!(!db.in_transaction());
    assert!(!db.connection().in_transaction());

    // The handle is usable again.
    let again = db.transaction(|_| Ok(())).unwrap();
    assert!(again.is_committed());
}

#[test]
fn sqlite_deferred_actions_can_queue_more() {
    let (db, schema) = setup();

    db.transaction(move |db| {
        let inner_schema = Arc::clone(&schema);
        db.transaction(move |db| {
            db.insert(&item(&inner_schema, "first"))?;
            let schema = Arc::clone(&inner_schema);
            db.transaction(move |db| db.insert(&item(&schema, "second")).map(drop))?;
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(labels(&db), ["first", "second"]);
}

#[test]
fn sqlite_outer_failure_discards_batch() {
    let (db, schema) = setup();
    let repo = Repository::new(Arc::clone(&db), Arc::clone(&schema));

    let result = db.transaction(move |_| {
        let report = repo.save_all(vec![item(&schema, "x"), item(&schema, "y")])?;
        assert!(report.completion().is_deferred());
        Err(Error::Custom("abort".to_string()))
    });

    assert!(result.is_err());
    assert!(labels(&db).is_empty());
}

#[test]
fn sqlite_batch_inside_transaction_commits_with_it() {
    let (db, schema) = setup();
    let repo = Repository::new(Arc::clone(&db), Arc::clone(&schema));

    db.transaction(move |_| {
        repo.save_all(vec![item(&schema, "x"), item(&schema, "y")])?;
        Ok(())
    })
    .unwrap();

    assert_eq!(labels(&db), ["x", "y"]);
}

#[test]
fn sqlite_panicking_action_releases_transaction() {
    let (db, schema) = setup();

    let panicking = Arc::clone(&db);
    let joined = thread::spawn(move || {
        let _ = panicking.transaction(move |db| {
            db.insert(&item(&schema, "lost")).map(drop)?;
            panic!("action panicked");
        });
    })
    .join();
    assert!(joined.is_err());

    assert!(!db.in_transaction());
    assert!(!db.connection().in_transaction());
    assert!(labels(&db).is_empty());
    assert!(db.transaction(|_| Ok(())).unwrap().is_committed());
}

#[test]
fn sqlite_threads_serialize_on_the_handle() {
    let (db, schema) = setup();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            let schema = Arc::clone(&schema);
            thread::spawn(move || {
                for i in 0..10 {
                    let model = item(&schema, &format!("t{t}-{i}"));
                    let completion = db
                        .transaction(move |db| db.insert(&model).map(drop))
                        .expect("transaction");
                    // Other threads wait rather than queueing behind us.
                    assert!(completion.is_committed());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread");
    }
    assert_eq!(labels(&db).len(), 40);
}

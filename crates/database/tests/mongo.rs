// tests/mongo.rs - bootstrap against a live MongoDB; run with `--ignored` and DATABASE_URI set

use database::{
    domains::model::{CurrentDomain, HistoricalSnapshot},
    ensure,
    schema::{CURRENT_DOMAINS, HISTORICAL_DOMAINS},
    verify, Error, IndexSpec, MongoStore, SchemaStore, DOMAIN_SCHEMA,
};
use mongodb::bson::{doc, DateTime, Document};

async fn scratch_store(suffix: &str) -> MongoStore {
    let uri = std::env::var("DATABASE_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let name = format!("dominios_db_test_{}_{}", suffix, std::process::id());
    let store = MongoStore::connect(&uri, &name).await.unwrap();
    store.drop_database().await.unwrap();
    store
}

#[tokio::test]
#[ignore = "requires a running MongoDB"]
async fn bootstraps_twice_and_enforces_uniqueness() {
    let store = scratch_store("ensure").await;

    let first = ensure(&store, DOMAIN_SCHEMA).await.unwrap();
    assert_eq!(first.created_collections(), 7);
    let second = ensure(&store, DOMAIN_SCHEMA).await.unwrap();
    assert!(second.is_noop());
    assert!(verify(&store, DOMAIN_SCHEMA).await.unwrap().is_clean());

    let current = CurrentDomain {
        dominio: "example.com".to_string(),
        ..Default::default()
    };
    store.insert(&current).await.unwrap();
    let err = store.insert(&current).await.unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateKey { ref collection, .. } if collection == CURRENT_DOMAINS
    ));

    for millis in [1_700_000_000_000, 1_700_086_400_000] {
        store
            .insert(&HistoricalSnapshot::at(
                "example.com",
                DateTime::from_millis(millis),
            ))
            .await
            .unwrap();
    }
    let count = store
        .database()
        .collection::<Document>(HISTORICAL_DOMAINS)
        .count_documents(doc! { "dominio": "example.com" }, None)
        .await
        .unwrap();
    assert_eq!(count, 2);

    store.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running MongoDB"]
async fn conflicting_index_is_reported_not_replaced() {
    let store = scratch_store("conflict").await;
    store
        .create_index(CURRENT_DOMAINS, &IndexSpec::ascending("dominio"))
        .await
        .unwrap();

    let err = ensure(&store, DOMAIN_SCHEMA).await.unwrap_err();
    assert!(matches!(err, Error::IndexConflict { .. }), "{}", err);

    let indexes = store.list_indexes(CURRENT_DOMAINS).await.unwrap();
    assert!(indexes
        .iter()
        .any(|i| i.name == "dominio_1" && !i.unique));

    store.drop_database().await.unwrap();
}

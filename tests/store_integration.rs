//! Integration tests for the SQLite-backed `ContextStore`.

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use context_relevance::db;
use context_relevance::migrate;
use context_relevance::report;
use context_relevance::sqlite_store::SqliteStore;
use context_relevance_core::models::{ContextEntry, DateInterval, Magnitude, NewContextEntry};
use context_relevance_core::registry::CategoryRegistry;
use context_relevance_core::store::{ContextStore, StoreError};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let pool = db::connect_path(&tmp.path().join("data/ctxr.sqlite"))
        .await
        .unwrap();
    migrate::migrate(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn entry(client: &str, category: &str, title: &str) -> NewContextEntry {
    NewContextEntry {
        client_id: client.to_string(),
        category: category.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

fn create(new: NewContextEntry) -> ContextEntry {
    ContextEntry::create(new, Utc::now()).unwrap()
}

#[tokio::test]
async fn test_round_trip_preserves_fields() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let mut original = create(NewContextEntry {
        description: "Sitewide 30% off".to_string(),
        start_date: Some(date("2024-06-01")),
        end_date: Some(date("2024-06-10")),
        magnitude: Some(Magnitude::Major),
        comparison_significant: Some(false),
        ..entry("acme", "promotion", "Summer sale")
    });
    original.created_at = Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap();
    original.updated_at = original.created_at;
    store.insert(&original).await.unwrap();

    let fetched = store.get(&original.id).await.unwrap().unwrap();
    assert_eq!(fetched, original);
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_insert_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let e = create(NewContextEntry {
        event_date: Some(date("2024-03-01")),
        ..entry("acme", "product_launch", "Launch")
    });
    store.insert(&e).await.unwrap();
    let err = store.insert(&e).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::Duplicate(e.id.clone()))
    );
}

#[tokio::test]
async fn test_list_is_per_client_in_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    for title in ["first", "second", "third"] {
        let e = create(NewContextEntry {
            event_date: Some(date("2024-03-01")),
            ..entry("acme", "organic_pr_win", title)
        });
        store.insert(&e).await.unwrap();
    }
    let other = create(NewContextEntry {
        event_date: Some(date("2024-03-01")),
        ..entry("globex", "organic_pr_win", "not yours")
    });
    store.insert(&other).await.unwrap();

    let listed = store.list_for_client("acme").await.unwrap();
    let titles: Vec<&str> = listed.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_update_and_missing_update() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let mut e = create(NewContextEntry {
        start_date: Some(date("2024-06-10")),
        end_date: Some(date("2024-06-12")),
        ..entry("acme", "site_issue", "Checkout outage")
    });
    store.insert(&e).await.unwrap();

    // Edits may leave an inverted interval; the store keeps it as-is.
    e.end_date = Some(date("2024-06-01"));
    e.magnitude = Some(Magnitude::Moderate);
    store.update(&e).await.unwrap();
    assert_eq!(store.get(&e.id).await.unwrap().unwrap(), e);

    let ghost = create(NewContextEntry {
        event_date: Some(date("2024-03-01")),
        ..entry("acme", "other", "ghost")
    });
    let err = store.update(&ghost).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_supersede_rules() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let old = create(NewContextEntry {
        start_date: Some(date("2024-01-01")),
        ..entry("acme", "standing_condition", "Shipping delays")
    });
    let new = create(NewContextEntry {
        start_date: Some(date("2024-07-01")),
        ..entry("acme", "standing_condition", "Shipping normal")
    });
    let foreign = create(NewContextEntry {
        start_date: Some(date("2024-07-01")),
        ..entry("globex", "standing_condition", "Other client")
    });
    for e in [&old, &new, &foreign] {
        store.insert(e).await.unwrap();
    }

    let err = store.supersede(&old.id, &old.id, Utc::now()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::SelfSupersession(_))
    ));

    let err = store
        .supersede(&old.id, &foreign.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::ClientMismatch { .. })
    ));

    let err = store.supersede("ghost", &new.id, Utc::now()).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::NotFound("ghost".to_string()))
    );

    let at = Utc.with_ymd_and_hms(2024, 7, 2, 12, 0, 0).unwrap();
    let retired = store.supersede(&old.id, &new.id, at).await.unwrap();
    assert_eq!(retired.superseded_by.as_deref(), Some(new.id.as_str()));
    assert_eq!(store.get(&old.id).await.unwrap().unwrap(), retired);
}

#[tokio::test]
async fn test_reports_over_sqlite() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let registry = CategoryRegistry::builtin();

    let promo = create(NewContextEntry {
        start_date: Some(date("2023-08-10")),
        end_date: Some(date("2023-08-20")),
        magnitude: Some(Magnitude::Major),
        ..entry("acme", "promotion", "Last summer's sale")
    });
    let launch = create(NewContextEntry {
        event_date: Some(date("2024-08-15")),
        ..entry("acme", "product_launch", "Fall line")
    });
    store.insert(&promo).await.unwrap();
    store.insert(&launch).await.unwrap();

    let active = report::active_context(&store, &registry, "acme", date("2024-08-20"))
        .await
        .unwrap();
    assert_eq!(active.entries.len(), 1);
    assert_eq!(active.entries[0].entry.id, launch.id);

    let current = DateInterval::new(date("2024-08-01"), date("2024-08-31")).unwrap();
    let comparison = DateInterval::new(date("2023-08-01"), date("2023-08-31")).unwrap();
    let explained = report::explain_comparison(&store, &registry, "acme", current, comparison)
        .await
        .unwrap();
    let ids: Vec<&str> = explained
        .explanations
        .iter()
        .map(|e| e.entry.id.as_str())
        .collect();
    assert_eq!(ids, vec![promo.id.as_str(), launch.id.as_str()]);
}

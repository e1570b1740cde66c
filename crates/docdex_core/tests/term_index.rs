//! Term index exactness, multi-index consistency and uniqueness.

use docdex_core::{Collection, Config, CoreError, DocumentId, TermIndexConfig};
use docdex_storage::InMemoryBackend;
use docdex_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(backend_config())]

    #[test]
    fn match_returns_exactly_the_current_tuple_holders(
        initial in prop::collection::vec(term_tuple_strategy(), 1..10),
        updates in prop::collection::vec((any::<prop::sample::Index>(), term_tuple_strategy()), 0..6),
        deletes in prop::collection::vec(any::<prop::sample::Index>(), 0..3),
    ) {
        runtime().block_on(async {
            let (_, places) = memory_collection("places");
            let index = places
                .term_index(TermIndexConfig::new("by_city_tier", ["city", "tier"]))
                .unwrap();

            let mut model: BTreeMap<DocumentId, (String, i64)> = BTreeMap::new();
            let mut ids = Vec::new();
            for (city, tier) in initial {
                let id = places
                    .create(obj(json!({"city": city, "tier": tier})))
                    .await
                    .unwrap();
                model.insert(id.clone(), (city, tier));
                ids.push(id);
            }
            for (at, (city, tier)) in updates {
                let id = at.get(&ids).clone();
                places
                    .update(&id, obj(json!({"city": city, "tier": tier})))
                    .await
                    .unwrap();
                model.insert(id, (city, tier));
            }
            for at in deletes {
                let id = at.get(&ids).clone();
                places.delete(&id).await.unwrap();
                model.remove(&id);
            }

            for city in ["Berlin", "Paris", "Rome", "Oslo"] {
                for tier in 0..3i64 {
                    let expected: Vec<DocumentId> = model
                        .iter()
                        .filter(|(_, held)| held.0 == city && held.1 == tier)
                        .map(|(id, _)| id.clone())
                        .collect();
                    let actual = index
                        .ids(&obj(json!({"tier": tier, "city": city})))
                        .await
                        .unwrap();
                    assert_eq!(actual, expected, "{city}/{tier}");
                }
            }
        });
    }
}

#[tokio::test]
async fn independent_indexes_share_one_commit() {
    let memory = InMemoryBackend::new();
    let faulty = FaultyBackend::new(Arc::new(memory));
    let users = Collection::new("users", Arc::new(faulty.clone())).unwrap();
    let by_city = users
        .term_index(TermIndexConfig::new("by_city", ["city"]))
        .unwrap();
    let by_name = users
        .term_index(TermIndexConfig::new("by_name", ["name"]))
        .unwrap();

    let id = users
        .create(obj(json!({"name": "Ann", "city": "Berlin"})))
        .await
        .unwrap();

    assert_eq!(faulty.commits(), 1);
    assert_eq!(
        by_city.ids(&obj(json!({"city": "Berlin"}))).await.unwrap(),
        vec![id.clone()]
    );
    assert_eq!(
        by_name.ids(&obj(json!({"name": "Ann"}))).await.unwrap(),
        vec![id]
    );
}

#[tokio::test]
async fn nested_paths_and_structured_values() {
    let (_, users) = memory_collection("users");
    let index = users
        .term_index(TermIndexConfig::new("by_place", ["address.city", "flags"]))
        .unwrap();
    let id = users
        .create(obj(json!({
            "address": {"city": "Oslo", "zip": "0150"},
            "flags": [1, true],
        })))
        .await
        .unwrap();

    let hit = index
        .ids(&obj(json!({"address.city": "Oslo", "flags": [1, true]})))
        .await
        .unwrap();
    assert_eq!(hit, vec![id]);
    let miss = index
        .ids(&obj(json!({"address.city": "Oslo", "flags": [true, 1]})))
        .await
        .unwrap();
    assert!(miss.is_empty());
}

#[tokio::test]
async fn unique_index_rejects_second_holder() {
    let (backend, users) = memory_collection("users");
    let by_email = users
        .term_index(TermIndexConfig::new("by_email", ["email"]).unique())
        .unwrap();
    assert!(by_email.is_unique());

    let ann = users
        .create(obj(json!({"name": "Ann", "email": "a@x"})))
        .await
        .unwrap();
    let keys_before = backend.keys();

    let err = users
        .create(obj(json!({"name": "Imposter", "email": "a@x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UniqueViolation { ref existing, .. } if existing == ann.as_str()));
    assert_eq!(backend.keys(), keys_before);

    users
        .update(&ann, obj(json!({"name": "Ann B.", "email": "a@x"})))
        .await
        .unwrap();

    let bo = users
        .create(obj(json!({"name": "Bo", "email": "b@x"})))
        .await
        .unwrap();
    let err = users
        .update(&bo, obj(json!({"email": "a@x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UniqueViolation { .. }));
    let bo_doc = users.read(&bo).await.unwrap().unwrap();
    assert_eq!(bo_doc.get("email"), Some(&json!("b@x")));

    users.delete(&ann).await.unwrap();
    users
        .update(&bo, obj(json!({"email": "a@x"})))
        .await
        .unwrap();
    assert_eq!(
        by_email.ids(&obj(json!({"email": "a@x"}))).await.unwrap(),
        vec![bo]
    );
}

#[tokio::test]
async fn bounded_hydration_returns_every_candidate() {
    let backend = InMemoryBackend::new();
    let users = Collection::with_config(
        "users",
        Arc::new(backend),
        Config::new().hydrate_concurrency(2),
    )
    .unwrap();
    let by_city = users
        .term_index(TermIndexConfig::new("by_city", ["city"]))
        .unwrap();
    for n in 0..10 {
        users
            .create(obj(json!({"city": "Rome", "n": n})))
            .await
            .unwrap();
    }

    let found = by_city
        .match_terms(&obj(json!({"city": "Rome"})))
        .await
        .unwrap();
    let mut ns: Vec<i64> = found
        .iter()
        .filter_map(|doc| doc.get("n").and_then(|n| n.as_i64()))
        .collect();
    ns.sort_unstable();
    assert_eq!(ns, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn zero_concurrency_in_literal_config_still_hydrates() {
    let config = Config {
        hydrate_concurrency: Some(0),
        ..Config::default()
    };
    let users =
        Collection::with_config("users", Arc::new(InMemoryBackend::new()), config).unwrap();
    let by_city = users
        .term_index(TermIndexConfig::new("by_city", ["city"]))
        .unwrap();
    users
        .create(obj(json!({"city": "Rome", "name": "Ann"})))
        .await
        .unwrap();

    let found = tokio::time::timeout(
        std::time::Duration::from_secs(3),
        by_city.match_terms(&obj(json!({"city": "Rome"}))),
    )
    .await
    .expect("hydration stalled")
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("name"), Some(&json!("Ann")));
}

#[tokio::test]
async fn empty_bucket_is_empty_result() {
    let scenario = UsersScenario::new().await;
    let found = scenario
        .by_city
        .match_terms(&obj(json!({"city": "Atlantis"})))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn dropped_index_stops_being_maintained() {
    let (backend, users) = memory_collection("users");
    let index = users
        .term_index(TermIndexConfig::new("by_city", ["city"]))
        .unwrap();
    drop(index);

    users
        .create(obj(json!({"city": "Berlin"})))
        .await
        .unwrap();
    assert_eq!(backend.keys().len(), 1);
}

//! Property-based test generators using proptest.
//!
//! Provides strategies for schemaless field values and documents. Every
//! generated value survives the JSON codec unchanged.

use docdex_codec::{Data, Field};
use proptest::prelude::*;
use serde_json::json;

/// Default configuration for property tests that hit a backend.
pub fn backend_config() -> ProptestConfig {
    ProptestConfig::with_cases(32)
}

/// Strategy for field names: lowercase, never the reserved `_meta`.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Strategy for scalar field values.
pub fn scalar_strategy() -> impl Strategy<Value = Field> {
    prop_oneof![
        Just(Field::Null),
        any::<bool>().prop_map(Field::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-4_000_000..4_000_000i32).prop_map(|n| json!(f64::from(n) / 4.0)),
        ".{0,16}".prop_map(Field::String),
    ]
}

/// Strategy for arbitrary nested field values.
pub fn field_strategy() -> impl Strategy<Value = Field> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Field::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4)
                .prop_map(|map| Field::Object(map.into_iter().collect())),
        ]
    })
}

/// Strategy for document data.
pub fn data_strategy() -> impl Strategy<Value = Data> {
    prop::collection::btree_map(field_name_strategy(), field_strategy(), 0..6)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for a small city vocabulary, so generated documents collide.
pub fn city_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Berlin", "Paris", "Rome", "Oslo"]).prop_map(str::to_string)
}

/// Strategy for (city, tier) term tuples.
pub fn term_tuple_strategy() -> impl Strategy<Value = (String, i64)> {
    (city_strategy(), 0..3i64)
}

//! Property-based test generators using proptest.
//!
//! Payload strategies draw identities from a small pool so that batches
//! regularly overwrite documents written earlier.

use docfeed_core::DocumentId;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for identities drawn from a pool of eight.
pub fn document_id_strategy() -> impl Strategy<Value = DocumentId> {
    (0u8..8).prop_map(|n| DocumentId::new(format!("doc-{n}")))
}

/// Strategy for a well-formed producer payload.
///
/// Roughly one payload in five has no `_id` and gets a generated identity.
pub fn payload_strategy() -> impl Strategy<Value = Value> {
    (
        prop::option::weighted(0.8, document_id_strategy()),
        prop::option::of(prop::sample::select(vec!["state", "log", "histogram"])),
        prop::option::of("[a-z]{1,8}"),
        prop::option::of(0i64..1_000_000),
        prop::option::of(0.0f64..2_000_000_000.0),
        prop::collection::vec(any::<i32>(), 0..8),
    )
        .prop_map(|(id, kind, tag, run, timestamp, extra)| {
            let mut body = Map::new();
            if let Some(id) = id {
                body.insert("_id".into(), json!(id.as_str()));
            }
            if let Some(kind) = kind {
                body.insert("type".into(), json!(kind));
            }
            if let Some(tag) = tag {
                body.insert("tag".into(), json!(tag));
            }
            if let Some(run) = run {
                body.insert("run".into(), json!(run));
            }
            if let Some(ts) = timestamp {
                body.insert("timestamp".into(), json!(ts));
            }
            body.insert("hostname".into(), json!("gen-host"));
            body.insert("extra".into(), json!(extra));
            Value::Object(body)
        })
}

/// Strategy for a payload the store must reject.
pub fn malformed_payload_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(|v| json!(v)),
        any::<i64>().prop_map(|n| json!({ "_id": n })),
        "[a-z]{1,6}".prop_map(|s| json!({ "run": s })),
        Just(json!({ "timestamp": "later" })),
    ]
}

/// Strategy for a batch of well-formed payloads.
pub fn batch_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(payload_strategy(), min..max)
}

/// Strategy for a well-formed batch with one malformed payload spliced in.
///
/// Yields the batch and the index of the bad payload.
pub fn poisoned_batch_strategy(max: usize) -> impl Strategy<Value = (Vec<Value>, usize)> {
    (batch_strategy(0, max), malformed_payload_strategy(), any::<prop::sample::Index>()).prop_map(
        |(mut batch, bad, at)| {
            let index = at.index(batch.len() + 1);
            batch.insert(index, bad);
            (batch, index)
        },
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 256,
        }
    }
}

impl PropTestConfig {
    /// Converts to a proptest runner config.
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

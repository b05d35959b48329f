use super::*;

use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use crate::error::ExecutionError;
use crate::mapper::{FieldValue, IndexField};
use crate::metrics::{set_percolate_metrics, PercolateMetrics};
use crate::shard::InMemoryQueryShard;

fn engine() -> Percolator {
    Percolator::new(PercolatorConfig::default()).expect("engine init")
}

fn doc_request(doc_type: &str, fields: JsonValue) -> Vec<u8> {
    serde_json::to_vec(&json!({ "doc": { doc_type: fields } })).expect("serialize request")
}

fn shard_for(engine: &Percolator, entries: &[(&str, &str)]) -> InMemoryQueryShard {
    let shard = InMemoryQueryShard::new(Arc::clone(&engine.analyzer));
    for (name, topic) in entries {
        let doc = MaterializedDocument::new(".percolator").with_field(IndexField::new(
            "topic",
            FieldValue::Keyword((*topic).to_string()),
        ));
        shard.index_query(name, doc).expect("index query doc");
    }
    shard
}

#[test]
fn matching_document_returns_query_name() {
    let engine = engine();
    engine
        .add_query("q1", &json!({ "term": { "title": "fox" } }))
        .expect("register");

    let body = doc_request("t", json!({ "title": "the quick fox" }));
    let response = engine.percolate(&Request::new(&body)).expect("percolate");

    assert_eq!(response.matches(), ["q1".to_string()]);
    assert!(response.schema_changed(), "type t was created on the fly");

    // Same type again: the schema is already extended.
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert!(!response.schema_changed());
}

#[test]
fn empty_registry_yields_no_matches() {
    let engine = engine();
    let body = doc_request("t", json!({ "title": "anything at all" }));
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert!(response.matches().is_empty());
}

#[test]
fn request_without_doc_section_fails() {
    let engine = engine();
    let body = serde_json::to_vec(&json!({ "query": { "match_all": {} } })).expect("serialize");
    let err = engine
        .percolate(&Request::new(&body))
        .expect_err("no doc to percolate");
    assert!(matches!(err, PercolateError::MissingDocument));
}

#[test]
fn malformed_request_bytes_fail() {
    let engine = engine();
    let err = engine
        .percolate(&Request::new(b"{not json"))
        .expect_err("unparseable");
    assert!(matches!(err, PercolateError::MalformedRequest(_)));

    let err = engine
        .percolate(&Request::new(b"[1, 2, 3]"))
        .expect_err("not an object");
    assert!(matches!(err, PercolateError::MalformedRequest(_)));
}

#[test]
fn invalid_embedded_query_section_fails() {
    let engine = engine();
    let body = serde_json::to_vec(&json!({
        "query": { "fuzzy": {} },
        "doc": { "t": { "title": "x" } }
    }))
    .expect("serialize");
    let err = engine
        .percolate(&Request::new(&body))
        .expect_err("bad query section");
    match err {
        PercolateError::MalformedRequest(msg) => assert!(msg.contains("query section")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn removed_query_no_longer_matches() {
    let engine = engine();
    engine
        .add_query("q1", &json!({ "term": { "title": "fox" } }))
        .expect("register");

    let body = doc_request("t", json!({ "title": "the quick fox" }));
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert_eq!(response.matches(), ["q1".to_string()]);

    engine.remove_query("q1");
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert!(response.matches().is_empty());
}

#[test]
fn one_broken_predicate_does_not_abort_the_scan() {
    let engine = engine();
    engine
        .add_query("good-1", &json!({ "term": { "title": "fox" } }))
        .expect("register");
    engine
        .add_query("good-2", &json!({ "match": { "title": "quick" } }))
        .expect("register");
    engine.add_predicate(
        "broken",
        Predicate::extern_fn("always-fails", |_| {
            Err(ExecutionError::new("simulated index failure"))
        }),
    );

    let body = doc_request("t", json!({ "title": "the quick fox" }));
    let response = engine.percolate(&Request::new(&body)).expect("percolate");

    let mut matches = response.matches().to_vec();
    matches.sort();
    assert_eq!(matches, ["good-1".to_string(), "good-2".to_string()]);
}

#[test]
fn field_analysis_failure_aborts_the_call() {
    let cfg = PercolatorConfig {
        analyzer: crate::config::AnalyzerConfig {
            max_token_count: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = Percolator::new(cfg).expect("engine init");
    let body = doc_request("t", json!({ "body": "one two three four" }));
    let err = engine
        .percolate(&Request::new(&body))
        .expect_err("token budget exceeded");
    assert!(matches!(err, PercolateError::FieldAnalysis { .. }));
}

#[test]
fn nested_fields_match_on_dot_paths() {
    let engine = engine();
    engine
        .add_query("by-author", &json!({ "term": { "user.name": "ada" } }))
        .expect("register");

    let body = doc_request("t", json!({ "user": { "name": "Ada" }, "title": "irrelevant" }));
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert_eq!(response.matches(), ["by-author".to_string()]);
}

#[test]
fn filtered_mode_agrees_with_scan_under_match_all() {
    let engine = engine();
    engine
        .add_query("q-fox", &json!({ "term": { "title": "fox" } }))
        .expect("register");
    engine
        .add_query("q-quick", &json!({ "term": { "title": "quick" } }))
        .expect("register");
    engine
        .add_query("q-miss", &json!({ "term": { "title": "absent" } }))
        .expect("register");

    let shard = shard_for(&engine, &[("q-fox", "a"), ("q-quick", "b"), ("q-miss", "c")]);

    let scan_body = doc_request("t", json!({ "title": "the quick fox" }));
    let scan = engine.percolate(&Request::new(&scan_body)).expect("scan");

    let filtered_body = serde_json::to_vec(&json!({
        "query": { "match_all": {} },
        "doc": { "t": { "title": "the quick fox" } }
    }))
    .expect("serialize");
    let filtered = engine
        .percolate_with_shard(&Request::new(&filtered_body), &shard)
        .expect("filtered");

    let mut scan_matches = scan.matches().to_vec();
    let mut filtered_matches = filtered.matches().to_vec();
    scan_matches.sort();
    filtered_matches.sort();
    assert_eq!(scan_matches, filtered_matches);
}

#[test]
fn selective_filter_narrows_candidates_but_never_relaxes() {
    let engine = engine();
    engine
        .add_query("q-sports", &json!({ "term": { "title": "fox" } }))
        .expect("register");
    engine
        .add_query("q-news", &json!({ "term": { "title": "fox" } }))
        .expect("register");
    engine
        .add_query("q-sports-miss", &json!({ "term": { "title": "absent" } }))
        .expect("register");

    let shard = shard_for(
        &engine,
        &[
            ("q-sports", "sports"),
            ("q-news", "news"),
            ("q-sports-miss", "sports"),
        ],
    );

    // Filter restricts candidates to topic:sports; q-news matches the doc
    // but is never a candidate, and q-sports-miss is a candidate but fails
    // re-execution.
    let body = serde_json::to_vec(&json!({
        "query": { "term": { "topic": "sports" } },
        "doc": { "t": { "title": "the quick fox" } }
    }))
    .expect("serialize");
    let response = engine
        .percolate_with_shard(&Request::new(&body), &shard)
        .expect("filtered");
    assert_eq!(response.matches(), ["q-sports".to_string()]);
}

#[test]
fn stale_shard_candidates_are_silently_skipped() {
    let engine = engine();
    engine
        .add_query("live", &json!({ "term": { "title": "fox" } }))
        .expect("register");

    // The shard still holds a document for a query that was since removed.
    let shard = shard_for(&engine, &[("live", "a"), ("ghost", "a")]);

    let body = serde_json::to_vec(&json!({
        "query": { "match_all": {} },
        "doc": { "t": { "title": "the quick fox" } }
    }))
    .expect("serialize");
    let response = engine
        .percolate_with_shard(&Request::new(&body), &shard)
        .expect("filtered");
    assert_eq!(response.matches(), ["live".to_string()]);
}

#[test]
fn embedded_filter_without_shard_falls_back_to_scan() {
    let engine = engine();
    engine
        .add_query("q1", &json!({ "term": { "title": "fox" } }))
        .expect("register");

    let body = serde_json::to_vec(&json!({
        "query": { "term": { "topic": "sports" } },
        "doc": { "t": { "title": "the quick fox" } }
    }))
    .expect("serialize");
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert_eq!(response.matches(), ["q1".to_string()]);
}

#[test]
fn close_empties_the_engine() {
    let engine = engine();
    engine
        .add_query("q1", &json!({ "match_all": {} }))
        .expect("register");
    engine.close();

    let body = doc_request("t", json!({ "title": "fox" }));
    let response = engine.percolate(&Request::new(&body)).expect("percolate");
    assert!(response.matches().is_empty());
}

#[test]
fn metrics_recorder_observes_percolate_calls() {
    struct Recorder {
        calls: Mutex<Vec<(PercolateMode, Duration, usize)>>,
    }
    impl PercolateMetrics for Recorder {
        fn record_percolate(&self, mode: PercolateMode, latency: Duration, match_count: usize) {
            self.calls
                .lock()
                .expect("recorder lock")
                .push((mode, latency, match_count));
        }
    }

    let recorder = Arc::new(Recorder {
        calls: Mutex::new(Vec::new()),
    });
    set_percolate_metrics(Some(Arc::clone(&recorder) as Arc<dyn PercolateMetrics>));

    let engine = engine();
    engine
        .add_query("q1", &json!({ "term": { "title": "fox" } }))
        .expect("register");
    let body = doc_request("t", json!({ "title": "fox" }));
    engine.percolate(&Request::new(&body)).expect("percolate");

    set_percolate_metrics(None);

    let calls = recorder.calls.lock().expect("recorder lock");
    // Other tests may run concurrently and record too; ours must be there.
    assert!(calls
        .iter()
        .any(|(mode, _, count)| *mode == PercolateMode::Scan && *count == 1));
}

//! Crate-level smoke tests exercising the public surface end to end,
//! distinct from each module's own unit tests.

use crate::config::EngineConfig;
use crate::{engine_version, Engine};

#[test]
fn engine_version_has_the_expected_prefix() {
    assert!(engine_version().starts_with("ast-core-engine"));
}

#[test]
fn engine_config_default_matches_documented_defaults() {
    let config = EngineConfig::default();
    assert!(config.pipeline.generate_ids);
    assert!(config.pipeline.classify_nodes);
    assert_eq!(config.grammar.max_download_attempts, 3);
}

#[tokio::test]
async fn process_file_round_trips_a_small_source_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("lib.rs");
    tokio::fs::write(&path, "pub fn add(a: i32, b: i32) -> i32 { a + b }\n")
        .await
        .unwrap();

    let engine = Engine::new(EngineConfig::default());
    let result = engine.process_file(&path).await.unwrap();

    assert_eq!(result.language, "rust");
    assert!(!result.nodes.is_empty());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn process_batch_handles_a_mix_of_languages() {
    let tmp = tempfile::tempdir().unwrap();
    let rs = tmp.path().join("a.rs");
    let py = tmp.path().join("b.py");
    tokio::fs::write(&rs, "fn main() {}\n").await.unwrap();
    tokio::fs::write(&py, "def main():\n    pass\n").await.unwrap();

    let engine = Engine::new(EngineConfig::default());
    let batch = engine.process_batch(vec![rs, py]).await;

    assert_eq!(batch.results.len(), 2);
    assert!(batch.results.iter().all(|o| o.result.is_some()));
}

//! End-to-end engine behavior: scan, build, publish, query.

use std::sync::Arc;
use std::time::Duration;

use pier_index::refresh::{BuildOptions, RefreshEngine, RefreshOptions};
use pier_index::{Query, Registry};
use pier_scan::DirSource;

fn options() -> RefreshOptions {
    RefreshOptions {
        build: BuildOptions {
            // Fixtures are plain bytes, not real archives.
            extract_metadata: false,
            ..BuildOptions::default()
        },
        interval: None,
        quiet_period: Duration::from_millis(50),
    }
}

fn engine_for(dir: &std::path::Path) -> Arc<RefreshEngine> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let mut engine = RefreshEngine::new(Arc::new(Registry::new()), options());
    engine.add_source("", DirSource::new(dir));
    Arc::new(engine)
}

#[tokio::test]
async fn one_project_two_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("demo-1.0.tar.gz"), vec![0; 100]).unwrap();
    std::fs::write(dir.path().join("demo-1.0-py3-none-any.whl"), vec![0; 200]).unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();

    let query = Query::new(engine.registry());
    let stats = query.stats();
    assert_eq!(stats.projects, 1);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.total_size, 300);

    let detail = query.project("", "demo").unwrap();
    assert_eq!(detail.versions, ["1.0"]);
    assert_eq!(detail.files.len(), 2);
}

#[tokio::test]
async fn rebuilds_without_changes_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("demo-1.0.tar.gz"), vec![1; 64]).unwrap();
    std::fs::write(dir.path().join("demo-2.0rc1.tar.gz"), vec![2; 32]).unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();
    let query = Query::new(engine.registry());
    let first = serde_json::to_value(query.project("", "demo").unwrap()).unwrap();
    let first_stats = query.stats();

    engine.refresh("").await.unwrap();
    let second = serde_json::to_value(query.project("", "demo").unwrap()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first_stats, query.stats());
    // The swap still happened.
    assert_eq!(engine.registry().generation(), 2);
}

#[tokio::test]
async fn name_spellings_resolve_to_one_project() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("My_Project-1.0.tar.gz"), b"x").unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();

    let query = Query::new(engine.registry());
    for spelling in ["My-Project", "my_project", "my.project", "MY-PROJECT"] {
        let detail = query.project("", spelling).unwrap();
        assert_eq!(detail.name.as_str(), "my-project");
    }
}

#[tokio::test]
async fn detail_document_has_the_json_wire_shape() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("demo-1.0.tar.gz"), b"content").unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();

    let query = Query::new(engine.registry());
    let value = serde_json::to_value(query.project("", "demo").unwrap()).unwrap();
    assert_eq!(value["meta"]["api-version"], "1.1");
    assert_eq!(value["name"], "demo");
    let file = &value["files"][0];
    assert_eq!(file["filename"], "demo-1.0.tar.gz");
    assert_eq!(file["size"], 7);
    assert!(file["hashes"]["sha256"].is_string());
    assert!(file["upload-time"].is_string());
    // Optional fields are omitted, not null.
    assert!(file.get("requires-python").is_none());
    assert!(file.get("core-metadata").is_none());

    let list = serde_json::to_value(query.project_list("").unwrap()).unwrap();
    assert_eq!(list["projects"][0]["name"], "demo");
}

#[tokio::test]
async fn metadata_preserving_rewrites_keep_the_cached_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo-1.0.tar.gz");
    std::fs::write(&path, b"aaaa").unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();
    let query = Query::new(engine.registry());
    let before = query.file("", "demo", "demo-1.0.tar.gz").unwrap();

    // Same size, mtime restored: the digest cache has no signal to
    // invalidate on, so the stale digest is served until metadata changes.
    let mtime = filetime::FileTime::from_last_modification_time(&path.metadata().unwrap());
    std::fs::write(&path, b"bbbb").unwrap();
    filetime::set_file_mtime(&path, mtime).unwrap();

    engine.refresh("").await.unwrap();
    let after = query.file("", "demo", "demo-1.0.tar.gz").unwrap();
    assert_eq!(before.hashes["sha256"], after.hashes["sha256"]);
}

#[tokio::test]
async fn held_snapshots_survive_a_refresh_that_changes_storage() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("demo-1.0.tar.gz"), b"x").unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();

    let query = Query::new(engine.registry());
    let held = query.index("").unwrap();

    std::fs::remove_file(dir.path().join("demo-1.0.tar.gz")).unwrap();
    engine.refresh("").await.unwrap();

    // The held view still lists the file; fresh lookups do not.
    assert_eq!(held.stats().files, 1);
    assert!(matches!(
        query.project("", "demo"),
        Err(pier_index::QueryError::ProjectNotFound { .. })
    ));
}

#[tokio::test]
async fn sub_index_lifecycle_follows_storage() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("demo-1.0.tar.gz"), b"x").unwrap();

    let engine = engine_for(dir.path());
    engine.refresh_all().await.unwrap();
    let query = Query::new(engine.registry());
    assert_eq!(query.indexes().len(), 1);

    std::fs::create_dir(dir.path().join("extras")).unwrap();
    std::fs::write(dir.path().join("extras/other-1.0.tar.gz"), b"y").unwrap();
    engine.refresh("").await.unwrap();
    assert_eq!(query.indexes().len(), 2);
    assert!(query.project("extras", "other").is_ok());

    std::fs::remove_file(dir.path().join("extras/other-1.0.tar.gz")).unwrap();
    std::fs::remove_dir(dir.path().join("extras")).unwrap();
    engine.refresh("").await.unwrap();
    assert_eq!(query.indexes().len(), 1);
    assert!(matches!(
        query.project_list("extras"),
        Err(pier_index::QueryError::IndexNotFound { .. })
    ));
}

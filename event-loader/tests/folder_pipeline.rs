use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use common_blob::folder::FolderBlobSource;
use common_blob::{BlobLocator, FetchError};
use envconfig::Envconfig;
use event_loader::config::Config;
use event_loader::context::AppContext;
use event_loader::error::IngestError;
use event_loader::pipeline::Outcome;
use event_loader::warehouse::memory::MemoryWarehouse;
use tempfile::TempDir;

mod common;
use common::{pipeline, TWO_RECORDS};

fn write_blob(root: &TempDir, bucket: &str, key: &str, body: &str) -> BlobLocator {
    let path = root.path().join(bucket).join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
    BlobLocator::new(bucket, key)
}

#[tokio::test]
async fn test_folder_blob_is_loaded() {
    let root = TempDir::new().unwrap();
    let pretty = TWO_RECORDS.replace("}{", "}\n\n{");
    let locator = write_blob(&root, "tracking", "2023/11/14/part-0000.json", &pretty);
    let warehouse = Arc::new(MemoryWarehouse::new());

    let report = pipeline(
        Arc::new(FolderBlobSource::new(root.path())),
        warehouse.clone(),
    )
    .ingest(&locator)
    .await;

    assert_eq!(report.tokens_seen, 2);
    assert_eq!(report.decoded, 2);
    assert_eq!(report.rows_committed(), 2);

    let rows = warehouse.rows();
    assert_eq!(rows[0].event.message, "");
    assert_eq!(rows[1].event.environment, "");
}

#[tokio::test]
async fn test_missing_folder_blob_fails_the_ingestion() {
    let root = TempDir::new().unwrap();
    let warehouse = Arc::new(MemoryWarehouse::new());

    let report = pipeline(
        Arc::new(FolderBlobSource::new(root.path())),
        warehouse.clone(),
    )
    .ingest(&BlobLocator::new("tracking", "missing.json"))
    .await;

    assert!(matches!(
        report.into_result(),
        Err(IngestError::Fetch(FetchError::NotFound(_)))
    ));
    assert_eq!(warehouse.open_transactions(), 0);
}

#[tokio::test]
async fn test_context_from_config() {
    let root = TempDir::new().unwrap();
    let locator = write_blob(&root, "tracking", "blob.json", TWO_RECORDS);

    let env: HashMap<String, String> = [
        ("WAREHOUSE", "memory"),
        ("BLOB_SOURCE", "folder"),
        ("BLOB_FOLDER", root.path().to_str().unwrap()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    let config = Config::init_from_hashmap(&env).unwrap();

    let context = AppContext::new(&config).await.unwrap();
    let report = context.pipeline.ingest(&locator).await;

    assert!(matches!(report.outcome, Outcome::Committed { rows: 2, .. }));
    assert!(report.into_result().is_ok());
}

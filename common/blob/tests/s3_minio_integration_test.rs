//! MinIO integration test for the S3 blob source.
//!
//! Requires MinIO running at localhost:19000. Skips if unreachable.

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use common_blob::{s3::S3BlobSource, BlobLocator, BlobSource, FetchError};

const MINIO_ENDPOINT: &str = "http://localhost:19000";
const MINIO_ACCESS_KEY: &str = "object_storage_root_user";
const MINIO_SECRET_KEY: &str = "object_storage_root_password";
const TEST_BUCKET: &str = "tracking-events-test";

async fn create_minio_client() -> AwsS3Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(MINIO_ENDPOINT)
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            MINIO_ACCESS_KEY,
            MINIO_SECRET_KEY,
            None,
            None,
            "test",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();

    AwsS3Client::from_conf(s3_config)
}

#[tokio::test]
async fn test_s3_blob_source_fetches_and_reports_missing_keys() {
    let client = create_minio_client().await;
    if client.list_buckets().send().await.is_err() {
        eprintln!("MinIO unreachable at {MINIO_ENDPOINT}, skipping test");
        return;
    }
    drop(client.create_bucket().bucket(TEST_BUCKET).send().await);

    let body = r#"{"request_id":"r1"}{"request_id":"r2"}"#;
    client
        .put_object()
        .bucket(TEST_BUCKET)
        .key("blobs/events.json")
        .body(ByteStream::from(body.as_bytes().to_vec()))
        .send()
        .await
        .unwrap();

    let source = S3BlobSource::new(client.clone());

    let fetched = source
        .fetch(&BlobLocator::new(TEST_BUCKET, "blobs/events.json"))
        .await
        .unwrap();
    assert_eq!(fetched, body);

    let missing = source
        .fetch(&BlobLocator::new(TEST_BUCKET, "blobs/missing.json"))
        .await;
    assert!(matches!(missing, Err(FetchError::NotFound(_))));

    drop(
        client
            .delete_object()
            .bucket(TEST_BUCKET)
            .key("blobs/events.json")
            .send()
            .await,
    );
}

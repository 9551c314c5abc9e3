use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

use crate::{decode_utf8, BlobLocator, BlobSource, FetchError};

pub struct S3BlobSource {
    client: S3Client,
}

impl S3BlobSource {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

// The SDK doesn't give us a typed variant for access errors on GetObject, so apart from NoSuchKey
// we fall back to matching on the rendered error.
fn classify_get_object_error(
    locator: &BlobLocator,
    error: SdkError<GetObjectError>,
) -> FetchError {
    let rendered = format!("{error:?}");

    if let GetObjectError::NoSuchKey(_) = error.into_service_error() {
        return FetchError::NotFound(locator.to_string());
    }

    if rendered.contains("NoSuchBucket") {
        FetchError::NotFound(locator.to_string())
    } else if rendered.contains("AccessDenied")
        || rendered.contains("InvalidAccessKeyId")
        || rendered.contains("SignatureDoesNotMatch")
    {
        FetchError::AccessDenied(locator.to_string())
    } else {
        FetchError::Transient(format!("S3 get object failed for {locator}: {rendered}"))
    }
}

#[async_trait]
impl BlobSource for S3BlobSource {
    async fn fetch(&self, locator: &BlobLocator) -> Result<String, FetchError> {
        debug!(bucket = %locator.bucket, key = %locator.key, "fetching blob from S3");

        let output = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|e| classify_get_object_error(locator, e))?;

        let body = output.body.collect().await.map_err(|e| {
            FetchError::Transient(format!("failed to read S3 object body for {locator}: {e}"))
        })?;

        decode_utf8(locator, body.to_vec())
    }
}

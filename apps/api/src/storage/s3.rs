use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::S3Config;
use crate::errors::AppError;
use crate::storage::ArtifactStore;

/// Artifact store on S3 (AWS in production, MinIO locally).
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn from_config(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "matcher-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        Self::new(aws_sdk_s3::Client::new(&s3_config), config.bucket.clone())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), AppError> {
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload of {key} failed: {e}")))?;

        debug!("Uploaded {len} bytes to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    return Ok(None);
                }
                return Err(AppError::Storage(format!("S3 download of {key} failed: {e}")));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 body read of {key} failed: {e}")))?
            .into_bytes();
        Ok(Some(data))
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}

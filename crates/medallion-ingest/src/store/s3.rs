use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{retry::RetryConfig, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, error, info, instrument};

use super::{
    Lookup, ObjectInfo, ObjectStore, StorageConfig, StoreError, StoreResult, WriteOptions,
    WriteOutcome, WritePrecondition,
};
use crate::metadata::ObjectMetadata;

/// Error codes S3 (and compatible stores) use for retryable conditions
const TRANSIENT_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "RequestTimeout",
    "RequestTimeTooSkewed",
    "InternalError",
    "ServiceUnavailable",
    "ConditionalRequestConflict",
];

/// S3-backed object store.
///
/// The SDK's own retries are disabled; wrap in [`super::RetryingStore`] for
/// bounded backoff. In-flight requests are capped at
/// `StorageConfig::max_connections`.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    conditional_writes: bool,
    permits: Arc<Semaphore>,
}

impl S3Store {
    pub async fn connect(config: &StorageConfig) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|e| StoreError::permanent(&config.bucket, e.to_string()))?;

        debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "Initializing S3 store"
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(1));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "medallion-storage",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        info!(bucket = %config.bucket, "S3 store initialized");

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            conditional_writes: config.conditional_writes,
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    async fn permit(&self, key: &str) -> StoreResult<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| StoreError::permanent(key, "S3 store is shut down"))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &str) -> StoreResult<Lookup<ObjectInfo>> {
        let _permit = self.permit(key).await?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => Ok(Lookup::Found(ObjectInfo {
                key: key.to_string(),
                size: response.content_length().unwrap_or(0).max(0) as u64,
                content_type: response.content_type().map(str::to_string),
                metadata: response
                    .metadata()
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default(),
            })),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(Lookup::NotFound),
            Err(e) => Err(classify(key, "head", e)),
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>> {
        let _permit = self.permit(key).await?;

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(SdkError::ServiceError(e)) if e.err().is_no_such_key() => {
                return Ok(Lookup::NotFound)
            },
            Err(e) => return Err(classify(key, "read", e)),
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::transient(key, format!("body read failed: {}", e)))?
            .into_bytes();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);
        Ok(Lookup::Found(data))
    }

    #[instrument(skip(self, data, metadata), fields(bucket = %self.bucket, size = data.len()))]
    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        let _permit = self.permit(key).await?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .set_metadata(Some(metadata.clone().into_iter().collect()));

        if let Some(content_type) = options.content_type {
            request = request.content_type(content_type);
        }

        if self.conditional_writes && options.precondition == WritePrecondition::DoesNotExist {
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => {
                info!("Successfully uploaded to s3://{}/{}", self.bucket, key);
                Ok(WriteOutcome::Written)
            },
            Err(SdkError::ServiceError(e)) if e.err().code() == Some("PreconditionFailed") => {
                Ok(WriteOutcome::AlreadyExists)
            },
            Err(e) => Err(classify(key, "write", e)),
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let _permit = self.permit(prefix).await?;

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| classify(prefix, "list", e))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        keys.sort();
        debug!(count = keys.len(), "Listed objects in s3://{}/{}", self.bucket, prefix);
        Ok(keys)
    }
}

/// Sort an SDK failure into transient or permanent and log it with the key.
fn classify<E, R>(key: &str, operation: &str, err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        },
        SdkError::ServiceError(service) => service
            .err()
            .code()
            .is_some_and(|code| TRANSIENT_CODES.contains(&code)),
        _ => false,
    };

    let message = DisplayErrorContext(&err).to_string();
    if transient {
        debug!(key, operation, error = %message, "Transient S3 failure");
        StoreError::transient(key, message)
    } else {
        error!(key, operation, error = %message, "S3 request failed");
        StoreError::permanent(key, message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::get_object::GetObjectError;

    use super::*;

    fn service_error(code: &str) -> SdkError<GetObjectError, ()> {
        let meta = ErrorMetadata::builder().code(code).message("boom").build();
        SdkError::service_error(GetObjectError::generic(meta), ())
    }

    #[test]
    fn test_classify_timeouts_and_throttling_as_transient() {
        let timeout: SdkError<GetObjectError, ()> = SdkError::timeout_error("timed out");
        assert!(classify("k", "read", timeout).is_transient());
        assert!(classify("k", "read", service_error("SlowDown")).is_transient());
        assert!(classify("k", "read", service_error("ServiceUnavailable")).is_transient());
    }

    #[test]
    fn test_classify_access_errors_as_permanent() {
        let err = classify("raw/t/t.parquet", "write", service_error("AccessDenied"));
        assert!(matches!(err, StoreError::Permanent { .. }));
        assert_eq!(err.key(), "raw/t/t.parquet");
    }
}

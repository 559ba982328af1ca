use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use super::{
    Lookup, ObjectInfo, ObjectStore, RetryPolicy, StoreError, StoreResult, WriteOptions,
    WriteOutcome,
};
use crate::metadata::ObjectMetadata;

/// Retries transient failures of the wrapped store with exponential backoff.
///
/// Permanent failures pass through on the first attempt. Once the attempt
/// budget is spent the last transient failure becomes
/// [`StoreError::RetriesExhausted`].
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

/// Run `call` until it succeeds, fails permanently, or runs out of attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    key: &str,
    mut call: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match call().await {
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    key,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
            },
            Err(StoreError::Transient { message, .. }) => {
                return Err(StoreError::RetriesExhausted {
                    key: key.to_string(),
                    attempts: attempt,
                    message,
                });
            },
            other => return other,
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    async fn head(&self, key: &str) -> StoreResult<Lookup<ObjectInfo>> {
        let inner = &self.inner;
        with_retry(&self.policy, "head", key, move || inner.head(key)).await
    }

    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>> {
        let inner = &self.inner;
        with_retry(&self.policy, "read", key, move || inner.read(key)).await
    }

    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        let inner = &self.inner;
        with_retry(&self.policy, "write", key, move || {
            inner.write(key, data.clone(), metadata, options.clone())
        })
        .await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let inner = &self.inner;
        with_retry(&self.policy, "list", prefix, move || inner.list(prefix)).await
    }
}

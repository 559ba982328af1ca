use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::{
    Lookup, ObjectInfo, ObjectStore, StoreError, StoreResult, WriteOptions, WriteOutcome,
    WritePrecondition,
};
use crate::metadata::ObjectMetadata;

/// In-memory object store for tests and dry runs.
///
/// Thread-safe via `RwLock`; clones share the same objects. Honors the
/// `DoesNotExist` precondition atomically, which the S3 path only gets when
/// the endpoint supports conditional writes.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    metadata: ObjectMetadata,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(key: &str) -> StoreError {
        StoreError::permanent(key, "memory store lock poisoned")
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head(&self, key: &str) -> StoreResult<Lookup<ObjectInfo>> {
        let objects = self.objects.read().map_err(|_| Self::poisoned(key))?;

        Ok(match objects.get(key) {
            Some(object) => Lookup::Found(ObjectInfo {
                key: key.to_string(),
                size: object.data.len() as u64,
                content_type: object.content_type.clone(),
                metadata: object.metadata.clone(),
            }),
            None => Lookup::NotFound,
        })
    }

    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>> {
        let objects = self.objects.read().map_err(|_| Self::poisoned(key))?;

        Ok(match objects.get(key) {
            Some(object) => Lookup::Found(object.data.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned(key))?;

        if options.precondition == WritePrecondition::DoesNotExist && objects.contains_key(key) {
            return Ok(WriteOutcome::AlreadyExists);
        }

        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: options.content_type,
                metadata: metadata.clone(),
            },
        );
        Ok(WriteOutcome::Written)
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let objects = self.objects.read().map_err(|_| Self::poisoned(prefix))?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

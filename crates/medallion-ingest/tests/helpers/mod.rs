//! Test helpers for medallion-ingest integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use medallion_ingest::metadata::ObjectMetadata;
use medallion_ingest::store::{
    Lookup, MemoryStore, ObjectInfo, ObjectStore, StoreError, StoreResult, WriteOptions,
    WriteOutcome,
};
use medallion_ingest::Dataset;

/// Counts every call before delegating to a shared [`MemoryStore`]
#[derive(Debug, Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    pub heads: AtomicU32,
    pub reads: AtomicU32,
    pub writes: AtomicU32,
    pub lists: AtomicU32,
}

impl CountingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u32 {
        self.heads.load(Ordering::SeqCst)
            + self.reads.load(Ordering::SeqCst)
            + self.writes.load(Ordering::SeqCst)
            + self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn head(&self, key: &str) -> StoreResult<Lookup<ObjectInfo>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.inner.head(key).await
    }

    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key).await
    }

    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, data, metadata, options).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(prefix).await
    }
}

/// Fails the first `failures` calls with `error`, then delegates
#[derive(Debug)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub error: StoreError,
    remaining: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, failures: u32, error: StoreError) -> Self {
        Self {
            inner,
            error,
            remaining: AtomicU32::new(failures),
        }
    }

    fn check(&self) -> StoreResult<()> {
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn head(&self, key: &str) -> StoreResult<Lookup<ObjectInfo>> {
        self.check()?;
        self.inner.head(key).await
    }

    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>> {
        self.check()?;
        self.inner.read(key).await
    }

    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        self.check()?;
        self.inner.write(key, data, metadata, options).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        self.inner.list(prefix).await
    }
}

/// Reports every key as absent so the write path always runs, as when a
/// concurrent writer lands between the exists check and the write
#[derive(Debug, Default)]
pub struct BlindStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl ObjectStore for BlindStore {
    async fn head(&self, _key: &str) -> StoreResult<Lookup<ObjectInfo>> {
        Ok(Lookup::NotFound)
    }

    async fn read(&self, key: &str) -> StoreResult<Lookup<Bytes>> {
        self.inner.read(key).await
    }

    async fn write(
        &self,
        key: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
        options: WriteOptions,
    ) -> StoreResult<WriteOutcome> {
        self.inner.write(key, data, metadata, options).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

pub fn processing_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 2)
        .unwrap()
        .and_hms_opt(10, 15, 0)
        .unwrap()
}

/// `id` / `amount` transactions fixture
pub fn transactions(ids: Vec<i64>) -> Dataset {
    let amounts: Vec<f64> = ids.iter().map(|id| *id as f64 * 10.5).collect();
    Dataset::from_columns([
        ("id", Arc::new(Int64Array::from(ids)) as ArrayRef),
        ("amount", Arc::new(Float64Array::from(amounts)) as ArrayRef),
    ])
    .unwrap()
}

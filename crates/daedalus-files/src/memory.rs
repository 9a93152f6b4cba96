//! In-memory stores.
//!
//! Both stores are backed by `DashMap` and are safe to share between
//! threads. They are meant for tests and for embedding the service in a
//! process that does not need durability.

use crate::error::{FileError, FileResult};
use crate::hash::ContentHash;
use crate::meta::FileMeta;
use crate::store::{BlobStore, MetaStore};
use bytes::Bytes;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory [`MetaStore`].
#[derive(Debug, Default)]
pub struct MemoryMetaStore {
    records: DashMap<ContentHash, FileMeta>,
    shard_refs: DashMap<ContentHash, u64>,
}

impl MemoryMetaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetaStore for MemoryMetaStore {
    fn create(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()> {
        match self.records.entry(*id) {
            Entry::Occupied(_) => Err(FileError::AlreadyExists(format!("file {id}"))),
            Entry::Vacant(slot) => {
                slot.insert(meta.clone());
                Ok(())
            }
        }
    }

    fn get(&self, id: &ContentHash) -> FileResult<FileMeta> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| FileError::NotFound(format!("file {id}")))
    }

    fn exists(&self, id: &ContentHash) -> FileResult<bool> {
        Ok(self.records.contains_key(id))
    }

    fn update(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()> {
        match self.records.get_mut(id) {
            Some(mut record) => {
                *record = meta.clone();
                Ok(())
            }
            None => Err(FileError::NotFound(format!("file {id}"))),
        }
    }

    fn delete(&self, id: &ContentHash) -> FileResult<()> {
        self.records.remove(id);
        Ok(())
    }

    fn add_reference(&self, id: &ContentHash) -> FileResult<Option<u32>> {
        Ok(self.records.get_mut(id).map(|mut record| {
            record.ref_count = record.ref_count.saturating_add(1);
            record.modify_time = Utc::now();
            record.ref_count
        }))
    }

    fn release_reference(&self, id: &ContentHash) -> FileResult<Option<u32>> {
        Ok(self.records.get_mut(id).map(|mut record| {
            if record.ref_count <= 1 {
                return 0;
            }
            record.ref_count -= 1;
            record.modify_time = Utc::now();
            record.ref_count
        }))
    }

    fn shard_refs(&self, hash: &ContentHash) -> FileResult<u64> {
        Ok(self.shard_refs.get(hash).map_or(0, |count| *count))
    }

    fn acquire_shard(&self, hash: &ContentHash) -> FileResult<u64> {
        let mut count = self.shard_refs.entry(*hash).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn release_shard(&self, hash: &ContentHash) -> FileResult<u64> {
        match self.shard_refs.entry(*hash) {
            Entry::Vacant(_) => Ok(0),
            Entry::Occupied(mut entry) => {
                let remaining = entry.get().saturating_sub(1);
                if remaining == 0 {
                    entry.remove();
                } else {
                    *entry.get_mut() = remaining;
                }
                Ok(remaining)
            }
        }
    }
}

/// In-memory [`BlobStore`].
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<ContentHash, Bytes>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns `true` if no blobs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Returns the stored hashes, sorted.
    #[must_use]
    pub fn hashes(&self) -> Vec<ContentHash> {
        let mut hashes: Vec<ContentHash> = self.blobs.iter().map(|e| *e.key()).collect();
        hashes.sort();
        hashes
    }
}

impl BlobStore for MemoryBlobStore {
    fn write(&self, data: &[u8]) -> FileResult<ContentHash> {
        let hash = ContentHash::compute(data);
        self.blobs
            .entry(hash)
            .or_insert_with(|| Bytes::copy_from_slice(data));
        Ok(hash)
    }

    fn read(&self, hash: &ContentHash) -> FileResult<Bytes> {
        self.blobs
            .get(hash)
            .map(|b| b.value().clone())
            .ok_or_else(|| FileError::NotFound(format!("shard {hash}")))
    }

    fn delete(&self, hash: &ContentHash) -> FileResult<()> {
        self.blobs.remove(hash);
        Ok(())
    }

    fn exists(&self, hash: &ContentHash) -> FileResult<bool> {
        Ok(self.blobs.contains_key(hash))
    }
}

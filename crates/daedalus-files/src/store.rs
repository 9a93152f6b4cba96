//! Storage contracts consumed by the file service.
//!
//! The service composes a [`MetaStore`] for records, a [`BlobStore`] for
//! shard bytes and an [`Assembler`] that turns a record back into a byte
//! stream. In-memory and filesystem implementations live in
//! [`crate::memory`] and [`crate::fs`].
//!
//! [`Assembler`]: crate::assembler::Assembler

use crate::error::FileResult;
use crate::hash::ContentHash;
use crate::meta::FileMeta;
use bytes::Bytes;

/// Keyed storage of [`FileMeta`] records and shard reference counts.
///
/// Reference-count operations must be atomic with respect to each other
/// on the same key.
pub trait MetaStore: Send + Sync {
    /// Stores a new record, failing with `AlreadyExists` when one is
    /// present.
    fn create(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()>;

    /// Loads a record, failing with `NotFound` when absent.
    fn get(&self, id: &ContentHash) -> FileResult<FileMeta>;

    /// Returns `true` if a record exists.
    fn exists(&self, id: &ContentHash) -> FileResult<bool>;

    /// Replaces an existing record, failing with `NotFound` when absent.
    fn update(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()>;

    /// Removes a record. Removing a missing record succeeds.
    fn delete(&self, id: &ContentHash) -> FileResult<()>;

    /// Increments the `ref_count` of a record and returns the new count,
    /// or `None` when no record exists.
    fn add_reference(&self, id: &ContentHash) -> FileResult<Option<u32>>;

    /// Releases one reference to a record.
    ///
    /// Returns `None` when no record exists. A record holding more than
    /// one reference is decremented and the remaining count returned. A
    /// record holding its last reference is left untouched and `Some(0)`
    /// is returned; the caller then owns its removal.
    fn release_reference(&self, id: &ContentHash) -> FileResult<Option<u32>>;

    /// Returns the number of holders of the shard `hash`.
    fn shard_refs(&self, hash: &ContentHash) -> FileResult<u64>;

    /// Adds a holder to the shard `hash` and returns the new count.
    fn acquire_shard(&self, hash: &ContentHash) -> FileResult<u64>;

    /// Removes a holder from the shard `hash` and returns the remaining
    /// count. The entry is dropped at zero; releasing an unknown shard
    /// returns zero.
    fn release_shard(&self, hash: &ContentHash) -> FileResult<u64>;
}

/// Content-addressed byte storage.
///
/// Writing bytes that are already stored is a no-op returning the same
/// hash, so concurrent writers of the same content are safe.
pub trait BlobStore: Send + Sync {
    /// Stores `data` and returns its hash.
    fn write(&self, data: &[u8]) -> FileResult<ContentHash>;

    /// Loads the bytes stored under `hash`, failing with `NotFound` when
    /// absent.
    fn read(&self, hash: &ContentHash) -> FileResult<Bytes>;

    /// Removes the bytes stored under `hash`. Removing a missing blob
    /// succeeds.
    fn delete(&self, hash: &ContentHash) -> FileResult<()>;

    /// Returns `true` if bytes are stored under `hash`.
    fn exists(&self, hash: &ContentHash) -> FileResult<bool>;
}

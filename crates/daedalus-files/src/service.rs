//! The content-addressed file service.
//!
//! Files are identified by the SHA-256 of their content. Files up to
//! `embed_threshold` bytes are stored inline in their metadata record;
//! larger files are split into `chunk_size` shards stored in the blob store
//! under their own hashes, so identical chunks are stored once.
//!
//! # Sizes
//!
//! `create` takes the caller's declared size:
//!
//! | Declared | Behaviour |
//! |---|---|
//! | `1..=embed_threshold` | read into memory and embed |
//! | `> embed_threshold` | stream into shards |
//! | `<= 0` (unknown) | buffer up to `embed_threshold + 1` bytes, embed if the stream ended, shard otherwise |
//!
//! A known size must match the stream exactly; otherwise the call fails
//! with `SizeMismatch` after removing the shards it created.
//!
//! # Reference counting
//!
//! Storing content that already exists increments the record's
//! `ref_count` and returns the existing id. `delete` decrements it and
//! removes the record only when the last reference goes.
//!
//! Shards are shared between files, so the metadata store also counts the
//! holders of every shard: each stored record holds each of its distinct
//! shards once, and a `create` in progress holds the shards it has
//! written so far. A blob is removed only when its count drops to zero.
//! The steps that move these counts run under a lock shared by clones of
//! the service; reading the source and writing blobs do not.

use crate::assembler::{Assembler, ShardAssembler};
use crate::error::{FileError, FileResult};
use crate::hash::{ContentHash, ContentHasher};
use crate::memory::{MemoryBlobStore, MemoryMetaStore};
use crate::meta::{FileMeta, DEFAULT_MIME_TYPE};
use crate::store::{BlobStore, MetaStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{self, Read};
use std::sync::Arc;

/// Default largest size stored inline (64 KiB).
pub const DEFAULT_EMBED_THRESHOLD: u64 = 64 * 1024;

/// Default shard size (4 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Attempts at committing a record when another writer keeps racing us.
const COMMIT_ATTEMPTS: usize = 8;

/// File service tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileServiceConfig {
    /// Largest size, in bytes, stored inline in the metadata record.
    pub embed_threshold: u64,
    /// Shard size in bytes. Must be greater than zero.
    pub chunk_size: usize,
}

impl Default for FileServiceConfig {
    fn default() -> Self {
        Self {
            embed_threshold: DEFAULT_EMBED_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileServiceConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> FileResult<()> {
        if self.chunk_size == 0 {
            return Err(FileError::Config("chunk_size must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Content-addressed file storage over a metadata store, a blob store and
/// an assembler.
///
/// # Example
///
/// ```
/// use daedalus_files::FileService;
/// use std::io::Read;
///
/// let service = FileService::in_memory();
/// let id = service.create(&b"hello"[..], 5).unwrap();
///
/// let mut out = String::new();
/// service.read(&id).unwrap().read_to_string(&mut out).unwrap();
/// assert_eq!(out, "hello");
/// assert!(service.get(&id).unwrap().is_embedded());
/// ```
#[derive(Clone)]
pub struct FileService {
    meta: Arc<dyn MetaStore>,
    blobs: Arc<dyn BlobStore>,
    assembler: Arc<dyn Assembler>,
    config: FileServiceConfig,
    commit: Arc<Mutex<()>>,
}

impl FileService {
    /// Creates a service reading shards back with a [`ShardAssembler`].
    pub fn new(
        meta: Arc<dyn MetaStore>,
        blobs: Arc<dyn BlobStore>,
        config: FileServiceConfig,
    ) -> FileResult<Self> {
        config.validate()?;
        Ok(Self {
            assembler: Arc::new(ShardAssembler::new(Arc::clone(&blobs))),
            meta,
            blobs,
            config,
            commit: Arc::new(Mutex::new(())),
        })
    }

    /// Creates a service over fresh in-memory stores with the default
    /// configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        Self {
            assembler: Arc::new(ShardAssembler::new(Arc::clone(&blobs))),
            meta: Arc::new(MemoryMetaStore::new()),
            blobs,
            config: FileServiceConfig::default(),
            commit: Arc::new(Mutex::new(())),
        }
    }

    /// Replaces the assembler.
    #[must_use]
    pub fn with_assembler(mut self, assembler: Arc<dyn Assembler>) -> Self {
        self.assembler = assembler;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &FileServiceConfig {
        &self.config
    }

    /// Stores the content of `reader` and returns its id.
    pub fn create<R: Read>(&self, reader: R, declared_size: i64) -> FileResult<ContentHash> {
        self.create_with_mime(reader, declared_size, DEFAULT_MIME_TYPE)
    }

    /// Stores the content of `reader` with a MIME type and returns its id.
    pub fn create_with_mime<R: Read>(
        &self,
        mut reader: R,
        declared_size: i64,
        mime_type: &str,
    ) -> FileResult<ContentHash> {
        let threshold = self.config.embed_threshold;

        if declared_size > 0 {
            let declared = declared_size as u64;
            if declared <= threshold {
                let data = read_up_to(&mut reader, declared + 1)?;
                check_size(declared, data.len() as u64)?;
                return self.store_embedded(data, mime_type);
            }
            return self.store_sharded(reader, Some(declared), mime_type);
        }

        let prefix = read_up_to(&mut reader, threshold.saturating_add(1))?;
        if prefix.len() as u64 <= threshold {
            return self.store_embedded(prefix, mime_type);
        }
        self.store_sharded(io::Cursor::new(prefix).chain(reader), None, mime_type)
    }

    /// Returns a reader over the content of `id`.
    pub fn read(&self, id: &ContentHash) -> FileResult<Box<dyn Read + Send>> {
        let meta = self.meta.get(id)?;
        self.assembler.new_reader(&meta)
    }

    /// Returns the record of `id` without reading its content.
    pub fn get(&self, id: &ContentHash) -> FileResult<FileMeta> {
        self.meta.get(id)
    }

    /// Returns `true` if `id` is stored.
    pub fn exists(&self, id: &ContentHash) -> FileResult<bool> {
        self.meta.exists(id)
    }

    /// Releases one reference to `id`.
    ///
    /// Deleting a missing id succeeds. When the last reference goes, the
    /// shards no other record holds are removed before the record.
    pub fn delete(&self, id: &ContentHash) -> FileResult<()> {
        let _guard = self.commit.lock();
        match self.meta.release_reference(id)? {
            None => return Ok(()),
            Some(0) => {}
            Some(ref_count) => {
                tracing::debug!(file = %id, ref_count, "Released file reference");
                return Ok(());
            }
        }

        let meta = match self.meta.get(id) {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        for shard in distinct(meta.shards()) {
            if self.release_shard(&shard)? {
                removed += 1;
            }
        }
        self.meta.delete(id)?;
        tracing::debug!(file = %id, shards = meta.shards().len(), removed, "Deleted file");
        Ok(())
    }

    fn store_embedded(&self, data: Vec<u8>, mime_type: &str) -> FileResult<ContentHash> {
        let id = ContentHash::compute(&data);
        let _guard = self.commit.lock();
        if !self.commit_record(&id, &FileMeta::embedded(data, mime_type))? {
            tracing::debug!(file = %id, "Stored embedded file");
        }
        Ok(id)
    }

    fn store_sharded<R: Read>(
        &self,
        reader: R,
        declared: Option<u64>,
        mime_type: &str,
    ) -> FileResult<ContentHash> {
        let mut held = HashSet::new();
        match self.write_shards(reader, declared, mime_type, &mut held) {
            Ok(id) => Ok(id),
            Err(e) => {
                self.cleanup(&held);
                Err(e)
            }
        }
    }

    /// Writes shards, recording in `held` every distinct shard this call
    /// acquired.
    fn write_shards<R: Read>(
        &self,
        reader: R,
        declared: Option<u64>,
        mime_type: &str,
        held: &mut HashSet<ContentHash>,
    ) -> FileResult<ContentHash> {
        // Read at most one byte past a declared size.
        let limit = declared.map_or(u64::MAX, |d| d.saturating_add(1));
        let mut reader = reader.take(limit);
        let mut hasher: ContentHasher = ContentHash::hasher();
        let mut shards = Vec::new();
        let mut total = 0u64;
        let mut buf = vec![0u8; self.config.chunk_size];

        loop {
            let n = fill(&mut reader, &mut buf).map_err(FileError::Read)?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            hasher.update(chunk);
            total += n as u64;

            let hash = ContentHash::compute(chunk);
            if !held.contains(&hash) {
                self.acquire_shard(hash, chunk, held)?;
            }
            shards.push(hash);

            if n < buf.len() {
                break;
            }
        }

        if let Some(declared) = declared {
            check_size(declared, total)?;
        }

        let id = hasher.finalize();
        let _guard = self.commit.lock();
        let meta = FileMeta::sharded(total, shards, mime_type);
        if self.commit_record(&id, &meta)? {
            // The existing record already holds these shards.
            for shard in held.drain() {
                if let Err(e) = self.release_shard(&shard) {
                    tracing::error!(shard = %shard, error = %e, "Failed to release shard of deduplicated file");
                }
            }
        } else {
            held.clear();
            tracing::debug!(file = %id, size = total, shards = meta.shards().len(), "Stored sharded file");
        }
        Ok(id)
    }

    /// Takes a hold on the shard `hash`, writing `chunk` if the blob is
    /// missing.
    fn acquire_shard(
        &self,
        hash: ContentHash,
        chunk: &[u8],
        held: &mut HashSet<ContentHash>,
    ) -> FileResult<()> {
        let present = {
            let _guard = self.commit.lock();
            self.meta.acquire_shard(&hash)?;
            held.insert(hash);
            self.blobs.exists(&hash)?
        };
        if !present {
            self.blobs.write(chunk)?;
        }
        Ok(())
    }

    /// Drops a hold on the shard `hash`, removing the blob when no holder
    /// remains. Returns `true` if the blob was removed.
    ///
    /// Callers hold the commit lock.
    fn release_shard(&self, hash: &ContentHash) -> FileResult<bool> {
        if self.meta.release_shard(hash)? > 0 {
            return Ok(false);
        }
        match self.blobs.delete(hash) {
            Err(e) if !e.is_not_found() => Err(e),
            _ => Ok(true),
        }
    }

    /// Adds a reference to the record for `id`, or creates it from `meta`.
    ///
    /// Returns `true` when the record already existed.
    fn commit_record(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<bool> {
        let mut attempt = 0;
        loop {
            if let Some(ref_count) = self.meta.add_reference(id)? {
                tracing::debug!(file = %id, ref_count, "Deduplicated file");
                return Ok(true);
            }
            match self.meta.create(id, meta) {
                Ok(()) => return Ok(false),
                Err(e) if e.is_already_exists() && attempt + 1 < COMMIT_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn cleanup(&self, held: &HashSet<ContentHash>) {
        if held.is_empty() {
            return;
        }
        let _guard = self.commit.lock();
        let mut removed = 0;
        for hash in held {
            match self.release_shard(hash) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(shard = %hash, error = %e, "Failed to remove shard after failed create");
                }
            }
        }
        tracing::warn!(shards = held.len(), removed, "Released shards held by failed create");
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Returns the hashes of `shards` without repeats, in first-seen order.
fn distinct(shards: &[ContentHash]) -> Vec<ContentHash> {
    let mut seen = HashSet::with_capacity(shards.len());
    shards.iter().copied().filter(|s| seen.insert(*s)).collect()
}

fn check_size(declared: u64, actual: u64) -> FileResult<()> {
    if declared == actual {
        Ok(())
    } else {
        Err(FileError::SizeMismatch { declared, actual })
    }
}

fn read_up_to<R: Read>(reader: &mut R, limit: u64) -> FileResult<Vec<u8>> {
    let mut data = Vec::new();
    reader
        .take(limit)
        .read_to_end(&mut data)
        .map_err(FileError::Read)?;
    Ok(data)
}

/// Reads until `buf` is full or the reader ends, returning the byte count.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

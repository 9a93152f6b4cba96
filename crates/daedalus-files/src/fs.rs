//! Filesystem stores.
//!
//! Blobs are laid out as `root/ab/cd/<hex>`, where `ab` and `cd` are the
//! first two bytes of the hash, so no directory grows too large. Records
//! are stored as `root/<hex>.json` and shard reference counts as
//! `root/refs/<hex>`. Every write goes to a uniquely named
//! temporary file in the target directory, is synced, and is renamed into
//! place.

use crate::error::{FileError, FileResult};
use crate::hash::ContentHash;
use crate::meta::FileMeta;
use crate::store::{BlobStore, MetaStore};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_name = format!(
        ".{}.tmp.{}",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Uuid::now_v7().simple()
    );
    let temp_path = path.with_file_name(temp_name);
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Filesystem [`BlobStore`].
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> FileResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| FileError::write(format!("blob root {}", root.display()), e))?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the blob stored under `hash`.
    #[must_use]
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex)
    }
}

impl BlobStore for FsBlobStore {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    fn write(&self, data: &[u8]) -> FileResult<ContentHash> {
        let hash = ContentHash::compute(data);
        let path = self.blob_path(&hash);
        if path.exists() {
            return Ok(hash);
        }
        write_atomic(&path, data).map_err(|e| FileError::write(format!("shard {hash}"), e))?;
        Ok(hash)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    fn read(&self, hash: &ContentHash) -> FileResult<Bytes> {
        match fs::read(self.blob_path(hash)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FileError::NotFound(format!("shard {hash}")))
            }
            Err(e) => Err(FileError::load(format!("shard {hash}"), e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    fn delete(&self, hash: &ContentHash) -> FileResult<()> {
        remove_if_present(&self.blob_path(hash))
            .map_err(|e| FileError::write(format!("shard {hash}"), e))
    }

    fn exists(&self, hash: &ContentHash) -> FileResult<bool> {
        self.blob_path(hash)
            .try_exists()
            .map_err(|e| FileError::load(format!("shard {hash}"), e))
    }
}

/// Filesystem [`MetaStore`] storing one JSON document per record.
///
/// Read-modify-write operations are serialised by a lock shared between
/// clones of the store.
#[derive(Debug, Clone)]
pub struct FsMetaStore {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FsMetaStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> FileResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| FileError::write(format!("metadata root {}", root.display()), e))?;
        Ok(Self {
            root,
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Returns the path of the record for `id`.
    #[must_use]
    pub fn record_path(&self, id: &ContentHash) -> PathBuf {
        self.root.join(format!("{}.json", id.to_hex()))
    }

    /// Returns the path of the reference count of the shard `hash`.
    #[must_use]
    pub fn shard_ref_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join("refs").join(hash.to_hex())
    }

    fn store(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()> {
        let data = serde_json::to_vec_pretty(meta)?;
        write_atomic(&self.record_path(id), &data)
            .map_err(|e| FileError::write(format!("metadata {id}"), e))
    }

    fn load(&self, id: &ContentHash) -> FileResult<Option<FileMeta>> {
        match fs::read(self.record_path(id)) {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileError::load(format!("metadata {id}"), e)),
        }
    }

    fn load_shard_refs(&self, hash: &ContentHash) -> FileResult<u64> {
        let text = match fs::read_to_string(self.shard_ref_path(hash)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(FileError::load(format!("shard refs {hash}"), e)),
        };
        text.trim()
            .parse()
            .map_err(|_| FileError::Corrupted(format!("shard refs {hash}: {text:?}")))
    }

    fn store_shard_refs(&self, hash: &ContentHash, count: u64) -> FileResult<()> {
        let path = self.shard_ref_path(hash);
        let result = if count == 0 {
            remove_if_present(&path)
        } else {
            write_atomic(&path, count.to_string().as_bytes())
        };
        result.map_err(|e| FileError::write(format!("shard refs {hash}"), e))
    }
}

impl MetaStore for FsMetaStore {
    fn create(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()> {
        let _guard = self.lock.lock();
        if self.exists(id)? {
            return Err(FileError::AlreadyExists(format!("file {id}")));
        }
        self.store(id, meta)
    }

    fn get(&self, id: &ContentHash) -> FileResult<FileMeta> {
        self.load(id)?
            .ok_or_else(|| FileError::NotFound(format!("file {id}")))
    }

    fn exists(&self, id: &ContentHash) -> FileResult<bool> {
        self.record_path(id)
            .try_exists()
            .map_err(|e| FileError::load(format!("metadata {id}"), e))
    }

    fn update(&self, id: &ContentHash, meta: &FileMeta) -> FileResult<()> {
        let _guard = self.lock.lock();
        if !self.exists(id)? {
            return Err(FileError::NotFound(format!("file {id}")));
        }
        self.store(id, meta)
    }

    fn delete(&self, id: &ContentHash) -> FileResult<()> {
        let _guard = self.lock.lock();
        remove_if_present(&self.record_path(id))
            .map_err(|e| FileError::write(format!("metadata {id}"), e))
    }

    fn add_reference(&self, id: &ContentHash) -> FileResult<Option<u32>> {
        let _guard = self.lock.lock();
        let Some(mut meta) = self.load(id)? else {
            return Ok(None);
        };
        meta.ref_count = meta.ref_count.saturating_add(1);
        meta.modify_time = Utc::now();
        self.store(id, &meta)?;
        Ok(Some(meta.ref_count))
    }

    fn release_reference(&self, id: &ContentHash) -> FileResult<Option<u32>> {
        let _guard = self.lock.lock();
        let Some(mut meta) = self.load(id)? else {
            return Ok(None);
        };
        if meta.ref_count <= 1 {
            return Ok(Some(0));
        }
        meta.ref_count -= 1;
        meta.modify_time = Utc::now();
        self.store(id, &meta)?;
        Ok(Some(meta.ref_count))
    }

    fn shard_refs(&self, hash: &ContentHash) -> FileResult<u64> {
        let _guard = self.lock.lock();
        self.load_shard_refs(hash)
    }

    fn acquire_shard(&self, hash: &ContentHash) -> FileResult<u64> {
        let _guard = self.lock.lock();
        let count = self.load_shard_refs(hash)? + 1;
        self.store_shard_refs(hash, count)?;
        Ok(count)
    }

    fn release_shard(&self, hash: &ContentHash) -> FileResult<u64> {
        let _guard = self.lock.lock();
        let count = self.load_shard_refs(hash)?.saturating_sub(1);
        self.store_shard_refs(hash, count)?;
        Ok(count)
    }
}

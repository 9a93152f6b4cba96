//! Reassembles stored files into byte streams.

use crate::error::{FileError, FileResult};
use crate::hash::ContentHash;
use crate::meta::{FileContent, FileMeta};
use crate::store::BlobStore;
use bytes::{Buf, Bytes};
use std::io::{self, Read};
use std::sync::Arc;

/// Turns a [`FileMeta`] back into a readable stream.
pub trait Assembler: Send + Sync {
    /// Returns a reader over the bytes described by `meta`.
    fn new_reader(&self, meta: &FileMeta) -> FileResult<Box<dyn Read + Send>>;
}

/// Assembler reading shards from a [`BlobStore`].
#[derive(Clone)]
pub struct ShardAssembler {
    blobs: Arc<dyn BlobStore>,
}

impl ShardAssembler {
    /// Creates an assembler over `blobs`.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

impl std::fmt::Debug for ShardAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardAssembler").finish_non_exhaustive()
    }
}

impl Assembler for ShardAssembler {
    fn new_reader(&self, meta: &FileMeta) -> FileResult<Box<dyn Read + Send>> {
        match &meta.content {
            FileContent::Embedded(data) => Ok(Box::new(io::Cursor::new(data.clone()))),
            FileContent::Sharded(shards) => Ok(Box::new(ShardReader::new(
                Arc::clone(&self.blobs),
                shards.clone(),
            ))),
        }
    }
}

/// Reader over a list of shards, fetched one at a time as the previous
/// one is exhausted.
///
/// Each fetched shard is checked against its hash; a missing or corrupted
/// shard surfaces as an I/O error from `read`.
pub struct ShardReader {
    blobs: Arc<dyn BlobStore>,
    shards: std::vec::IntoIter<ContentHash>,
    current: Bytes,
}

impl ShardReader {
    /// Creates a reader over `shards`.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, shards: Vec<ContentHash>) -> Self {
        Self {
            blobs,
            shards: shards.into_iter(),
            current: Bytes::new(),
        }
    }

    fn fetch(&self, hash: &ContentHash) -> io::Result<Bytes> {
        let data = self.blobs.read(hash).map_err(|e| {
            let kind = if e.is_not_found() {
                io::ErrorKind::NotFound
            } else {
                io::ErrorKind::Other
            };
            io::Error::new(kind, e)
        })?;
        if ContentHash::compute(&data) != *hash {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                FileError::Corrupted(hash.to_hex()),
            ));
        }
        Ok(data)
    }
}

impl Read for ShardReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while !self.current.has_remaining() {
            let Some(hash) = self.shards.next() else {
                return Ok(0);
            };
            self.current = self.fetch(&hash)?;
        }
        let n = buf.len().min(self.current.remaining());
        self.current.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl std::fmt::Debug for ShardReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardReader")
            .field("remaining_shards", &self.shards.len())
            .field("buffered", &self.current.len())
            .finish_non_exhaustive()
    }
}

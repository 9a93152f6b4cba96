//! File service integration tests.
//!
//! Covers the round-trip and hash properties over random content, the
//! embed/shard threshold, cleanup after failed creates, and the filesystem
//! backends.

use bytes::Bytes;
use daedalus_core::ErrorKind;
use daedalus_files::{
    BlobStore, ContentHash, FileError, FileResult, FileService, FileServiceConfig, FsBlobStore,
    FsMetaStore, MemoryBlobStore, MemoryMetaStore, MetaStore,
};
use proptest::prelude::*;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn service(threshold: u64, chunk: usize) -> (FileService, Arc<MemoryBlobStore>) {
    let blobs = Arc::new(MemoryBlobStore::new());
    let service = FileService::new(
        Arc::new(MemoryMetaStore::new()),
        blobs.clone(),
        FileServiceConfig {
            embed_threshold: threshold,
            chunk_size: chunk,
        },
    )
    .unwrap();
    (service, blobs)
}

fn read_all(service: &FileService, id: &ContentHash) -> Vec<u8> {
    let mut out = Vec::new();
    service.read(id).unwrap().read_to_end(&mut out).unwrap();
    out
}

/// Yields `data`, then fails.
struct FailingReader {
    data: io::Cursor<Vec<u8>>,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "source went away")),
            n => Ok(n),
        }
    }
}

/// Blob store that fails every write after the first `allowed`.
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    allowed: usize,
    writes: AtomicUsize,
}

impl BlobStore for FlakyBlobStore {
    fn write(&self, data: &[u8]) -> FileResult<ContentHash> {
        if self.writes.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(FileError::write("shard", io::Error::other("disk full")));
        }
        self.inner.write(data)
    }

    fn read(&self, hash: &ContentHash) -> FileResult<Bytes> {
        self.inner.read(hash)
    }

    fn delete(&self, hash: &ContentHash) -> FileResult<()> {
        self.inner.delete(hash)
    }

    fn exists(&self, hash: &ContentHash) -> FileResult<bool> {
        self.inner.exists(hash)
    }
}

#[test]
fn test_small_file() {
    let (service, _) = service(64, 16);
    let id = service.create(&b"hello"[..], 5).unwrap();

    assert_eq!(id, ContentHash::compute(b"hello"));
    let meta = service.get(&id).unwrap();
    assert_eq!(meta.size, 5);
    assert!(meta.is_embedded());
    assert_eq!(read_all(&service, &id), b"hello");
}

#[test]
fn test_large_file_with_chunk_four() {
    let (service, blobs) = service(4, 4);
    let id = service.create(&b"abcdefgh"[..], 8).unwrap();

    assert_eq!(
        service.get(&id).unwrap().shards(),
        &[ContentHash::compute(b"abcd"), ContentHash::compute(b"efgh")]
    );
    assert_eq!(blobs.len(), 2);
    assert_eq!(read_all(&service, &id), b"abcdefgh");
}

#[test]
fn test_short_stream_leaves_no_shards() {
    let (service, blobs) = service(4, 8);
    let err = service.create(&[7u8; 50][..], 100).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    assert!(blobs.is_empty());
}

#[test]
fn test_reader_error_cleans_up() {
    let (service, blobs) = service(4, 4);
    let reader = FailingReader {
        data: io::Cursor::new(b"abcdefghij".to_vec()),
    };
    let err = service.create(reader, 20).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReadError);
    assert!(blobs.is_empty());
}

#[test]
fn test_write_error_cleans_up() {
    let blobs = Arc::new(FlakyBlobStore {
        inner: MemoryBlobStore::new(),
        allowed: 2,
        writes: AtomicUsize::new(0),
    });
    let service = FileService::new(
        Arc::new(MemoryMetaStore::new()),
        blobs.clone(),
        FileServiceConfig {
            embed_threshold: 4,
            chunk_size: 4,
        },
    )
    .unwrap();

    let err = service.create(&b"aaaabbbbcccc"[..], 12).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteError);
    assert!(blobs.inner.is_empty());
}

#[test]
fn test_cleanup_keeps_shards_of_other_files() {
    let (service, blobs) = service(4, 4);
    let existing = service.create(&b"abcdefgh"[..], 8).unwrap();

    // Shares "abcd" with the stored file, then comes up short.
    let err = service.create(&b"abcdxyz"[..], 12).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeMismatch);

    assert_eq!(blobs.len(), 2);
    assert_eq!(read_all(&service, &existing), b"abcdefgh");
}

#[test]
fn test_delete_keeps_shards_shared_with_other_files() {
    let (service, blobs) = service(4, 4);
    let first = service.create(&b"abcdefgh"[..], 8).unwrap();
    let second = service.create(&b"abcdwxyz"[..], 8).unwrap();
    assert_eq!(blobs.len(), 3);

    service.delete(&first).unwrap();
    assert_eq!(blobs.len(), 2);
    assert_eq!(read_all(&service, &second), b"abcdwxyz");

    service.delete(&second).unwrap();
    assert!(blobs.is_empty());
}

#[test]
fn test_concurrent_identical_creates_count_every_reference() {
    const THREADS: usize = 8;
    let payload = b"the quick brown fox jumps..".to_vec();

    for _ in 0..50 {
        let (service, blobs) = service(4, 4);
        let ids: Vec<ContentHash> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| service.create(&payload[..], payload.len() as i64).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let id = ContentHash::compute(&payload);
        assert!(ids.iter().all(|i| *i == id));
        assert_eq!(service.get(&id).unwrap().ref_count, THREADS as u32);

        for _ in 0..THREADS - 1 {
            service.delete(&id).unwrap();
        }
        assert_eq!(read_all(&service, &id), payload);
        service.delete(&id).unwrap();
        assert!(!service.exists(&id).unwrap());
        assert!(blobs.is_empty());
    }
}

#[test]
fn test_failed_create_does_not_remove_shards_of_concurrent_create() {
    let (service, blobs) = service(4, 4);
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..20 {
                    let _ = service.create(&b"abcdefgh"[..], 12);
                }
            });
        }
        scope.spawn(|| {
            for _ in 0..20 {
                let id = service.create(&b"abcdijkl"[..], 8).unwrap();
                assert_eq!(read_all(&service, &id), b"abcdijkl");
                service.delete(&id).unwrap();
            }
        });
    });
    assert!(blobs.is_empty());
}

#[test]
fn test_failed_create_is_invisible() {
    let (service, _) = service(4, 4);
    let id = ContentHash::compute(b"abcdef");
    assert!(service.create(&b"abcdef"[..], 7).is_err());
    assert!(service.get(&id).unwrap_err().is_not_found());
}

#[test]
fn test_read_missing_file() {
    let service = FileService::in_memory();
    let err = service.read(&ContentHash::compute(b"missing")).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_filesystem_backends() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
    let service = FileService::new(
        Arc::new(FsMetaStore::new(dir.path().join("meta")).unwrap()),
        blobs.clone(),
        FileServiceConfig {
            embed_threshold: 8,
            chunk_size: 8,
        },
    )
    .unwrap();

    let content = b"the quick brown fox jumps over the lazy dog".to_vec();
    let id = service.create(&content[..], content.len() as i64).unwrap();
    assert_eq!(read_all(&service, &id), content);

    let meta = service.get(&id).unwrap();
    assert_eq!(meta.shards().len(), 6);
    assert!(meta.shards().iter().all(|h| blobs.blob_path(h).is_file()));

    service.delete(&id).unwrap();
    assert!(meta.shards().iter().all(|h| !blobs.blob_path(h).exists()));
    assert!(!service.exists(&id).unwrap());
}

#[test]
fn test_filesystem_backends_share_shards() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap());
    let meta = Arc::new(FsMetaStore::new(dir.path().join("meta")).unwrap());
    let service = FileService::new(
        meta.clone(),
        blobs.clone(),
        FileServiceConfig {
            embed_threshold: 4,
            chunk_size: 4,
        },
    )
    .unwrap();

    let first = service.create(&b"abcdefgh"[..], 8).unwrap();
    let second = service.create(&b"abcdwxyz"[..], 8).unwrap();
    let shared = ContentHash::compute(b"abcd");
    assert_eq!(meta.shard_refs(&shared).unwrap(), 2);

    service.delete(&first).unwrap();
    assert_eq!(meta.shard_refs(&shared).unwrap(), 1);
    assert!(blobs.blob_path(&shared).is_file());
    assert!(!blobs.blob_path(&ContentHash::compute(b"efgh")).exists());
    assert_eq!(read_all(&service, &second), b"abcdwxyz");
}

proptest! {
    #[test]
    fn prop_round_trip_and_hash(
        data in prop::collection::vec(any::<u8>(), 0..256),
        threshold in 0u64..64,
        chunk in 1usize..32,
        declare in any::<bool>(),
    ) {
        let (service, _) = service(threshold, chunk);
        let size = if declare { data.len() as i64 } else { -1 };
        let id = service.create(&data[..], size).unwrap();

        prop_assert_eq!(id, ContentHash::compute(&data));
        prop_assert_eq!(read_all(&service, &id), data.clone());

        let meta = service.get(&id).unwrap();
        prop_assert_eq!(meta.size, data.len() as u64);
        prop_assert_eq!(meta.is_embedded(), data.len() as u64 <= threshold);
    }

    #[test]
    fn prop_delete_twice_succeeds(data in prop::collection::vec(any::<u8>(), 0..128)) {
        let (service, blobs) = service(16, 8);
        let id = service.create(&data[..], data.len() as i64).unwrap();

        prop_assert!(service.delete(&id).is_ok());
        prop_assert!(service.delete(&id).is_ok());
        prop_assert!(blobs.is_empty());
    }
}

//! # Daedalus Files
//!
//! Content-addressed file storage for the Daedalus runtime.
//!
//! [`FileService`] stores byte streams under the SHA-256 of their content.
//! Small files are embedded in their [`FileMeta`] record; larger files are
//! split into shards kept in a [`BlobStore`], each addressed by its own
//! hash so identical chunks are stored once.
//!
//! ## Backends
//!
//! | Store | In memory | Filesystem |
//! |---|---|---|
//! | [`MetaStore`] | [`MemoryMetaStore`] | [`FsMetaStore`] (`root/<hex>.json`) |
//! | [`BlobStore`] | [`MemoryBlobStore`] | [`FsBlobStore`] (`root/ab/cd/<hex>`) |
//!
//! ## Example
//!
//! ```
//! use daedalus_files::{FileService, FileServiceConfig, FsBlobStore, FsMetaStore};
//! use std::sync::Arc;
//!
//! # let dir = tempfile::tempdir().unwrap();
//! let service = FileService::new(
//!     Arc::new(FsMetaStore::new(dir.path().join("meta")).unwrap()),
//!     Arc::new(FsBlobStore::new(dir.path().join("blobs")).unwrap()),
//!     FileServiceConfig::default(),
//! )
//! .unwrap();
//!
//! let id = service.create(&b"hello"[..], 5).unwrap();
//! assert_eq!(id.to_hex(), "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
//! service.delete(&id).unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-files/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assembler;
mod error;
pub mod fs;
mod hash;
pub mod memory;
mod meta;
mod service;
pub mod store;

pub use assembler::{Assembler, ShardAssembler, ShardReader};
pub use error::{FileError, FileResult};
pub use fs::{FsBlobStore, FsMetaStore};
pub use hash::{ContentHash, ContentHasher};
pub use memory::{MemoryBlobStore, MemoryMetaStore};
pub use meta::{FileContent, FileMeta, DEFAULT_MIME_TYPE};
pub use service::{FileService, FileServiceConfig, DEFAULT_CHUNK_SIZE, DEFAULT_EMBED_THRESHOLD};
pub use store::{BlobStore, MetaStore};

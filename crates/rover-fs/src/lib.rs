//! Read-only, time-travelling filesystem namespace over a permanode graph.
//!
//! The namespace is a tree of four node shapes, each filled lazily from
//! graph queries and cached on itself:
//!
//! - [`RootsDirectory`](RootsDir) -- every `camliRoot` / `camliImportRoot`
//!   permanode, refreshed on a time-to-live
//! - [`StaticDir`] -- one permanode's `camliPath:` entries, populated once
//! - [`VersionedFileDir`] -- one file permanode's claim history, one entry
//!   per claim, populated once
//! - [`FileVersion`] -- one immutable snapshot of content or a symlink
//!
//! [`Node`] is the closed protocol over them; [`RoverFs`] serves it to the
//! kernel through `fuser`.
//!
//! # Design Rules
//!
//! 1. Nothing is ever written to the graph. Every mutation is `EPERM`.
//! 2. Inode numbers are a pure function of an object ref.
//! 3. Populated directories are authoritative for the process lifetime;
//!    only the roots listing refreshes, and only after its TTL.
//! 4. Query failures are never cached: the next access retries.
//! 5. Parents own children; children hold `Weak` back-references.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod fuse;
pub mod inode;
pub mod lifecycle;
pub mod mount;
pub mod namespace;
pub mod node;
pub mod roots;
pub mod static_dir;
pub mod version;
pub mod versioned;
pub mod xattr;

pub use config::FsConfig;
pub use context::FsContext;
pub use error::{FsError, FsResult};
pub use events::{FsEvent, FsEvents, NoopEvents, RecordingEvents, TracingEvents};
pub use fuse::RoverFs;
pub use inode::{ino_for, NodeAttr, NodeKind, ROOT_INO};
pub use lifecycle::{Lifecycle, PopulateCell};
pub use mount::{mount, mount_options};
pub use namespace::Namespace;
pub use node::{DirEntry, Node, OpenedFile};
pub use roots::RootsDir;
pub use static_dir::StaticDir;
pub use version::{FileVersion, Snapshot};
pub use versioned::{VersionSource, VersionedFileDir};
pub use xattr::XattrAccessor;

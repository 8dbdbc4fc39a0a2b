//! The node protocol shared by every namespace variant.
//!
//! The namespace is a tree of exactly four node shapes. [`Node`] is the
//! closed set; every protocol operation is an exhaustive match over it.
//! Parents own their children through `Arc`; children point back through
//! [`Parent`], which holds only `Weak` references.

use std::sync::{Arc, Weak};

use rover_graph::ContentReader;

use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::inode::{NodeAttr, NodeKind, ROOT_INO};
use crate::roots::RootsDir;
use crate::static_dir::StaticDir;
use crate::version::FileVersion;
use crate::versioned::VersionedFileDir;
use crate::xattr::XattrAccessor;

/// A node of the namespace tree.
#[derive(Clone, Debug)]
pub enum Node {
    /// The mount root: every named root and import root.
    Roots(Arc<RootsDir>),
    /// A permanode's `camliPath:` entries.
    Dir(Arc<StaticDir>),
    /// A file permanode's history, one entry per claim.
    Versions(Arc<VersionedFileDir>),
    /// One historical snapshot.
    Version(Arc<FileVersion>),
}

/// Non-owning back-reference to a node's parent.
#[derive(Clone, Debug)]
pub(crate) enum Parent {
    Roots(Weak<RootsDir>),
    Dir(Weak<StaticDir>),
    Versions(Weak<VersionedFileDir>),
}

impl Parent {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        match self {
            Parent::Roots(w) => w.upgrade().map(Node::Roots),
            Parent::Dir(w) => w.upgrade().map(Node::Dir),
            Parent::Versions(w) => w.upgrade().map(Node::Versions),
        }
    }
}

/// One directory listing entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub ino: u64,
    pub kind: NodeKind,
}

/// A successfully opened file version.
pub struct OpenedFile {
    pub reader: Box<dyn ContentReader>,
    /// Flags for the open response.
    pub open_flags: u32,
}

impl std::fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFile")
            .field("open_flags", &self.open_flags)
            .finish_non_exhaustive()
    }
}

/// Returns `true` if open flags ask for anything beyond reading.
pub fn has_write_intent(flags: i32) -> bool {
    flags & libc::O_ACCMODE != libc::O_RDONLY
        || flags & (libc::O_APPEND | libc::O_CREAT | libc::O_TRUNC) != 0
}

/// Names that can appear in a directory listing.
pub(crate) fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

impl Node {
    pub fn ino(&self) -> u64 {
        match self {
            Node::Roots(_) => ROOT_INO,
            Node::Dir(d) => d.ino(),
            Node::Versions(v) => v.ino(),
            Node::Version(v) => v.ino(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Roots(_) | Node::Dir(_) | Node::Versions(_) => NodeKind::Directory,
            Node::Version(v) => v.kind(),
        }
    }

    /// Entry name in the parent. Empty for the root.
    pub fn name(&self) -> &str {
        match self {
            Node::Roots(_) => "",
            Node::Dir(d) => d.name(),
            Node::Versions(v) => v.name(),
            Node::Version(v) => v.name(),
        }
    }

    /// The parent node, if it is still alive. `None` for the root.
    pub fn parent(&self) -> Option<Node> {
        match self {
            Node::Roots(_) => None,
            Node::Dir(d) => d.parent(),
            Node::Versions(v) => v.parent(),
            Node::Version(v) => v.parent(),
        }
    }

    pub fn parent_ino(&self) -> u64 {
        self.parent().map_or(ROOT_INO, |p| p.ino())
    }

    /// Absolute path from the mount root.
    pub fn full_path(&self) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(self.clone());
        while let Some(node) = cursor {
            if matches!(node, Node::Roots(_)) {
                break;
            }
            names.push(node.name().to_string());
            cursor = node.parent();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    pub fn attr(&self) -> FsResult<NodeAttr> {
        Ok(match self {
            Node::Roots(r) => r.attr(),
            Node::Dir(d) => d.attr(),
            Node::Versions(v) => v.attr(),
            Node::Version(v) => v.attr(),
        })
    }

    pub fn read_dir(&self) -> FsResult<Vec<DirEntry>> {
        match self {
            Node::Roots(r) => r.read_dir(),
            Node::Dir(d) => d.read_dir(),
            Node::Versions(v) => v.read_dir(),
            Node::Version(_) => Err(FsError::NotADirectory),
        }
    }

    pub fn lookup(&self, name: &str) -> FsResult<Node> {
        match self {
            Node::Roots(r) => r.lookup(name),
            Node::Dir(d) => d.lookup(name),
            Node::Versions(v) => v.lookup(name).map(Node::Version),
            Node::Version(_) => Err(FsError::NotADirectory),
        }
    }

    /// Open for reading. Write intent is refused on every variant before
    /// anything else is checked.
    pub fn open(&self, flags: i32) -> FsResult<OpenedFile> {
        if has_write_intent(flags) {
            return Err(FsError::PermissionDenied);
        }
        match self {
            Node::Roots(_) | Node::Dir(_) | Node::Versions(_) => Err(FsError::IsADirectory),
            Node::Version(v) => v.open(flags),
        }
    }

    pub fn readlink(&self) -> FsResult<String> {
        match self {
            Node::Version(v) => v.readlink(),
            Node::Roots(_) | Node::Dir(_) | Node::Versions(_) => {
                Err(FsError::InvalidOperation("not a symlink".into()))
            }
        }
    }

    pub fn getxattr(&self, name: &str) -> FsResult<Vec<u8>> {
        self.xattrs().get(self.context(), name)
    }

    pub fn listxattr(&self) -> FsResult<Vec<String>> {
        self.xattrs().list(self.context())
    }

    pub fn setxattr(&self, name: &str, value: &[u8]) -> FsResult<()> {
        self.xattrs().set(name, value)
    }

    pub fn removexattr(&self, name: &str) -> FsResult<()> {
        self.xattrs().remove(name)
    }

    /// Content never changes, so there is nothing to flush.
    pub fn fsync(&self) -> FsResult<()> {
        Ok(())
    }

    pub fn xattrs(&self) -> &XattrAccessor {
        match self {
            Node::Roots(r) => r.xattrs(),
            Node::Dir(d) => d.xattrs(),
            Node::Versions(v) => v.xattrs(),
            Node::Version(v) => v.xattrs(),
        }
    }

    fn context(&self) -> &FsContext {
        match self {
            Node::Roots(r) => r.context(),
            Node::Dir(d) => d.context(),
            Node::Versions(v) => v.context(),
            Node::Version(v) => v.context(),
        }
    }

    pub fn as_dir(&self) -> Option<&Arc<StaticDir>> {
        match self {
            Node::Dir(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_versions(&self) -> Option<&Arc<VersionedFileDir>> {
        match self {
            Node::Versions(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Arc<FileVersion>> {
        match self {
            Node::Version(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if both handles point at the same node instance.
    pub fn same_node(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Roots(a), Node::Roots(b)) => Arc::ptr_eq(a, b),
            (Node::Dir(a), Node::Dir(b)) => Arc::ptr_eq(a, b),
            (Node::Versions(a), Node::Versions(b)) => Arc::ptr_eq(a, b),
            (Node::Version(a), Node::Version(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

//! Inode numbers and attribute records.

use std::time::SystemTime;

use fuser::{FileAttr, FileType};
use rover_types::ObjectRef;

use crate::config::FsConfig;

/// Inode of the mount root (FUSE convention).
pub const ROOT_INO: u64 = 1;

/// Owner read and search.
pub const DIR_PERM: u16 = 0o500;
/// Owner read.
pub const FILE_PERM: u16 = 0o400;

const BLOCK_SIZE: u64 = 512;

/// Inode number of the node backed by `blob`.
///
/// A pure function of the ref. Folds onto the reserved values 0 and 1 are
/// shifted out of the way; collisions beyond that are tolerated.
pub fn ino_for(blob: &ObjectRef) -> u64 {
    match blob.sum64() {
        n @ (0 | 1) => n + 2,
        n => n,
    }
}

/// What a node looks like to `stat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    File,
    Symlink,
}

impl From<NodeKind> for FileType {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Directory => FileType::Directory,
            NodeKind::File => FileType::RegularFile,
            NodeKind::Symlink => FileType::Symlink,
        }
    }
}

/// Attributes of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAttr {
    pub ino: u64,
    pub kind: NodeKind,
    pub size: u64,
    pub blocks: u64,
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
}

impl NodeAttr {
    /// Read-only directory attributes.
    pub fn directory(ino: u64, mtime: Option<SystemTime>, config: &FsConfig) -> Self {
        let mtime = mtime.unwrap_or(config.server_start);
        Self {
            ino,
            kind: NodeKind::Directory,
            size: 0,
            blocks: 0,
            perm: DIR_PERM,
            nlink: 2,
            uid: config.uid,
            gid: config.gid,
            atime: mtime,
            mtime,
            ctime: config.server_start,
            crtime: config.server_start,
        }
    }

    /// Read-only file or symlink attributes.
    ///
    /// `mtime` falls back to the configured start time; access time follows
    /// the modification time.
    pub fn leaf(
        ino: u64,
        kind: NodeKind,
        size: u64,
        mtime: Option<SystemTime>,
        config: &FsConfig,
    ) -> Self {
        let mtime = mtime.unwrap_or(config.server_start);
        Self {
            ino,
            kind,
            size,
            blocks: block_count(size),
            perm: FILE_PERM,
            nlink: 1,
            uid: config.uid,
            gid: config.gid,
            atime: mtime,
            mtime,
            ctime: config.server_start,
            crtime: config.server_start,
        }
    }

    pub fn to_file_attr(&self) -> FileAttr {
        FileAttr {
            ino: self.ino,
            size: self.size,
            blocks: self.blocks,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            crtime: self.crtime,
            kind: self.kind.into(),
            perm: self.perm,
            nlink: self.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }
}

fn block_count(size: u64) -> u64 {
    if size == 0 {
        0
    } else {
        size / BLOCK_SIZE + 1
    }
}

//! `fuser` adapter over a [`Namespace`].
//!
//! The kernel addresses nodes by inode number, so the adapter remembers
//! every node it has handed out through `lookup` until the kernel forgets
//! it. Open files are tracked by handle. All replies map [`FsError`]
//! through [`FsError::errno`].

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use fuser::{
    FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyXattr, Request,
};
use rover_graph::ContentReader;
use tracing::{debug, trace};

use crate::error::{FsError, FsResult};
use crate::inode::{NodeKind, ROOT_INO};
use crate::namespace::Namespace;
use crate::node::{has_write_intent, Node};

/// A node the kernel holds references to, with its lookup count.
struct Known {
    node: Node,
    lookups: u64,
}

/// A mountable filesystem over one namespace.
pub struct RoverFs {
    namespace: Namespace,
    ttl: Duration,
    nodes: HashMap<u64, Known>,
    handles: HashMap<u64, Box<dyn ContentReader>>,
    next_handle: u64,
}

impl RoverFs {
    pub fn new(namespace: Namespace) -> Self {
        let ttl = namespace.config().attr_ttl();
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INO,
            Known {
                node: namespace.root(),
                lookups: 1,
            },
        );
        Self {
            namespace,
            ttl,
            nodes,
            handles: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn node(&self, ino: u64) -> FsResult<Node> {
        self.nodes
            .get(&ino)
            .map(|known| known.node.clone())
            .ok_or_else(|| FsError::NotFound(format!("inode {ino}")))
    }

    /// Remember `node` under its inode and count the lookup. Colliding
    /// inodes keep the newest node.
    fn remember(&mut self, node: &Node) {
        let known = self.nodes.entry(node.ino()).or_insert_with(|| Known {
            node: node.clone(),
            lookups: 0,
        });
        known.node = node.clone();
        known.lookups += 1;
    }

    /// Drop `nlookup` references to `ino`. The entry goes away at zero; the
    /// root is never dropped.
    fn do_forget(&mut self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        if let Some(known) = self.nodes.get_mut(&ino) {
            known.lookups = known.lookups.saturating_sub(nlookup);
            if known.lookups == 0 {
                self.nodes.remove(&ino);
                trace!(ino, "forgotten");
            }
        }
    }

    fn do_lookup(&mut self, parent: u64, name: &OsStr) -> FsResult<fuser::FileAttr> {
        let name = name
            .to_str()
            .ok_or_else(|| FsError::NotFound(name.to_string_lossy().into_owned()))?;
        let child = self.node(parent)?.lookup(name)?;
        let attr = child.attr()?;
        self.remember(&child);
        Ok(attr.to_file_attr())
    }

    fn do_open(&mut self, ino: u64, flags: i32) -> FsResult<(u64, u32)> {
        let opened = self.node(ino)?.open(flags)?;
        let fh = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(fh, opened.reader);
        Ok((fh, opened.open_flags))
    }

    fn do_read(&mut self, fh: u64, offset: i64, size: u32) -> FsResult<Vec<u8>> {
        let reader = self
            .handles
            .get_mut(&fh)
            .ok_or_else(|| FsError::InvalidOperation(format!("unknown handle {fh}")))?;
        read_at(&mut **reader, offset, size)
    }
}

/// The full listing of `node`, including `.` and `..`.
pub fn directory_listing(node: &Node) -> FsResult<Vec<(u64, FileType, String)>> {
    let entries = node.read_dir()?;
    let mut listing = Vec::with_capacity(entries.len() + 2);
    listing.push((node.ino(), FileType::Directory, ".".to_string()));
    listing.push((node.parent_ino(), FileType::Directory, "..".to_string()));
    listing.extend(
        entries
            .into_iter()
            .map(|e| (e.ino, FileType::from(e.kind), e.name)),
    );
    Ok(listing)
}

/// Read up to `size` bytes at `offset`.
pub fn read_at(reader: &mut dyn ContentReader, offset: i64, size: u32) -> FsResult<Vec<u8>> {
    let offset = u64::try_from(offset)
        .map_err(|_| FsError::InvalidOperation(format!("negative offset {offset}")))?;
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(|e| FsError::Io(e.to_string()))?;
    let mut buf = Vec::with_capacity(size as usize);
    reader
        .take(u64::from(size))
        .read_to_end(&mut buf)
        .map_err(|e| FsError::Io(e.to_string()))?;
    Ok(buf)
}

/// How to answer an xattr request given the caller's buffer size.
#[derive(Debug, PartialEq, Eq)]
pub enum XattrReply {
    /// Size probe: report the length needed.
    Size(u32),
    Data(Vec<u8>),
    /// Buffer too small.
    Range,
    /// Longer than the protocol can express.
    TooLarge,
}

/// `len` as a reply length, if it fits the protocol's 32 bits.
fn wire_len(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

pub fn xattr_reply(value: Vec<u8>, size: u32) -> XattrReply {
    let Some(len) = wire_len(value.len()) else {
        return XattrReply::TooLarge;
    };
    if size == 0 {
        XattrReply::Size(len)
    } else if len > size {
        XattrReply::Range
    } else {
        XattrReply::Data(value)
    }
}

/// NUL-terminated concatenation of attribute names.
pub fn pack_xattr_names(names: &[String]) -> Vec<u8> {
    let mut packed = Vec::new();
    for name in names {
        packed.extend_from_slice(name.as_bytes());
        packed.push(0);
    }
    packed
}

fn send_xattr(reply: ReplyXattr, value: Vec<u8>, size: u32) {
    match xattr_reply(value, size) {
        XattrReply::Size(len) => reply.size(len),
        XattrReply::Data(data) => reply.data(&data),
        XattrReply::Range => reply.error(libc::ERANGE),
        XattrReply::TooLarge => reply.error(libc::E2BIG),
    }
}

impl Filesystem for RoverFs {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, ?name, "lookup");
        match self.do_lookup(parent, name) {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.do_forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(ino, "getattr");
        match self.node(ino).and_then(|n| n.attr()) {
            Ok(attr) => reply.attr(&self.ttl, &attr.to_file_attr()),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        trace!(ino, "readlink");
        match self.node(ino).and_then(|n| n.readlink()) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let result = self.node(ino).and_then(|node| {
            if node.kind() != NodeKind::Directory {
                Err(FsError::NotADirectory)
            } else if has_write_intent(flags) {
                Err(FsError::PermissionDenied)
            } else {
                Ok(())
            }
        });
        match result {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!(ino, offset, "readdir");
        let listing = match self.node(ino).and_then(|n| directory_listing(&n)) {
            Ok(listing) => listing,
            Err(e) => {
                debug!(ino, error = %e, "readdir failed");
                reply.error(e.errno());
                return;
            }
        };
        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (entry_ino, kind, name)) in listing.into_iter().enumerate().skip(skip) {
            if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(ino, flags, "open");
        match self.do_open(ino, flags) {
            Ok((fh, open_flags)) => reply.opened(fh, open_flags),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(ino, fh, offset, size, "read");
        match self.do_read(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(FsError::InvalidOperation(_)) => reply.error(libc::EBADF),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.handles.remove(&fh);
        reply.ok();
    }

    fn fsync(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _datasync: bool,
        reply: ReplyEmpty,
    ) {
        match self.node(ino).and_then(|n| n.fsync()) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let name = name.to_string_lossy();
        match self.node(ino).and_then(|n| n.setxattr(&name, value)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: ReplyXattr,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENODATA);
            return;
        };
        trace!(ino, name, "getxattr");
        match self.node(ino).and_then(|n| n.getxattr(name)) {
            Ok(value) => send_xattr(reply, value, size),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        trace!(ino, "listxattr");
        match self.node(ino).and_then(|n| n.listxattr()) {
            Ok(names) => send_xattr(reply, pack_xattr_names(&names), size),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = name.to_string_lossy();
        match self.node(ino).and_then(|n| n.removexattr(&name)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }
}

//! Leaf nodes: one immutable snapshot of a file or symlink.

use std::sync::{Arc, Weak};

use fuser::consts::FOPEN_DIRECT_IO;
use rover_types::{Claim, ClaimTime, ObjectRef};

use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::events::FsEvent;
use crate::inode::{ino_for, NodeAttr, NodeKind};
use crate::node::{has_write_intent, Node, OpenedFile, Parent};
use crate::versioned::VersionedFileDir;
use crate::xattr::XattrAccessor;

/// What a version captured. Fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Snapshot {
    File { content: ObjectRef, size: u64 },
    Symlink { target: String },
}

/// One historical version of a file permanode.
#[derive(Debug)]
pub struct FileVersion {
    ctx: Arc<FsContext>,
    parent: Weak<VersionedFileDir>,
    name: String,
    claim_ref: ObjectRef,
    date: ClaimTime,
    snapshot: Snapshot,
    xattrs: XattrAccessor,
}

impl FileVersion {
    pub(crate) fn new(
        ctx: Arc<FsContext>,
        parent: Weak<VersionedFileDir>,
        name: String,
        claim: &Claim,
        snapshot: Snapshot,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            parent,
            name,
            claim_ref: claim.claim_ref,
            date: claim.date,
            snapshot,
            xattrs: XattrAccessor::as_of(claim.permanode, claim.date),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inode derived from the claim, so every version has its own.
    pub fn ino(&self) -> u64 {
        ino_for(&self.claim_ref)
    }

    pub fn claim_ref(&self) -> ObjectRef {
        self.claim_ref
    }

    pub fn date(&self) -> ClaimTime {
        self.date
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn kind(&self) -> NodeKind {
        match self.snapshot {
            Snapshot::File { .. } => NodeKind::File,
            Snapshot::Symlink { .. } => NodeKind::Symlink,
        }
    }

    pub fn size(&self) -> u64 {
        match &self.snapshot {
            Snapshot::File { size, .. } => *size,
            Snapshot::Symlink { target } => target.len() as u64,
        }
    }

    pub fn content(&self) -> Option<ObjectRef> {
        match self.snapshot {
            Snapshot::File { content, .. } => Some(content),
            Snapshot::Symlink { .. } => None,
        }
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr::leaf(
            self.ino(),
            self.kind(),
            self.size(),
            Some(self.date.to_system_time()),
            &self.ctx.config,
        )
    }

    /// Open a reader over this version's bytes. The response never asks for
    /// direct I/O.
    pub fn open(&self, flags: i32) -> FsResult<OpenedFile> {
        if has_write_intent(flags) {
            return Err(FsError::PermissionDenied);
        }
        let Snapshot::File { content, .. } = &self.snapshot else {
            return Err(FsError::InvalidOperation(
                "symlink snapshots cannot be opened".into(),
            ));
        };
        let reader = self.ctx.content.open_content(content).map_err(|e| {
            let err = FsError::Io(format!("opening {}: {e}", content.short_hex()));
            self.ctx.emit(FsEvent::OpenFailed {
                path: self.full_path(),
                error: err.to_string(),
            });
            err
        })?;
        let open_flags = self.ctx.config.default_open_flags() & !FOPEN_DIRECT_IO;
        Ok(OpenedFile { reader, open_flags })
    }

    pub fn readlink(&self) -> FsResult<String> {
        match &self.snapshot {
            Snapshot::Symlink { target } => Ok(target.clone()),
            Snapshot::File { .. } => Err(FsError::InvalidOperation("not a symlink".into())),
        }
    }

    pub(crate) fn parent(&self) -> Option<Node> {
        Parent::Versions(self.parent.clone()).upgrade()
    }

    pub(crate) fn xattrs(&self) -> &XattrAccessor {
        &self.xattrs
    }

    pub(crate) fn context(&self) -> &FsContext {
        &self.ctx
    }

    fn full_path(&self) -> String {
        match self.parent.upgrade() {
            Some(parent) => format!("{}/{}", parent.full_path(), self.name),
            None => self.name.clone(),
        }
    }
}

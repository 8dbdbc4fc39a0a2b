//! Directories built from a permanode's `camliPath:` attributes.
//!
//! One describe at depth 3 (the directory, its children, their content)
//! is enough to classify every entry. The listing is fixed once populated;
//! entries that cannot be classified are left out rather than failing the
//! whole directory.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use rover_types::attrs::{CAMLI_CONTENT, CAMLI_SYMLINK_TARGET};
use rover_types::{ClaimTime, DescribeRequest, Description, ObjectRef, PermanodeAttrs};

use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::events::FsEvent;
use crate::inode::{ino_for, NodeAttr};
use crate::lifecycle::{Lifecycle, PopulateCell};
use crate::node::{is_valid_entry_name, DirEntry, Node, Parent};
use crate::versioned::{VersionSource, VersionedFileDir};
use crate::xattr::XattrAccessor;

const DESCRIBE_DEPTH: u32 = 3;

type Children = BTreeMap<String, Node>;

/// A directory whose entries are one permanode's `camliPath:` attributes.
#[derive(Debug)]
pub struct StaticDir {
    me: Weak<StaticDir>,
    ctx: Arc<FsContext>,
    parent: Parent,
    name: String,
    permanode: ObjectRef,
    mod_time: Option<ClaimTime>,
    xattrs: XattrAccessor,
    children: PopulateCell<Children>,
}

impl StaticDir {
    pub(crate) fn new(
        ctx: Arc<FsContext>,
        parent: Parent,
        name: String,
        permanode: ObjectRef,
        mod_time: Option<ClaimTime>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            ctx,
            parent,
            name,
            permanode,
            mod_time,
            xattrs: XattrAccessor::new(permanode),
            children: PopulateCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permanode(&self) -> ObjectRef {
        self.permanode
    }

    pub fn ino(&self) -> u64 {
        ino_for(&self.permanode)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.children.state()
    }

    pub fn attr(&self) -> NodeAttr {
        let mtime = self.mod_time.map(|t| t.to_system_time());
        NodeAttr::directory(self.ino(), mtime, &self.ctx.config)
    }

    pub fn read_dir(&self) -> FsResult<Vec<DirEntry>> {
        let children = self.populate()?;
        Ok(children
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                ino: node.ino(),
                kind: node.kind(),
            })
            .collect())
    }

    pub fn lookup(&self, name: &str) -> FsResult<Node> {
        self.populate()?
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Materialize the entries, once. A failed attempt leaves the directory
    /// unpopulated so the next call queries again.
    pub fn populate(&self) -> FsResult<Arc<BTreeMap<String, Node>>> {
        self.children.get_or_populate(|| {
            let path = self.full_path();
            self.ctx.emit(FsEvent::PopulateStarted { path: path.clone() });
            match self.load(&path) {
                Ok(children) => {
                    self.ctx.emit(FsEvent::Populated {
                        path,
                        entries: children.len(),
                    });
                    Ok(children)
                }
                Err(err) => {
                    self.ctx.emit(FsEvent::PopulateFailed {
                        path,
                        error: err.to_string(),
                    });
                    Err(err)
                }
            }
        })
    }

    fn load(&self, path: &str) -> FsResult<Children> {
        let req = DescribeRequest::single(self.permanode).depth(DESCRIBE_DEPTH);
        let desc = self.ctx.graph.describe(&req).map_err(|e| {
            FsError::Io(format!("describing {}: {e}", self.permanode.short_hex()))
        })?;
        let own = desc
            .permanode(&self.permanode)
            .ok_or_else(|| FsError::Malformed {
                at: self.permanode,
                reason: "directory permanode missing from its own describe".into(),
            })?;

        let mut children = Children::new();
        for (name, target) in own.attrs.paths() {
            match self.classify(&desc, name, target) {
                Ok(node) => {
                    children.insert(name.to_string(), node);
                }
                Err(reason) => self.ctx.emit(FsEvent::EntrySkipped {
                    path: path.to_string(),
                    name: name.to_string(),
                    reason,
                }),
            }
        }
        Ok(children)
    }

    /// Decide what `name -> target` becomes. `Err` carries the skip reason.
    fn classify(&self, desc: &Description, name: &str, target: &str) -> Result<Node, String> {
        if !is_valid_entry_name(name) {
            return Err("invalid entry name".into());
        }
        let child_ref =
            ObjectRef::parse(target).map_err(|e| format!("invalid ref {target:?}: {e}"))?;
        let child = desc
            .permanode(&child_ref)
            .ok_or_else(|| format!("unresolvable {}", child_ref.short_hex()))?;

        let ctx = Arc::clone(&self.ctx);
        let parent = Parent::Dir(self.me.clone());
        let name = name.to_string();
        let node = if child.attrs.contains(CAMLI_SYMLINK_TARGET) {
            Node::Versions(VersionedFileDir::new(
                ctx,
                parent,
                name,
                child_ref,
                VersionSource::SymlinkTarget,
                child.mod_time,
            ))
        } else if child.attrs.is_dir() {
            Node::Dir(StaticDir::new(ctx, parent, name, child_ref, child.mod_time))
        } else if has_file_content(desc, &child.attrs) {
            Node::Versions(VersionedFileDir::new(
                ctx,
                parent,
                name,
                child_ref,
                VersionSource::Content,
                child.mod_time,
            ))
        } else {
            return Err("unknown entry type".into());
        };
        node.xattrs().prime(&child.attrs);
        Ok(node)
    }

    pub(crate) fn parent(&self) -> Option<Node> {
        self.parent.upgrade()
    }

    pub(crate) fn xattrs(&self) -> &XattrAccessor {
        &self.xattrs
    }

    pub(crate) fn context(&self) -> &FsContext {
        &self.ctx
    }

    fn full_path(&self) -> String {
        match self.me.upgrade() {
            Some(me) => Node::Dir(me).full_path(),
            None => self.name.clone(),
        }
    }
}

/// `camliContent` names a blob the describe resolved as a file.
fn has_file_content(desc: &Description, attrs: &PermanodeAttrs) -> bool {
    attrs
        .get(CAMLI_CONTENT)
        .and_then(|v| ObjectRef::parse(v).ok())
        .and_then(|content| desc.get(&content))
        .is_some_and(|blob| blob.is_file())
}

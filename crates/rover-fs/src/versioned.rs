//! A file permanode's history presented as a directory.
//!
//! Each claim on the permanode's content attribute becomes one entry, named
//! by the claim's rendered timestamp. Unlike static directories, a single
//! unresolvable claim fails the whole listing: a version index with holes
//! would silently misrepresent the file's history.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use rover_types::attrs::{CAMLI_CONTENT, CAMLI_SYMLINK_TARGET};
use rover_types::{Claim, ClaimTime, DescribeRequest, ObjectRef};

use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::events::FsEvent;
use crate::inode::{ino_for, NodeAttr};
use crate::lifecycle::{Lifecycle, PopulateCell};
use crate::node::{DirEntry, Node, Parent};
use crate::version::{FileVersion, Snapshot};
use crate::xattr::XattrAccessor;

type Versions = BTreeMap<String, Arc<FileVersion>>;

/// Which attribute's history a [`VersionedFileDir`] lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionSource {
    /// `camliContent`: each version is a file snapshot.
    Content,
    /// `camliSymlinkTarget`: each version is a symlink snapshot.
    SymlinkTarget,
}

impl VersionSource {
    pub fn attr(self) -> &'static str {
        match self {
            VersionSource::Content => CAMLI_CONTENT,
            VersionSource::SymlinkTarget => CAMLI_SYMLINK_TARGET,
        }
    }
}

/// Directory of every historical version of one file permanode.
#[derive(Debug)]
pub struct VersionedFileDir {
    me: Weak<VersionedFileDir>,
    ctx: Arc<FsContext>,
    parent: Parent,
    name: String,
    permanode: ObjectRef,
    source: VersionSource,
    mod_time: Option<ClaimTime>,
    xattrs: XattrAccessor,
    versions: PopulateCell<Versions>,
}

impl VersionedFileDir {
    pub(crate) fn new(
        ctx: Arc<FsContext>,
        parent: Parent,
        name: String,
        permanode: ObjectRef,
        source: VersionSource,
        mod_time: Option<ClaimTime>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            ctx,
            parent,
            name,
            permanode,
            source,
            mod_time,
            xattrs: XattrAccessor::new(permanode),
            versions: PopulateCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permanode(&self) -> ObjectRef {
        self.permanode
    }

    pub fn source(&self) -> VersionSource {
        self.source
    }

    pub fn ino(&self) -> u64 {
        ino_for(&self.permanode)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.versions.state()
    }

    pub fn attr(&self) -> NodeAttr {
        let mtime = self.mod_time.map(|t| t.to_system_time());
        NodeAttr::directory(self.ino(), mtime, &self.ctx.config)
    }

    pub fn read_dir(&self) -> FsResult<Vec<DirEntry>> {
        let versions = self.populate()?;
        Ok(versions
            .iter()
            .map(|(name, version)| DirEntry {
                name: name.clone(),
                ino: version.ino(),
                kind: version.kind(),
            })
            .collect())
    }

    pub fn lookup(&self, name: &str) -> FsResult<Arc<FileVersion>> {
        self.populate()?
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Materialize every version, once. Nothing is committed unless every
    /// claim resolves.
    pub fn populate(&self) -> FsResult<Arc<BTreeMap<String, Arc<FileVersion>>>> {
        self.versions.get_or_populate(|| {
            let path = self.full_path();
            self.ctx.emit(FsEvent::PopulateStarted { path: path.clone() });
            match self.load() {
                Ok(versions) => {
                    self.ctx.emit(FsEvent::Populated {
                        path,
                        entries: versions.len(),
                    });
                    Ok(versions)
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

    fn load(&self) -> FsResult<Versions> {
        let attr = self.source.attr();
        let claims = self.ctx.graph.claims(&self.permanode, attr).map_err(|e| {
            FsError::Io(format!(
                "claims on {} {attr}: {e}",
                self.permanode.short_hex()
            ))
        })?;

        let mut versions = Versions::new();
        for claim in claims.iter().filter(|c| c.asserts_value()) {
            let snapshot = match self.source {
                VersionSource::Content => self.resolve_content(claim)?,
                VersionSource::SymlinkTarget => Snapshot::Symlink {
                    target: claim.value.clone(),
                },
            };
            let mut name = claim.date.render();
            if versions.contains_key(&name) {
                name = format!("{name}~{}", claim.claim_ref.short_hex());
            }
            let version = FileVersion::new(
                Arc::clone(&self.ctx),
                self.me.clone(),
                name.clone(),
                claim,
                snapshot,
            );
            versions.insert(name, version);
        }
        Ok(versions)
    }

    /// Resolve a content claim's blob as it stood when the claim was made.
    fn resolve_content(&self, claim: &Claim) -> FsResult<Snapshot> {
        let content = claim.value_ref().map_err(|e| FsError::Malformed {
            at: claim.claim_ref,
            reason: format!("content value is not a ref: {e}"),
        })?;
        let req = DescribeRequest::single(content).at(claim.date);
        let desc = self
            .ctx
            .graph
            .describe(&req)
            .map_err(|e| FsError::Io(format!("describing {}: {e}", content.short_hex())))?;
        let file = desc
            .get(&content)
            .filter(|blob| blob.is_file())
            .and_then(|blob| blob.file.as_ref())
            .ok_or_else(|| FsError::Malformed {
                at: content,
                reason: "content does not resolve to a file".into(),
            })?;
        Ok(Snapshot::File {
            content,
            size: file.size,
        })
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

    pub(crate) fn full_path(&self) -> String {
        match self.me.upgrade() {
            Some(me) => Node::Versions(me).full_path(),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::events::NoopEvents;
    use crate::inode::NodeKind;
    use crate::roots::RootsDir;
    use rover_graph::{Fault, InMemoryGraph};

    fn t(ms: i64) -> ClaimTime {
        ClaimTime::from_unix_millis(ms).unwrap()
    }

    fn dir_for(
        graph: &Arc<InMemoryGraph>,
        permanode: ObjectRef,
        source: VersionSource,
    ) -> (Arc<RootsDir>, Arc<VersionedFileDir>) {
        let ctx = Arc::new(
            FsContext::from_backend(Arc::clone(graph), FsConfig::default())
                .with_events(Arc::new(NoopEvents)),
        );
        let roots = RootsDir::new(Arc::clone(&ctx));
        let dir = VersionedFileDir::new(
            ctx,
            Parent::Roots(Arc::downgrade(&roots)),
            "file".into(),
            permanode,
            source,
            None,
        );
        (roots, dir)
    }

    #[test]
    fn one_entry_per_content_claim() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("file");
        let a = graph.add_file(vec![b'a'; 3], None);
        let b = graph.add_file(vec![b'b'; 5], None);
        graph.set_attr(&pn, CAMLI_CONTENT, &a.to_string(), t(1000)).unwrap();
        graph.set_attr(&pn, CAMLI_CONTENT, &b.to_string(), t(2000)).unwrap();

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::Content);
        let entries = dir.read_dir().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, t(1000).render());
        assert_eq!(entries[1].name, t(2000).render());
        assert!(entries.iter().all(|e| e.kind == NodeKind::File));

        let first = dir.lookup(&t(1000).render()).unwrap();
        assert_eq!(first.size(), 3);
        assert_eq!(first.content(), Some(a));
    }

    #[test]
    fn delete_claims_produce_no_entry() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("file");
        let a = graph.add_file("a", None);
        graph.set_attr(&pn, CAMLI_CONTENT, &a.to_string(), t(1)).unwrap();
        graph.del_attr(&pn, CAMLI_CONTENT, "", t(2)).unwrap();

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::Content);
        assert_eq!(dir.read_dir().unwrap().len(), 1);
    }

    #[test]
    fn same_timestamp_claims_get_distinct_names() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("file");
        let a = graph.add_file("a", None);
        let b = graph.add_file("b", None);
        graph.set_attr(&pn, CAMLI_CONTENT, &a.to_string(), t(1)).unwrap();
        let second = graph.set_attr(&pn, CAMLI_CONTENT, &b.to_string(), t(1)).unwrap();

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::Content);
        let names: Vec<_> = dir.read_dir().unwrap().into_iter().map(|e| e.name).collect();
        let plain = t(1).render();
        let suffixed = format!("{plain}~{}", second.claim_ref.short_hex());
        assert_eq!(names, vec![plain, suffixed]);
    }

    #[test]
    fn symlink_history_needs_no_describe() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("link");
        graph.set_attr(&pn, CAMLI_SYMLINK_TARGET, "/a", t(1)).unwrap();
        graph.set_attr(&pn, CAMLI_SYMLINK_TARGET, "/bb", t(2)).unwrap();

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::SymlinkTarget);
        graph.reset_counts();
        let entries = dir.read_dir().unwrap();
        assert!(entries.iter().all(|e| e.kind == NodeKind::Symlink));
        let latest = dir.lookup(&t(2).render()).unwrap();
        assert_eq!(latest.readlink().unwrap(), "/bb");
        assert_eq!(latest.size(), 3);
        assert_eq!(graph.call_counts().describe, 0);
        assert_eq!(graph.call_counts().claims, 1);
    }

    #[test]
    fn non_file_content_aborts_population() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("file");
        let a = graph.add_file("a", None);
        let other = graph.new_permanode("other");
        graph.set_attr(&pn, CAMLI_CONTENT, &a.to_string(), t(1)).unwrap();
        graph.set_attr(&pn, CAMLI_CONTENT, &other.to_string(), t(2)).unwrap();

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::Content);
        let err = dir.read_dir().unwrap_err();
        assert!(matches!(err, FsError::Malformed { .. }));
        assert_eq!(err.errno(), libc::EIO);
        assert_eq!(dir.lifecycle(), Lifecycle::Failed);
    }

    #[test]
    fn claims_failure_is_retryable() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("file");
        let a = graph.add_file("a", None);
        graph.set_attr(&pn, CAMLI_CONTENT, &a.to_string(), t(1)).unwrap();
        graph.inject_fault(Fault::Claims { permanode: pn });

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::Content);
        assert!(matches!(dir.read_dir(), Err(FsError::Io(_))));
        graph.clear_faults();
        assert_eq!(dir.read_dir().unwrap().len(), 1);
    }

    #[test]
    fn content_is_resolved_as_of_the_claim() {
        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("file");
        let a = graph.add_file("a", None);
        graph.set_attr(&pn, CAMLI_CONTENT, &a.to_string(), t(5)).unwrap();

        let (_roots, dir) = dir_for(&graph, pn, VersionSource::Content);
        graph.reset_counts();
        dir.populate().unwrap();
        // One claims query plus one pinned describe per version.
        assert_eq!(graph.call_counts().claims, 1);
        assert_eq!(graph.call_counts().describe, 1);
    }
}

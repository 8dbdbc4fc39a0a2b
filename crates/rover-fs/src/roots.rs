//! The mount root: every permanode tagged as a root or import root.
//!
//! Unlike the directories below it, the root listing tracks a mutable
//! query, so it is refreshed once its time-to-live has elapsed. The node
//! lock is held for the whole refresh; concurrent callers wait and then see
//! the fresh listing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use rover_graph::GraphError;
use rover_types::attrs::{CAMLI_IMPORT_ROOT, CAMLI_ROOT};
use rover_types::{ClaimTime, DescribeRequest, Description, ObjectRef, PermanodeAttrs};

use crate::context::FsContext;
use crate::error::{FsError, FsResult};
use crate::events::FsEvent;
use crate::inode::{ino_for, NodeAttr, NodeKind, ROOT_INO};
use crate::node::{is_valid_entry_name, DirEntry, Node, Parent};
use crate::static_dir::StaticDir;
use crate::xattr::XattrAccessor;

/// Prefix of directory names derived from `camliImportRoot`.
pub const IMPORTER_PREFIX: &str = "importer-";

#[derive(Clone, Debug)]
struct RootEntry {
    permanode: ObjectRef,
    mod_time: Option<ClaimTime>,
    attrs: PermanodeAttrs,
}

#[derive(Debug, Default)]
struct RootsState {
    refreshed_at: Option<Instant>,
    roots: BTreeMap<String, RootEntry>,
    children: HashMap<String, Arc<StaticDir>>,
}

/// Top-level directory of named roots.
#[derive(Debug)]
pub struct RootsDir {
    me: Weak<RootsDir>,
    ctx: Arc<FsContext>,
    xattrs: XattrAccessor,
    state: Mutex<RootsState>,
}

impl RootsDir {
    pub fn new(ctx: Arc<FsContext>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            ctx,
            xattrs: XattrAccessor::detached(),
            state: Mutex::new(RootsState::default()),
        })
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr::directory(ROOT_INO, None, &self.ctx.config)
    }

    pub fn read_dir(&self) -> FsResult<Vec<DirEntry>> {
        let mut state = self.state.lock();
        self.refresh_if_stale(&mut state)?;
        Ok(state
            .roots
            .iter()
            .map(|(name, entry)| DirEntry {
                name: name.clone(),
                ino: ino_for(&entry.permanode),
                kind: NodeKind::Directory,
            })
            .collect())
    }

    /// The directory for root `name`. The node is memoized for as long as
    /// the name keeps mapping to the same permanode.
    pub fn lookup(&self, name: &str) -> FsResult<Node> {
        let mut guard = self.state.lock();
        self.refresh_if_stale(&mut guard)?;
        let state = &mut *guard;

        let entry = state
            .roots
            .get(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if let Some(child) = state.children.get(name) {
            return Ok(Node::Dir(Arc::clone(child)));
        }
        let child = StaticDir::new(
            Arc::clone(&self.ctx),
            Parent::Roots(self.me.clone()),
            name.to_string(),
            entry.permanode,
            entry.mod_time,
        );
        child.xattrs().prime(&entry.attrs);
        state.children.insert(name.to_string(), Arc::clone(&child));
        Ok(Node::Dir(child))
    }

    /// Re-query the roots if the last successful refresh is older than the
    /// configured time-to-live. A failure keeps the previous listing.
    fn refresh_if_stale(&self, state: &mut RootsState) -> FsResult<()> {
        if let Some(at) = state.refreshed_at {
            if at.elapsed() < self.ctx.config.roots_ttl() {
                return Ok(());
            }
        }
        self.ctx.emit(FsEvent::RefreshStarted);
        let roots = match self.query_roots() {
            Ok(roots) => roots,
            Err(err) => {
                self.ctx.emit(FsEvent::RefreshFailed {
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        let mut evicted: Vec<String> = state
            .children
            .iter()
            .filter(|(name, child)| {
                roots.get(name.as_str()).map(|e| e.permanode) != Some(child.permanode())
            })
            .map(|(name, _)| name.clone())
            .collect();
        evicted.sort();
        for name in &evicted {
            state.children.remove(name);
        }

        state.roots = roots;
        state.refreshed_at = Some(Instant::now());
        self.ctx.emit(FsEvent::Refreshed {
            roots: state.roots.len(),
            evicted,
        });
        Ok(())
    }

    fn query_roots(&self) -> FsResult<BTreeMap<String, RootEntry>> {
        let graph = &self.ctx.graph;
        let limit = self.ctx.config.search_limit;
        let (roots, imports) = rayon::join(
            || graph.permanodes_with_attr(CAMLI_ROOT, limit),
            || graph.permanodes_with_attr(CAMLI_IMPORT_ROOT, limit),
        );
        let search_failed = |e: GraphError| FsError::Io(format!("root search: {e}"));
        let mut refs: Vec<ObjectRef> = roots
            .map_err(search_failed)?
            .into_iter()
            .chain(imports.map_err(search_failed)?)
            .map(|hit| hit.permanode)
            .collect();
        refs.sort();
        refs.dedup();
        if refs.is_empty() {
            return Ok(BTreeMap::new());
        }

        let desc = graph
            .describe(&DescribeRequest::new(refs.clone()))
            .map_err(|e| FsError::Io(format!("describing roots: {e}")))?;
        Ok(name_roots(&refs, &desc))
    }

    pub(crate) fn xattrs(&self) -> &XattrAccessor {
        &self.xattrs
    }

    pub(crate) fn context(&self) -> &FsContext {
        &self.ctx
    }
}

/// Directory name of an import root.
pub fn importer_name(import_root: &str) -> String {
    format!("{IMPORTER_PREFIX}{}", import_root.replace([':', '/'], "-"))
}

/// Name every described root. `refs` must be sorted: the lexically first
/// permanode wins a duplicated name, and literal roots always beat
/// importer names.
fn name_roots(refs: &[ObjectRef], desc: &Description) -> BTreeMap<String, RootEntry> {
    let mut literal = BTreeMap::new();
    let mut imported = BTreeMap::new();
    for permanode in refs {
        let Some(described) = desc.permanode(permanode) else {
            continue;
        };
        let entry = RootEntry {
            permanode: *permanode,
            mod_time: described.mod_time,
            attrs: described.attrs.clone(),
        };
        if let Some(name) = described.attrs.get(CAMLI_ROOT) {
            if is_valid_entry_name(name) {
                literal
                    .entry(name.to_string())
                    .or_insert_with(|| entry.clone());
            }
        }
        if let Some(source) = described.attrs.get(CAMLI_IMPORT_ROOT) {
            imported.entry(importer_name(source)).or_insert(entry);
        }
    }
    for (name, entry) in imported {
        literal.entry(name).or_insert(entry);
    }
    literal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::events::RecordingEvents;
    use rover_graph::{Fault, InMemoryGraph};
    use std::time::Duration;

    fn t(ms: i64) -> ClaimTime {
        ClaimTime::from_unix_millis(ms).unwrap()
    }

    fn roots_over(
        graph: &Arc<InMemoryGraph>,
        ttl: Duration,
    ) -> (Arc<RecordingEvents>, Arc<RootsDir>) {
        let events = Arc::new(RecordingEvents::new());
        let config = FsConfig::default().with_roots_ttl(ttl);
        let ctx = FsContext::from_backend(Arc::clone(graph), config).with_events(events.clone());
        (events, RootsDir::new(Arc::new(ctx)))
    }

    fn names(roots: &RootsDir) -> Vec<String> {
        roots.read_dir().unwrap().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn importer_names_are_sanitized() {
        assert_eq!(importer_name("flickr:alice/photos"), "importer-flickr-alice-photos");
    }

    #[test]
    fn lists_literal_and_import_roots() {
        let graph = Arc::new(InMemoryGraph::new());
        let a = graph.new_permanode("a");
        let b = graph.new_permanode("b");
        graph.set_attr(&a, CAMLI_ROOT, "photos", t(1)).unwrap();
        graph.set_attr(&b, CAMLI_IMPORT_ROOT, "twitter:bob", t(1)).unwrap();

        let (_events, roots) = roots_over(&graph, Duration::from_secs(60));
        assert_eq!(names(&roots), vec!["importer-twitter-bob", "photos"]);
        let entries = roots.read_dir().unwrap();
        let photos = entries.iter().find(|e| e.name == "photos").unwrap();
        assert_eq!(photos.ino, ino_for(&a));
    }

    #[test]
    fn literal_roots_win_name_collisions() {
        let graph = Arc::new(InMemoryGraph::new());
        let literal = graph.new_permanode("literal");
        let imported = graph.new_permanode("imported");
        graph
            .set_attr(&literal, CAMLI_ROOT, "importer-x", t(1))
            .unwrap();
        graph.set_attr(&imported, CAMLI_IMPORT_ROOT, "x", t(1)).unwrap();

        let (_events, roots) = roots_over(&graph, Duration::from_secs(60));
        let node = roots.lookup("importer-x").unwrap();
        assert_eq!(node.as_dir().unwrap().permanode(), literal);
    }

    #[test]
    fn duplicate_literal_names_resolve_to_the_smallest_ref() {
        let graph = Arc::new(InMemoryGraph::new());
        let p = graph.new_permanode("p");
        let q = graph.new_permanode("q");
        graph.set_attr(&p, CAMLI_ROOT, "same", t(1)).unwrap();
        graph.set_attr(&q, CAMLI_ROOT, "same", t(2)).unwrap();

        let (_events, roots) = roots_over(&graph, Duration::from_secs(60));
        let node = roots.lookup("same").unwrap();
        assert_eq!(node.as_dir().unwrap().permanode(), p.min(q));
    }

    #[test]
    fn empty_search_is_a_successful_refresh() {
        let graph = Arc::new(InMemoryGraph::new());
        let (events, roots) = roots_over(&graph, Duration::from_secs(60));
        assert!(names(&roots).is_empty());
        assert!(names(&roots).is_empty());
        let counts = graph.call_counts();
        assert_eq!(counts.search, 2);
        assert_eq!(counts.describe, 0);
        assert_eq!(
            events.count(|e| matches!(e, FsEvent::Refreshed { .. })),
            1
        );
    }

    #[test]
    fn lookup_memoizes_children() {
        let graph = Arc::new(InMemoryGraph::new());
        let a = graph.new_permanode("a");
        graph.set_attr(&a, CAMLI_ROOT, "docs", t(1)).unwrap();

        let (_events, roots) = roots_over(&graph, Duration::from_secs(60));
        let first = roots.lookup("docs").unwrap();
        let second = roots.lookup("docs").unwrap();
        assert!(first.same_node(&second));
        assert!(matches!(roots.lookup("nope"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn failed_search_keeps_previous_listing() {
        let graph = Arc::new(InMemoryGraph::new());
        let a = graph.new_permanode("a");
        graph.set_attr(&a, CAMLI_ROOT, "docs", t(1)).unwrap();

        let (events, roots) = roots_over(&graph, Duration::ZERO);
        assert_eq!(names(&roots), vec!["docs"]);

        graph.inject_fault(Fault::Search {
            attr: CAMLI_IMPORT_ROOT.into(),
        });
        assert!(matches!(roots.read_dir(), Err(FsError::Io(_))));
        assert_eq!(
            events.count(|e| matches!(e, FsEvent::RefreshFailed { .. })),
            1
        );

        graph.clear_faults();
        assert_eq!(names(&roots), vec!["docs"]);
    }

    #[test]
    fn remapped_name_evicts_the_old_child() {
        let graph = Arc::new(InMemoryGraph::new());
        let old = graph.new_permanode("old");
        let new = graph.new_permanode("new");
        graph.set_attr(&old, CAMLI_ROOT, "docs", t(1)).unwrap();

        let (events, roots) = roots_over(&graph, Duration::ZERO);
        let before = roots.lookup("docs").unwrap();

        graph.del_attr(&old, CAMLI_ROOT, "", t(2)).unwrap();
        graph.set_attr(&new, CAMLI_ROOT, "docs", t(3)).unwrap();
        let after = roots.lookup("docs").unwrap();
        assert!(!before.same_node(&after));
        assert_eq!(after.as_dir().unwrap().permanode(), new);
        assert!(events.events().contains(&FsEvent::Refreshed {
            roots: 1,
            evicted: vec!["docs".into()],
        }));
    }
}

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use rover_types::attrs::{CAMLI_CONTENT, CAMLI_PATH_PREFIX};
use rover_types::{
    BlobKind, Claim, ClaimKind, ClaimTime, DescribeRequest, DescribedBlob, DescribedPermanode,
    Description, FileInfo, ObjectRef, PermanodeAttrs, WithAttrHit,
};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::object::{claim_ref, BlobHasher, StoredFile};
use crate::traits::{ContentFetcher, ContentReader, GraphQueryClient};

/// Number of calls made against each query entry point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub describe: usize,
    pub claims: usize,
    pub search: usize,
    pub content: usize,
}

/// A failure to simulate on matching calls until cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Fail `permanodes_with_attr` for this attribute.
    Search { attr: String },
    /// Fail any `describe` whose request roots include this blob.
    Describe { blob: ObjectRef },
    /// Fail `claims` for this permanode.
    Claims { permanode: ObjectRef },
    /// Fail `open_content` for this file.
    Content { blob: ObjectRef },
}

#[derive(Default)]
struct Counters {
    describe: AtomicUsize,
    claims: AtomicUsize,
    search: AtomicUsize,
    content: AtomicUsize,
}

#[derive(Default)]
struct GraphState {
    /// Claims per permanode, oldest first.
    permanodes: BTreeMap<ObjectRef, Vec<Claim>>,
    files: HashMap<ObjectRef, StoredFile>,
}

impl GraphState {
    fn replay(&self, permanode: &ObjectRef, at: Option<&ClaimTime>) -> Option<DescribedPermanode> {
        let claims = self.permanodes.get(permanode)?;
        let visible = claims
            .iter()
            .filter(|c| at.map_or(true, |at| !c.date.is_after(at)));
        let mut attrs = PermanodeAttrs::new();
        let mut mod_time = None;
        for claim in visible {
            attrs.apply(claim);
            mod_time = Some(claim.date);
        }
        Some(DescribedPermanode { attrs, mod_time })
    }

    fn describe_one(&self, blob: &ObjectRef, at: Option<&ClaimTime>) -> Option<DescribedBlob> {
        if let Some(permanode) = self.replay(blob, at) {
            return Some(DescribedBlob {
                blob_ref: *blob,
                kind: BlobKind::Permanode,
                size: 0,
                permanode: Some(permanode),
                file: None,
            });
        }
        let file = self.files.get(blob)?;
        Some(DescribedBlob {
            blob_ref: *blob,
            kind: BlobKind::File,
            size: file.size(),
            permanode: None,
            file: Some(FileInfo {
                size: file.size(),
                file_name: file.file_name.clone(),
                mime_type: None,
            }),
        })
    }
}

/// Blobs a permanode's state points at: its content and its directory entries.
fn referenced(attrs: &PermanodeAttrs) -> Vec<ObjectRef> {
    attrs
        .iter()
        .filter(|(name, _)| *name == CAMLI_CONTENT || name.starts_with(CAMLI_PATH_PREFIX))
        .flat_map(|(_, values)| values.iter())
        .filter_map(|v| ObjectRef::parse(v).ok())
        .collect()
}

/// In-memory permanode/claim graph.
///
/// Intended for tests and fixture-backed mounts. Permanode state is computed
/// by replaying claims, so describe queries can be pinned to any point in
/// time. Every query entry point is counted, and failures can be injected
/// per call site with [`Fault`].
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
    counters: Counters,
    faults: Mutex<Vec<Fault>>,
}

impl InMemoryGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            counters: Counters::default(),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Create a permanode whose ref is derived from `seed`.
    ///
    /// Creating the same seed twice returns the same permanode.
    pub fn new_permanode(&self, seed: &str) -> ObjectRef {
        let permanode = BlobHasher::PERMANODE.hash(seed.as_bytes());
        self.state.write().permanodes.entry(permanode).or_default();
        permanode
    }

    /// Store a file blob and return its ref.
    pub fn add_file(&self, data: impl Into<Vec<u8>>, file_name: Option<&str>) -> ObjectRef {
        let file = StoredFile::new(data.into(), file_name.map(str::to_string));
        let blob = file.compute_ref();
        self.state.write().files.entry(blob).or_insert(file);
        blob
    }

    /// Record a claim against an existing permanode.
    pub fn add_claim(
        &self,
        permanode: &ObjectRef,
        kind: ClaimKind,
        attr: &str,
        value: &str,
        date: ClaimTime,
    ) -> GraphResult<Claim> {
        let mut state = self.state.write();
        let claims = state
            .permanodes
            .get_mut(permanode)
            .ok_or(GraphError::NotFound(*permanode))?;
        let claim = Claim {
            claim_ref: claim_ref(permanode, kind, attr, value, &date),
            permanode: *permanode,
            kind,
            attr: attr.to_string(),
            value: value.to_string(),
            date,
        };
        // Same-date claims keep insertion order.
        let at = claims.partition_point(|c| !c.date.is_after(&date));
        claims.insert(at, claim.clone());
        debug!(permanode = %permanode.short_hex(), attr, "claim recorded");
        Ok(claim)
    }

    pub fn set_attr(
        &self,
        permanode: &ObjectRef,
        attr: &str,
        value: &str,
        date: ClaimTime,
    ) -> GraphResult<Claim> {
        self.add_claim(permanode, ClaimKind::SetAttribute, attr, value, date)
    }

    pub fn add_attr(
        &self,
        permanode: &ObjectRef,
        attr: &str,
        value: &str,
        date: ClaimTime,
    ) -> GraphResult<Claim> {
        self.add_claim(permanode, ClaimKind::AddAttribute, attr, value, date)
    }

    pub fn del_attr(
        &self,
        permanode: &ObjectRef,
        attr: &str,
        value: &str,
        date: ClaimTime,
    ) -> GraphResult<Claim> {
        self.add_claim(permanode, ClaimKind::DelAttribute, attr, value, date)
    }

    /// Number of permanodes in the graph.
    pub fn permanode_count(&self) -> usize {
        self.state.read().permanodes.len()
    }

    /// Number of file blobs in the graph.
    pub fn file_count(&self) -> usize {
        self.state.read().files.len()
    }

    /// Snapshot of the call counters.
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            describe: self.counters.describe.load(Ordering::SeqCst),
            claims: self.counters.claims.load(Ordering::SeqCst),
            search: self.counters.search.load(Ordering::SeqCst),
            content: self.counters.content.load(Ordering::SeqCst),
        }
    }

    pub fn reset_counts(&self) {
        self.counters.describe.store(0, Ordering::SeqCst);
        self.counters.claims.store(0, Ordering::SeqCst);
        self.counters.search.store(0, Ordering::SeqCst);
        self.counters.content.store(0, Ordering::SeqCst);
    }

    /// Make matching calls fail until [`clear_faults`](Self::clear_faults).
    pub fn inject_fault(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    fn check_faults(&self, hit: impl Fn(&Fault) -> bool) -> GraphResult<()> {
        match self.faults.lock().iter().find(|f| hit(f)) {
            Some(fault) => Err(GraphError::Transport(format!("injected {fault:?}"))),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphQueryClient for InMemoryGraph {
    fn describe(&self, req: &DescribeRequest) -> GraphResult<Description> {
        self.counters.describe.fetch_add(1, Ordering::SeqCst);
        self.check_faults(|f| matches!(f, Fault::Describe { blob } if req.refs.contains(blob)))?;

        let state = self.state.read();
        let at = req.at.as_ref();
        let mut description = Description::default();
        let mut frontier = req.refs.clone();
        for _ in 0..req.depth.max(1) {
            let mut next = Vec::new();
            for blob in std::mem::take(&mut frontier) {
                if description.get(&blob).is_some() {
                    continue;
                }
                if let Some(described) = state.describe_one(&blob, at) {
                    if let Some(permanode) = &described.permanode {
                        next.extend(referenced(&permanode.attrs));
                    }
                    description.insert(described);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(description)
    }

    fn claims(&self, permanode: &ObjectRef, attr: &str) -> GraphResult<Vec<Claim>> {
        self.counters.claims.fetch_add(1, Ordering::SeqCst);
        self.check_faults(|f| matches!(f, Fault::Claims { permanode: p } if p == permanode))?;

        let state = self.state.read();
        Ok(state
            .permanodes
            .get(permanode)
            .map(|claims| claims.iter().filter(|c| c.attr == attr).cloned().collect())
            .unwrap_or_default())
    }

    fn permanodes_with_attr(&self, attr: &str, limit: usize) -> GraphResult<Vec<WithAttrHit>> {
        self.counters.search.fetch_add(1, Ordering::SeqCst);
        self.check_faults(|f| matches!(f, Fault::Search { attr: a } if a == attr))?;

        let state = self.state.read();
        let mut hits: Vec<(Option<ClaimTime>, ObjectRef)> = state
            .permanodes
            .keys()
            .filter_map(|pn| {
                let described = state.replay(pn, None)?;
                described
                    .attrs
                    .contains(attr)
                    .then_some((described.mod_time, *pn))
            })
            .collect();
        // Most recently modified first, ties by ref.
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|(_, permanode)| WithAttrHit { permanode })
            .collect())
    }
}

impl ContentFetcher for InMemoryGraph {
    fn open_content(&self, content: &ObjectRef) -> GraphResult<Box<dyn ContentReader>> {
        self.counters.content.fetch_add(1, Ordering::SeqCst);
        self.check_faults(|f| matches!(f, Fault::Content { blob } if blob == content))?;

        let state = self.state.read();
        match state.files.get(content) {
            Some(file) => Ok(Box::new(Cursor::new(file.data.clone()))),
            None if state.permanodes.contains_key(content) => Err(GraphError::WrongKind {
                blob: *content,
                expected: "file",
            }),
            None => Err(GraphError::NotFound(*content)),
        }
    }
}

impl std::fmt::Debug for InMemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGraph")
            .field("permanode_count", &self.permanode_count())
            .field("file_count", &self.file_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::attrs::{CAMLI_ROOT, CAMLI_SYMLINK_TARGET};
    use std::io::Read;

    fn t(ms: i64) -> ClaimTime {
        ClaimTime::from_unix_millis(ms).unwrap()
    }

    // -----------------------------------------------------------------------
    // Claims and replay
    // -----------------------------------------------------------------------

    #[test]
    fn claim_on_unknown_permanode_fails() {
        let graph = InMemoryGraph::new();
        let ghost = ObjectRef::from_bytes(b"ghost");
        let err = graph.set_attr(&ghost, "title", "x", t(1)).unwrap_err();
        assert!(matches!(err, GraphError::NotFound(r) if r == ghost));
    }

    #[test]
    fn claims_are_returned_oldest_first() {
        let graph = InMemoryGraph::new();
        let pn = graph.new_permanode("file");
        graph.set_attr(&pn, CAMLI_CONTENT, "b", t(20)).unwrap();
        graph.set_attr(&pn, CAMLI_CONTENT, "a", t(10)).unwrap();
        graph.set_attr(&pn, "title", "ignored", t(15)).unwrap();

        let claims = graph.claims(&pn, CAMLI_CONTENT).unwrap();
        let values: Vec<_> = claims.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn claims_for_unknown_permanode_are_empty() {
        let graph = InMemoryGraph::new();
        let claims = graph
            .claims(&ObjectRef::from_bytes(b"nobody"), CAMLI_CONTENT)
            .unwrap();
        assert!(claims.is_empty());
    }

    #[test]
    fn new_permanode_is_idempotent_per_seed() {
        let graph = InMemoryGraph::new();
        assert_eq!(graph.new_permanode("x"), graph.new_permanode("x"));
        assert_ne!(graph.new_permanode("x"), graph.new_permanode("y"));
        assert_eq!(graph.permanode_count(), 2);
    }

    // -----------------------------------------------------------------------
    // Describe
    // -----------------------------------------------------------------------

    #[test]
    fn describe_pins_state_to_as_of_time() {
        let graph = InMemoryGraph::new();
        let pn = graph.new_permanode("doc");
        graph.set_attr(&pn, "title", "draft", t(10)).unwrap();
        graph.set_attr(&pn, "title", "final", t(20)).unwrap();

        let then = graph
            .describe(&DescribeRequest::single(pn).at(t(15)))
            .unwrap();
        assert_eq!(then.permanode(&pn).unwrap().attrs.get("title"), Some("draft"));
        assert_eq!(then.permanode(&pn).unwrap().mod_time, Some(t(10)));

        let now = graph.describe(&DescribeRequest::single(pn)).unwrap();
        assert_eq!(now.permanode(&pn).unwrap().attrs.get("title"), Some("final"));
    }

    #[test]
    fn describe_follows_paths_and_content_by_depth() {
        let graph = InMemoryGraph::new();
        let dir = graph.new_permanode("dir");
        let file = graph.new_permanode("file");
        let content = graph.add_file("hello", Some("hello.txt"));
        graph
            .set_attr(&dir, "camliPath:hello.txt", &file.to_string(), t(1))
            .unwrap();
        graph
            .set_attr(&file, CAMLI_CONTENT, &content.to_string(), t(1))
            .unwrap();

        let shallow = graph.describe(&DescribeRequest::single(dir)).unwrap();
        assert_eq!(shallow.len(), 1);

        let deep = graph
            .describe(&DescribeRequest::single(dir).depth(3))
            .unwrap();
        assert_eq!(deep.len(), 3);
        let blob = deep.get(&content).unwrap();
        assert!(blob.is_file());
        assert_eq!(blob.file.as_ref().unwrap().size, 5);
    }

    #[test]
    fn describe_omits_unknown_refs() {
        let graph = InMemoryGraph::new();
        let desc = graph
            .describe(&DescribeRequest::single(ObjectRef::from_bytes(b"missing")))
            .unwrap();
        assert!(desc.is_empty());
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    #[test]
    fn search_finds_current_holders_only() {
        let graph = InMemoryGraph::new();
        let a = graph.new_permanode("a");
        let b = graph.new_permanode("b");
        graph.set_attr(&a, CAMLI_ROOT, "photos", t(1)).unwrap();
        graph.set_attr(&b, CAMLI_ROOT, "music", t(1)).unwrap();
        graph.del_attr(&b, CAMLI_ROOT, "", t(2)).unwrap();

        let hits = graph.permanodes_with_attr(CAMLI_ROOT, 100).unwrap();
        assert_eq!(hits, vec![WithAttrHit { permanode: a }]);
    }

    #[test]
    fn search_respects_limit_newest_first() {
        let graph = InMemoryGraph::new();
        let old = graph.new_permanode("old");
        let new = graph.new_permanode("new");
        graph.set_attr(&old, CAMLI_SYMLINK_TARGET, "/x", t(1)).unwrap();
        graph.set_attr(&new, CAMLI_SYMLINK_TARGET, "/y", t(2)).unwrap();

        let hits = graph.permanodes_with_attr(CAMLI_SYMLINK_TARGET, 1).unwrap();
        assert_eq!(hits, vec![WithAttrHit { permanode: new }]);
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    #[test]
    fn open_content_reads_file_bytes() {
        let graph = InMemoryGraph::new();
        let blob = graph.add_file("payload", None);
        let mut reader = graph.open_content(&blob).unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "payload");
    }

    #[test]
    fn open_content_rejects_permanodes() {
        let graph = InMemoryGraph::new();
        let pn = graph.new_permanode("p");
        let err = graph.open_content(&pn).err().unwrap();
        assert!(matches!(err, GraphError::WrongKind { .. }));
    }

    // -----------------------------------------------------------------------
    // Counting and faults
    // -----------------------------------------------------------------------

    #[test]
    fn calls_are_counted() {
        let graph = InMemoryGraph::new();
        let pn = graph.new_permanode("p");
        graph.describe(&DescribeRequest::single(pn)).unwrap();
        graph.claims(&pn, CAMLI_CONTENT).unwrap();
        graph.permanodes_with_attr(CAMLI_ROOT, 10).unwrap();
        graph.permanodes_with_attr(CAMLI_ROOT, 10).unwrap();

        let counts = graph.call_counts();
        assert_eq!(
            counts,
            CallCounts {
                describe: 1,
                claims: 1,
                search: 2,
                content: 0
            }
        );
        graph.reset_counts();
        assert_eq!(graph.call_counts(), CallCounts::default());
    }

    #[test]
    fn injected_faults_fail_until_cleared() {
        let graph = InMemoryGraph::new();
        let pn = graph.new_permanode("p");
        graph.inject_fault(Fault::Describe { blob: pn });

        let err = graph.describe(&DescribeRequest::single(pn)).unwrap_err();
        assert!(matches!(err, GraphError::Transport(_)));
        // Unrelated roots are unaffected.
        let other = graph.new_permanode("q");
        assert!(graph.describe(&DescribeRequest::single(other)).is_ok());

        graph.clear_faults();
        assert!(graph.describe(&DescribeRequest::single(pn)).is_ok());
    }

    #[test]
    fn concurrent_queries_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let graph = Arc::new(InMemoryGraph::new());
        let pn = graph.new_permanode("shared");
        graph.set_attr(&pn, CAMLI_ROOT, "shared", t(1)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let graph = Arc::clone(&graph);
                thread::spawn(move || {
                    let hits = graph.permanodes_with_attr(CAMLI_ROOT, 10).unwrap();
                    assert_eq!(hits.len(), 1);
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(graph.call_counts().search, 8);
    }

    #[test]
    fn debug_format() {
        let graph = InMemoryGraph::new();
        graph.new_permanode("p");
        let debug = format!("{graph:?}");
        assert!(debug.contains("InMemoryGraph"));
        assert!(debug.contains("permanode_count"));
    }
}

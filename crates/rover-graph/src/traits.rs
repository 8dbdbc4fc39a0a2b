use std::io::{Read, Seek};

use rover_types::{Claim, DescribeRequest, Description, ObjectRef, WithAttrHit};

use crate::error::GraphResult;

/// Query surface of the permanode/claim graph.
///
/// Implementations must be safe to call from many threads at once: the
/// filesystem layer issues queries from concurrently dispatched operations
/// and from parallel fan-outs. Every call may block on the network.
pub trait GraphQueryClient: Send + Sync {
    /// Batch-resolve `req.refs` and what they reference, down to `req.depth`
    /// levels, with permanode state replayed up to `req.at`.
    ///
    /// Refs that cannot be resolved are absent from the result rather than
    /// being an error.
    fn describe(&self, req: &DescribeRequest) -> GraphResult<Description>;

    /// Every claim against `permanode` on attribute `attr`, oldest first.
    fn claims(&self, permanode: &ObjectRef, attr: &str) -> GraphResult<Vec<Claim>>;

    /// Up to `limit` permanodes whose current state carries `attr`.
    fn permanodes_with_attr(&self, attr: &str, limit: usize) -> GraphResult<Vec<WithAttrHit>>;
}

/// Sequential reader over a file's assembled bytes.
pub trait ContentReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> ContentReader for T {}

/// Opens readers over file content.
pub trait ContentFetcher: Send + Sync {
    /// Open a reader bound to the file blob `content`.
    fn open_content(&self, content: &ObjectRef) -> GraphResult<Box<dyn ContentReader>>;
}

//! Request and response shapes of the graph's describe and search queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attrs::PermanodeAttrs;
use crate::object::ObjectRef;
use crate::temporal::ClaimTime;

/// Coarse type of a described blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobKind {
    Permanode,
    File,
}

/// File metadata of a described `file` blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Attribute state of a described permanode at the query's as-of time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedPermanode {
    pub attrs: PermanodeAttrs,
    /// Date of the last claim applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<ClaimTime>,
}

/// Snapshot of one blob's metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedBlob {
    pub blob_ref: ObjectRef,
    pub kind: BlobKind,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanode: Option<DescribedPermanode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
}

impl DescribedBlob {
    pub fn is_file(&self) -> bool {
        self.kind == BlobKind::File && self.file.is_some()
    }
}

/// A batch describe query: resolve `refs` and what they reference, down to
/// `depth` levels, with permanode state replayed up to `at` (now if `None`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeRequest {
    pub refs: Vec<ObjectRef>,
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<ClaimTime>,
}

impl DescribeRequest {
    /// Describe `refs` at depth 1, as of now.
    pub fn new(refs: Vec<ObjectRef>) -> Self {
        Self {
            refs,
            depth: 1,
            at: None,
        }
    }

    /// Describe a single ref.
    pub fn single(blob: ObjectRef) -> Self {
        Self::new(vec![blob])
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Pin permanode state to `at`.
    pub fn at(mut self, at: ClaimTime) -> Self {
        self.at = Some(at);
        self
    }
}

/// Result of a describe query: every blob that could be resolved, by ref.
///
/// Blobs that could not be resolved are simply absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub meta: BTreeMap<ObjectRef, DescribedBlob>,
}

impl Description {
    pub fn get(&self, blob: &ObjectRef) -> Option<&DescribedBlob> {
        self.meta.get(blob)
    }

    /// The described permanode state of `blob`, if it resolved to a permanode.
    pub fn permanode(&self, blob: &ObjectRef) -> Option<&DescribedPermanode> {
        self.get(blob).and_then(|b| b.permanode.as_ref())
    }

    pub fn insert(&mut self, blob: DescribedBlob) {
        self.meta.insert(blob.blob_ref, blob);
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }
}

/// One hit of an attribute-indexed permanode search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithAttrHit {
    pub permanode: ObjectRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_fields() {
        let r = ObjectRef::from_bytes(b"root");
        let at = ClaimTime::from_unix_millis(10).unwrap();
        let req = DescribeRequest::single(r).depth(3).at(at);
        assert_eq!(req.refs, vec![r]);
        assert_eq!(req.depth, 3);
        assert_eq!(req.at, Some(at));
    }

    #[test]
    fn description_lookup_by_ref() {
        let r = ObjectRef::from_bytes(b"pn");
        let mut desc = Description::default();
        desc.insert(DescribedBlob {
            blob_ref: r,
            kind: BlobKind::Permanode,
            size: 0,
            permanode: Some(DescribedPermanode::default()),
            file: None,
        });
        assert_eq!(desc.len(), 1);
        assert!(desc.permanode(&r).is_some());
        assert!(desc.permanode(&ObjectRef::from_bytes(b"other")).is_none());
    }

    #[test]
    fn file_blob_detection() {
        let blob = DescribedBlob {
            blob_ref: ObjectRef::from_bytes(b"f"),
            kind: BlobKind::File,
            size: 4,
            permanode: None,
            file: Some(FileInfo {
                size: 4,
                file_name: None,
                mime_type: None,
            }),
        };
        assert!(blob.is_file());
    }
}

use rover_types::{ClaimKind, ClaimTime, ObjectRef};
use serde_json::json;

/// Domain-separated BLAKE3 hasher for graph blobs.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a permanode, a claim and a file with identical bytes get
/// different refs.
pub struct BlobHasher {
    domain: &'static str,
}

impl BlobHasher {
    pub const PERMANODE: Self = Self {
        domain: "rover-permanode-v1",
    };
    pub const CLAIM: Self = Self {
        domain: "rover-claim-v1",
    };
    pub const FILE: Self = Self {
        domain: "rover-file-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectRef {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectRef::from_hash(*hasher.finalize().as_bytes())
    }
}

/// Ref of a claim blob, computed from its signed fields.
pub fn claim_ref(
    permanode: &ObjectRef,
    kind: ClaimKind,
    attr: &str,
    value: &str,
    date: &ClaimTime,
) -> ObjectRef {
    let body = json!({
        "permaNode": permanode.to_string(),
        "claimType": kind,
        "attribute": attr,
        "value": value,
        "claimDate": date.render(),
    });
    BlobHasher::CLAIM.hash(body.to_string().as_bytes())
}

/// A file blob held by the in-memory graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

impl StoredFile {
    pub fn new(data: Vec<u8>, file_name: Option<String>) -> Self {
        Self { data, file_name }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn compute_ref(&self) -> ObjectRef {
        BlobHasher::FILE.hash(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_separate_identical_bytes() {
        let a = BlobHasher::PERMANODE.hash(b"same");
        let b = BlobHasher::FILE.hash(b"same");
        assert_ne!(a, b);
    }

    #[test]
    fn claim_ref_covers_every_field() {
        let pn = ObjectRef::from_bytes(b"pn");
        let t = ClaimTime::from_unix_millis(1).unwrap();
        let base = claim_ref(&pn, ClaimKind::SetAttribute, "a", "v", &t);
        assert_eq!(base, claim_ref(&pn, ClaimKind::SetAttribute, "a", "v", &t));
        assert_ne!(base, claim_ref(&pn, ClaimKind::AddAttribute, "a", "v", &t));
        assert_ne!(base, claim_ref(&pn, ClaimKind::SetAttribute, "b", "v", &t));
        let later = ClaimTime::from_unix_millis(2).unwrap();
        assert_ne!(base, claim_ref(&pn, ClaimKind::SetAttribute, "a", "v", &later));
    }

    #[test]
    fn file_ref_is_content_addressed() {
        let a = StoredFile::new(b"bytes".to_vec(), Some("a.txt".into()));
        let b = StoredFile::new(b"bytes".to_vec(), None);
        assert_eq!(a.compute_ref(), b.compute_ref());
        assert_eq!(a.size(), 5);
    }
}

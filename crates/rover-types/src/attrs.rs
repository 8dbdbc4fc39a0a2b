//! Replayed attribute state of a permanode.
//!
//! A permanode has no content of its own: its attributes are whatever the
//! claims against it say, replayed in timestamp order up to some query time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claim::{Claim, ClaimKind};

/// Marks a permanode as a named top-level root.
pub const CAMLI_ROOT: &str = "camliRoot";
/// Marks a permanode as the root of an importer's tree.
pub const CAMLI_IMPORT_ROOT: &str = "camliImportRoot";
/// Prefix of directory-entry attributes: `camliPath:<name>` → child permanode.
pub const CAMLI_PATH_PREFIX: &str = "camliPath:";
/// Points a file permanode at its current content blob.
pub const CAMLI_CONTENT: &str = "camliContent";
/// Marks a permanode as a symlink to the given target.
pub const CAMLI_SYMLINK_TARGET: &str = "camliSymlinkTarget";
/// Explicit node type, e.g. `directory`.
pub const CAMLI_NODE_TYPE: &str = "camliNodeType";
/// Prefix of extended-attribute attributes: `xattr:<name>` → base64 value.
pub const XATTR_PREFIX: &str = "xattr:";

/// Attribute name → ordered set of string values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermanodeAttrs(BTreeMap<String, Vec<String>>);

impl PermanodeAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `claims` in order onto an empty attribute set.
    pub fn replay<'a>(claims: impl IntoIterator<Item = &'a Claim>) -> Self {
        let mut attrs = Self::new();
        for claim in claims {
            attrs.apply(claim);
        }
        attrs
    }

    /// Apply one claim.
    pub fn apply(&mut self, claim: &Claim) {
        match claim.kind {
            ClaimKind::SetAttribute => {
                self.0.insert(claim.attr.clone(), vec![claim.value.clone()]);
            }
            ClaimKind::AddAttribute => {
                let values = self.0.entry(claim.attr.clone()).or_default();
                if !values.contains(&claim.value) {
                    values.push(claim.value.clone());
                }
            }
            ClaimKind::DelAttribute => {
                if claim.value.is_empty() {
                    self.0.remove(&claim.attr);
                } else if let Some(values) = self.0.get_mut(&claim.attr) {
                    values.retain(|v| v != &claim.value);
                    if values.is_empty() {
                        self.0.remove(&claim.attr);
                    }
                }
            }
        }
    }

    /// First value of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `name`, in insertion order.
    pub fn values(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `(entry name, first value)` for every `camliPath:` attribute, in name order.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter_map(|(k, v)| {
            let name = k.strip_prefix(CAMLI_PATH_PREFIX)?;
            let target = v.first()?;
            Some((name, target.as_str()))
        })
    }

    /// Directory-shaped: explicitly typed `directory`, or carrying any `camliPath:` entry.
    pub fn is_dir(&self) -> bool {
        self.get(CAMLI_NODE_TYPE) == Some("directory")
            || self.0.keys().any(|k| k.starts_with(CAMLI_PATH_PREFIX))
    }
}

impl FromIterator<(String, Vec<String>)> for PermanodeAttrs {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

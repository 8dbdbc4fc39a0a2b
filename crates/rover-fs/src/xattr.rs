//! Read-only extended attributes sourced from permanode attributes.
//!
//! A permanode attribute `xattr:<name>` whose first value is standard base64
//! surfaces as the extended attribute `<name>`. Every node owns one
//! accessor; the set is loaded once, either primed by the parent from a
//! describe it already holds or fetched on first access.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::Mutex;
use rover_types::attrs::XATTR_PREFIX;
use rover_types::{ClaimTime, DescribeRequest, ObjectRef, PermanodeAttrs};
use tracing::warn;

use crate::context::FsContext;
use crate::error::{FsError, FsResult};

type XattrMap = BTreeMap<String, Vec<u8>>;

#[derive(Clone, Copy, Debug)]
struct XattrSource {
    permanode: ObjectRef,
    at: Option<ClaimTime>,
}

/// Lazily-loaded, read-only extended attribute set of one node.
#[derive(Debug)]
pub struct XattrAccessor {
    source: Option<XattrSource>,
    values: Mutex<Option<Arc<XattrMap>>>,
}

impl XattrAccessor {
    /// Attributes of `permanode` as it stands now.
    pub fn new(permanode: ObjectRef) -> Self {
        Self::with_source(Some(XattrSource {
            permanode,
            at: None,
        }))
    }

    /// Attributes of `permanode` as it stood at `at`.
    pub fn as_of(permanode: ObjectRef, at: ClaimTime) -> Self {
        Self::with_source(Some(XattrSource {
            permanode,
            at: Some(at),
        }))
    }

    /// An accessor with no backing permanode. Always empty.
    pub fn detached() -> Self {
        Self::with_source(None)
    }

    fn with_source(source: Option<XattrSource>) -> Self {
        Self {
            source,
            values: Mutex::new(None),
        }
    }

    /// Seed the set from already-described attributes. No-op once loaded.
    pub fn prime(&self, attrs: &PermanodeAttrs) {
        let mut values = self.values.lock();
        if values.is_none() {
            *values = Some(Arc::new(decode_xattrs(attrs)));
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.values.lock().is_some()
    }

    pub fn get(&self, ctx: &FsContext, name: &str) -> FsResult<Vec<u8>> {
        self.load(ctx)?
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NoAttribute(name.to_string()))
    }

    /// Attribute names in sorted order.
    pub fn list(&self, ctx: &FsContext) -> FsResult<Vec<String>> {
        Ok(self.load(ctx)?.keys().cloned().collect())
    }

    pub fn set(&self, _name: &str, _value: &[u8]) -> FsResult<()> {
        Err(FsError::PermissionDenied)
    }

    pub fn remove(&self, _name: &str) -> FsResult<()> {
        Err(FsError::PermissionDenied)
    }

    fn load(&self, ctx: &FsContext) -> FsResult<Arc<XattrMap>> {
        let mut values = self.values.lock();
        if let Some(loaded) = values.as_ref() {
            return Ok(Arc::clone(loaded));
        }
        let loaded = match self.source {
            None => XattrMap::new(),
            Some(source) => {
                let mut req = DescribeRequest::single(source.permanode);
                if let Some(at) = source.at {
                    req = req.at(at);
                }
                let desc = ctx.graph.describe(&req).map_err(|e| {
                    FsError::Io(format!("describing {}: {e}", source.permanode.short_hex()))
                })?;
                desc.permanode(&source.permanode)
                    .map(|p| decode_xattrs(&p.attrs))
                    .unwrap_or_default()
            }
        };
        let loaded = Arc::new(loaded);
        *values = Some(Arc::clone(&loaded));
        Ok(loaded)
    }
}

/// Decode every `xattr:` attribute. Values that are not valid base64 are
/// dropped.
pub fn decode_xattrs(attrs: &PermanodeAttrs) -> BTreeMap<String, Vec<u8>> {
    attrs
        .iter()
        .filter_map(|(key, values)| {
            let name = key.strip_prefix(XATTR_PREFIX)?;
            let encoded = values.first()?;
            match STANDARD.decode(encoded) {
                Ok(bytes) => Some((name.to_string(), bytes)),
                Err(e) => {
                    warn!(xattr = name, error = %e, "skipping undecodable extended attribute");
                    None
                }
            }
        })
        .collect()
}

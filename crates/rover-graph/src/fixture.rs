//! JSON graph fixtures for [`InMemoryGraph`].
//!
//! A fixture names its files and permanodes; claim values of the form
//! `@name` are replaced by the ref of the named blob, so fixtures can wire up
//! directory trees without spelling out hashes.
//!
//! ```json
//! {
//!   "files": [{ "name": "v1", "contents": "hello" }],
//!   "permanodes": [
//!     { "name": "docs", "claims": [
//!         { "attr": "camliRoot", "value": "docs", "date": "2020-01-01T00:00:00Z" },
//!         { "attr": "camliPath:readme", "value": "@readme", "date": "2020-01-01T00:00:00Z" } ] },
//!     { "name": "readme", "claims": [
//!         { "attr": "camliContent", "value": "@v1", "date": "2020-01-01T00:00:00Z" } ] }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use rover_types::{ClaimKind, ClaimTime, ObjectRef};
use serde::Deserialize;

use crate::error::{GraphError, GraphResult};
use crate::memory::InMemoryGraph;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GraphFixture {
    #[serde(default)]
    pub files: Vec<FileFixture>,
    #[serde(default)]
    pub permanodes: Vec<PermanodeFixture>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileFixture {
    pub name: String,
    pub contents: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PermanodeFixture {
    pub name: String,
    #[serde(default)]
    pub claims: Vec<ClaimFixture>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimFixture {
    #[serde(default = "default_kind")]
    pub kind: ClaimKind,
    pub attr: String,
    #[serde(default)]
    pub value: String,
    pub date: ClaimTime,
}

fn default_kind() -> ClaimKind {
    ClaimKind::SetAttribute
}

impl GraphFixture {
    pub fn from_json(json: &str) -> GraphResult<Self> {
        serde_json::from_str(json).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    pub fn from_path(path: &Path) -> GraphResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Materialize the fixture into a fresh graph.
    pub fn build(&self) -> GraphResult<InMemoryGraph> {
        let graph = InMemoryGraph::new();
        let mut names: HashMap<&str, ObjectRef> = HashMap::new();

        for file in &self.files {
            let blob = graph.add_file(file.contents.as_bytes(), file.file_name.as_deref());
            if names.insert(&file.name, blob).is_some() {
                return Err(GraphError::Fixture(format!("duplicate name {:?}", file.name)));
            }
        }
        for permanode in &self.permanodes {
            let blob = graph.new_permanode(&permanode.name);
            if names.insert(&permanode.name, blob).is_some() {
                return Err(GraphError::Fixture(format!(
                    "duplicate name {:?}",
                    permanode.name
                )));
            }
        }

        for permanode in &self.permanodes {
            let blob = names[permanode.name.as_str()];
            for claim in &permanode.claims {
                let value = match claim.value.strip_prefix('@') {
                    Some(name) => names
                        .get(name)
                        .map(ObjectRef::to_string)
                        .ok_or_else(|| GraphError::Fixture(format!("unknown blob @{name}")))?,
                    None => claim.value.clone(),
                };
                graph.add_claim(&blob, claim.kind, &claim.attr, &value, claim.date)?;
            }
        }
        Ok(graph)
    }
}

use std::sync::Arc;

use crate::config::FsConfig;
use crate::context::FsContext;
use crate::error::FsResult;
use crate::node::Node;
use crate::roots::RootsDir;

/// A complete namespace: shared collaborators plus the root directory.
#[derive(Clone, Debug)]
pub struct Namespace {
    ctx: Arc<FsContext>,
    roots: Arc<RootsDir>,
}

impl Namespace {
    pub fn new(ctx: FsContext) -> Self {
        let ctx = Arc::new(ctx);
        let roots = RootsDir::new(Arc::clone(&ctx));
        Self { ctx, roots }
    }

    pub fn context(&self) -> &FsContext {
        &self.ctx
    }

    pub fn config(&self) -> &FsConfig {
        &self.ctx.config
    }

    pub fn root(&self) -> Node {
        Node::Roots(Arc::clone(&self.roots))
    }

    /// Walk a `/`-separated path from the root through `lookup`.
    ///
    /// Empty components and `.` are ignored; `..` moves to the parent.
    pub fn resolve(&self, path: &str) -> FsResult<Node> {
        let mut node = self.root();
        for component in path.split('/') {
            node = match component {
                "" | "." => node,
                ".." => node.parent().unwrap_or_else(|| self.root()),
                name => node.lookup(name)?,
            };
        }
        Ok(node)
    }
}

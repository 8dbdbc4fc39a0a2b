use std::sync::Arc;

use rover_graph::{ContentFetcher, GraphQueryClient};

use crate::config::FsConfig;
use crate::events::{FsEvent, FsEvents, TracingEvents};

/// Collaborators and settings shared by every node of one namespace.
#[derive(Clone)]
pub struct FsContext {
    pub graph: Arc<dyn GraphQueryClient>,
    pub content: Arc<dyn ContentFetcher>,
    pub events: Arc<dyn FsEvents>,
    pub config: FsConfig,
}

impl FsContext {
    /// Context over separate query and content collaborators, logging
    /// through `tracing`.
    pub fn new(
        graph: Arc<dyn GraphQueryClient>,
        content: Arc<dyn ContentFetcher>,
        config: FsConfig,
    ) -> Self {
        Self {
            graph,
            content,
            events: Arc::new(TracingEvents),
            config,
        }
    }

    /// Context over one backend that answers both queries and content reads.
    pub fn from_backend<B>(backend: Arc<B>, config: FsConfig) -> Self
    where
        B: GraphQueryClient + ContentFetcher + 'static,
    {
        Self::new(backend.clone(), backend, config)
    }

    pub fn with_events(mut self, events: Arc<dyn FsEvents>) -> Self {
        self.events = events;
        self
    }

    pub(crate) fn emit(&self, event: FsEvent) {
        self.events.emit(&event);
    }
}

impl std::fmt::Debug for FsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::node::{NodeError, NodeHandler, NodeRequest, NodeResponse};

/// Routes each request to the handler registered for its `node.kind`.
///
/// The registry is itself a [`NodeHandler`], so a single adapter can serve
/// every custom node kind of a graph.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, returning whatever was registered before.
    pub fn register<H>(&self, kind: impl Into<String>, handler: H) -> Option<Arc<dyn NodeHandler>>
    where
        H: NodeHandler + 'static,
    {
        let kind = kind.into();
        info!(kind = %kind, "registered custom node handler");
        self.handlers.insert(kind, Arc::new(handler))
    }

    pub fn with<H>(self, kind: impl Into<String>, handler: H) -> Self
    where
        H: NodeHandler + 'static,
    {
        self.register(kind, handler);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(kind).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, kind: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.remove(kind).map(|(_, handler)| handler)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.iter().map(|entry| entry.key().clone()).collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl NodeHandler for HandlerRegistry {
    fn handle(&self, request: NodeRequest) -> Result<NodeResponse, NodeError> {
        // clone out of the map so no shard lock is held while the handler runs
        let handler = self
            .get(&request.node.kind)
            .ok_or_else(|| NodeError::UnknownKind(request.node.kind.clone()))?;
        debug!(kind = %request.node.kind, "dispatching custom node");
        handler.handle(request)
    }
}

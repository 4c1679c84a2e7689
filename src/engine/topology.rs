// Fri Oct 16 2026 - Alex

use crate::engine::error::TopologyError;
use crate::engine::executor::{Executor, JobHandler};
use crate::engine::stage::{Stage, StageBuilder};
use bitflags::bitflags;
use indexmap::IndexMap;
use log::{debug, trace};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(u64);

impl StageId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage#{}", self.0)
    }
}

bitflags! {
    /// Which side of a link to start after `connect` or stop after `disconnect`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LinkAction: u8 {
        const PREVIOUS = 0b01;
        const NEXT = 0b10;
        const BOTH = Self::PREVIOUS.bits() | Self::NEXT.bits();
    }
}

impl LinkAction {
    pub const NONE: Self = Self::empty();
}

impl Default for LinkAction {
    fn default() -> Self {
        Self::NONE
    }
}

pub(crate) struct Node<T> {
    pub core: Arc<Executor<T>>,
    pub predecessor: Option<StageId>,
    pub successor: Option<StageId>,
}

/// Arena of live stages and their links. Every link change happens under
/// the single write lock so both ends of a pair change together.
pub(crate) struct Registry<T> {
    nodes: RwLock<IndexMap<StageId, Node<T>>>,
}

impl<T: Send + 'static> Registry<T> {
    fn new() -> Self {
        Self {
            nodes: RwLock::new(IndexMap::new()),
        }
    }

    pub fn insert(&self, id: StageId, core: Arc<Executor<T>>) {
        self.nodes.write().insert(
            id,
            Node {
                core,
                predecessor: None,
                successor: None,
            },
        );
    }

    pub fn connect(
        &self,
        previous: StageId,
        next: StageId,
        action: LinkAction,
    ) -> Result<(), TopologyError> {
        if previous == next {
            return Err(TopologyError::SelfLink(previous));
        }

        let (previous_core, next_core) = {
            let mut nodes = self.nodes.write();
            let previous_core = nodes
                .get(&previous)
                .map(|n| n.core.clone())
                .ok_or(TopologyError::StageNotFound(previous))?;
            let next_core = nodes
                .get(&next)
                .map(|n| n.core.clone())
                .ok_or(TopologyError::StageNotFound(next))?;

            let old_successor = nodes.get_mut(&previous).and_then(|n| n.successor.take());
            if let Some(old) = old_successor {
                if let Some(node) = nodes.get_mut(&old) {
                    node.predecessor = None;
                }
                debug!("{} unlinked from {}", previous, old);
            }

            let old_predecessor = nodes.get_mut(&next).and_then(|n| n.predecessor.take());
            if let Some(old) = old_predecessor {
                if let Some(node) = nodes.get_mut(&old) {
                    node.successor = None;
                }
                debug!("{} unlinked from {}", old, next);
            }

            if let Some(node) = nodes.get_mut(&previous) {
                node.successor = Some(next);
            }
            if let Some(node) = nodes.get_mut(&next) {
                node.predecessor = Some(previous);
            }

            (previous_core, next_core)
        };

        debug!("{} linked to {}", previous, next);

        if action.contains(LinkAction::PREVIOUS) {
            previous_core.start();
        }
        if action.contains(LinkAction::NEXT) {
            next_core.start();
        }

        Ok(())
    }

    pub fn disconnect(
        &self,
        previous: StageId,
        next: StageId,
        action: LinkAction,
    ) -> Result<(), TopologyError> {
        let (previous_core, next_core) = {
            let mut nodes = self.nodes.write();
            let (previous_core, successor) = nodes
                .get(&previous)
                .map(|n| (n.core.clone(), n.successor))
                .ok_or(TopologyError::StageNotFound(previous))?;
            let (next_core, predecessor) = nodes
                .get(&next)
                .map(|n| (n.core.clone(), n.predecessor))
                .ok_or(TopologyError::StageNotFound(next))?;

            if successor != Some(next) || predecessor != Some(previous) {
                return Err(TopologyError::NotLinked { previous, next });
            }

            if let Some(node) = nodes.get_mut(&previous) {
                node.successor = None;
            }
            if let Some(node) = nodes.get_mut(&next) {
                node.predecessor = None;
            }

            (previous_core, next_core)
        };

        debug!("{} disconnected from {}", previous, next);

        if action.contains(LinkAction::PREVIOUS) {
            previous_core.stop();
        }
        if action.contains(LinkAction::NEXT) {
            next_core.stop();
        }

        Ok(())
    }

    /// Hands a finished job to the current successor of `from`, if any.
    pub fn forward(&self, from: StageId, job: T) {
        let successor = {
            let nodes = self.nodes.read();
            nodes
                .get(&from)
                .and_then(|n| n.successor)
                .and_then(|id| nodes.get(&id))
                .map(|n| n.core.clone())
        };

        match successor {
            Some(core) => {
                core.add(job);
            }
            None => trace!("{} has no successor", from),
        }
    }

    /// Drops `id` from the arena and clears the links its neighbours hold to it.
    pub fn remove(&self, id: StageId) {
        let mut nodes = self.nodes.write();
        let node = match nodes.shift_remove(&id) {
            Some(node) => node,
            None => return,
        };

        if let Some(previous) = node.predecessor {
            if let Some(neighbour) = nodes.get_mut(&previous) {
                if neighbour.successor == Some(id) {
                    neighbour.successor = None;
                }
            }
        }

        if let Some(next) = node.successor {
            if let Some(neighbour) = nodes.get_mut(&next) {
                if neighbour.predecessor == Some(id) {
                    neighbour.predecessor = None;
                }
            }
        }
    }

    pub fn predecessor_of(&self, id: StageId) -> Option<StageId> {
        self.nodes.read().get(&id).and_then(|n| n.predecessor)
    }

    pub fn successor_of(&self, id: StageId) -> Option<StageId> {
        self.nodes.read().get(&id).and_then(|n| n.successor)
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    fn len(&self) -> usize {
        self.nodes.read().len()
    }

    fn ids(&self) -> Vec<StageId> {
        self.nodes.read().keys().copied().collect()
    }

    fn chain_from(&self, head: StageId) -> Vec<StageId> {
        let nodes = self.nodes.read();
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = nodes.get(&head).map(|_| head);

        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            chain.push(id);
            current = nodes.get(&id).and_then(|n| n.successor);
        }

        chain
    }
}

/// Owner of a set of stages that may be linked to each other.
///
/// Stages are created through the topology and refer to each other only by
/// [`StageId`]; the topology keeps the predecessor/successor table.
pub struct Topology<T: Send + 'static> {
    registry: Arc<Registry<T>>,
    thread_name_prefix: String,
}

impl<T: Send + 'static> Topology<T> {
    pub fn new() -> Self {
        Self::with_thread_name_prefix(crate::config::DEFAULT_THREAD_PREFIX)
    }

    pub fn with_thread_name_prefix(prefix: &str) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            thread_name_prefix: prefix.to_string(),
        }
    }

    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self::with_thread_name_prefix(&config.thread_name_prefix)
    }

    pub fn stage<H: JobHandler<T>>(&self, name: &str, handler: H) -> Stage<T> {
        self.stage_builder(name).build(handler)
    }

    pub fn stage_builder(&self, name: &str) -> StageBuilder<'_, T> {
        StageBuilder::new(self, name)
    }

    pub fn connect(
        &self,
        previous: StageId,
        next: StageId,
        action: LinkAction,
    ) -> Result<(), TopologyError> {
        self.registry.connect(previous, next, action)
    }

    pub fn disconnect(
        &self,
        previous: StageId,
        next: StageId,
        action: LinkAction,
    ) -> Result<(), TopologyError> {
        self.registry.disconnect(previous, next, action)
    }

    pub fn predecessor_of(&self, id: StageId) -> Option<StageId> {
        self.registry.predecessor_of(id)
    }

    pub fn successor_of(&self, id: StageId) -> Option<StageId> {
        self.registry.successor_of(id)
    }

    /// `false` once the stage has been disposed.
    pub fn contains(&self, id: StageId) -> bool {
        self.registry.contains(id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live stages in creation order.
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.registry.ids()
    }

    /// Follows successor links starting at `head`. Stops at the first
    /// repeated stage, so a cyclic topology yields each stage once.
    pub fn chain_from(&self, head: StageId) -> Vec<StageId> {
        self.registry.chain_from(head)
    }

    pub(crate) fn registry(&self) -> &Arc<Registry<T>> {
        &self.registry
    }

    pub(crate) fn thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }
}

impl<T: Send + 'static> Clone for Topology<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}

impl<T: Send + 'static> Default for Topology<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Source and Element Tracking
//!
//! Operators with a per-element lambda (`Select`, the group folds) keep one
//! element node alive per source element. This module holds the shared
//! machinery:
//!
//! - Source tracking turns a source's structural notification into a
//!   [`SourceEvent`], taking a snapshot on reset.
//! - Element tracking applies that event to the owner's ordered table of
//!   element nodes, creating and disposing them, and reports what the owner
//!   must republish as [`Membership`] events.
//!
//! Element identity is positional. Two equal source items get two element
//! nodes.

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::lambda::Lambda;
use crate::graph::{Change, Graph, Node, NodeId, NodeState, Notification};
use crate::value::Value;

/// State of an element node.
pub(crate) struct ElementState {
    /// The source element this node was built for.
    pub(crate) element: Value,
    pub(crate) lambda: Lambda,
    /// Resolved lambda inputs, in lambda order.
    pub(crate) inputs: SmallVec<[NodeId; 2]>,
}

/// The ordered element nodes of a tracking operator.
pub(crate) struct ElementTable {
    pub(crate) source: NodeId,
    pub(crate) lambda: Lambda,
    pub(crate) inputs: SmallVec<[NodeId; 2]>,
    pub(crate) elements: Vec<NodeId>,
}

impl ElementTable {
    pub(crate) fn new(source: NodeId, lambda: Lambda, inputs: SmallVec<[NodeId; 2]>) -> Self {
        Self {
            source,
            lambda,
            inputs,
            elements: Vec::new(),
        }
    }

    fn position(&self, element: NodeId) -> Option<usize> {
        self.elements.iter().position(|id| *id == element)
    }
}

/// A source notification, resolved against the source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SourceEvent {
    /// The source changed wholesale; carries its new content.
    Reset(Vec<Value>),
    Inserted {
        index: Option<usize>,
        items: Vec<Value>,
    },
    Removed {
        index: Option<usize>,
        items: Vec<Value>,
    },
    Replaced {
        index: Option<usize>,
        old: Vec<Value>,
        new: Vec<Value>,
    },
}

/// A change to a tracking operator's element values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Membership {
    /// Every element node was rebuilt.
    Reset,
    /// New element nodes at `index`, with their current values.
    Added { index: usize, values: Vec<Value> },
    /// Element nodes removed from `index`, with their last values.
    Removed { index: usize, values: Vec<Value> },
    /// One element node's value changed.
    Replaced { index: usize, old: Value, new: Value },
}

impl Graph {
    /// Resolve a notification from `source` into a [`SourceEvent`].
    pub(crate) fn observe_source(&self, source: NodeId, change: &Change) -> SourceEvent {
        match change {
            Change::Reset => SourceEvent::Reset(self.snapshot(source)),
            Change::Add { index, items } => SourceEvent::Inserted {
                index: *index,
                items: items.clone(),
            },
            Change::Remove { index, items } => SourceEvent::Removed {
                index: *index,
                items: items.clone(),
            },
            Change::Replace { index, old, new } => SourceEvent::Replaced {
                index: *index,
                old: old.clone(),
                new: new.clone(),
            },
        }
    }

    /// Turn a notification received by a tracking operator into membership
    /// changes, updating its element table on the way.
    ///
    /// `from` is either the operator's source or one of its element nodes.
    pub(crate) fn element_memberships(
        &mut self,
        owner: NodeId,
        from: NodeId,
        notification: &Notification,
    ) -> Vec<Membership> {
        let source = self.table(owner).source;
        match notification {
            Notification::CollectionChanged(change) if from == source => {
                let event = self.observe_source(source, change);
                self.track_elements(owner, event)
            }
            Notification::ValueChanged { old, new } if from != source => {
                let index = self.table(owner).position(from);
                match index {
                    Some(index) => vec![Membership::Replaced {
                        index,
                        old: old.clone(),
                        new: new.clone(),
                    }],
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    /// Apply a source event to `owner`'s element table.
    pub(crate) fn track_elements(&mut self, owner: NodeId, event: SourceEvent) -> Vec<Membership> {
        match event {
            SourceEvent::Inserted { index, items } => {
                let len = self.table(owner).elements.len();
                let at = index.unwrap_or(len);
                assert!(at <= len, "source inserted at {at} past tracked length {len}");
                self.insert_elements(owner, at, items).into_iter().collect()
            }
            SourceEvent::Removed {
                index: Some(at),
                items,
            } => self.remove_elements(owner, at, items.len()).into_iter().collect(),
            SourceEvent::Removed { index: None, items } => items
                .iter()
                .filter_map(|item| self.remove_element_by_value(owner, item))
                .collect(),
            SourceEvent::Replaced {
                index: Some(at),
                old,
                new,
            } if old.len() == new.len() => {
                let ids = self.table(owner).elements[at..at + new.len()].to_vec();
                // Rebound elements publish their own value changes, which
                // come back to the owner as single-element replacements.
                for (id, item) in ids.into_iter().zip(new) {
                    self.recompute_element(id, Some(item));
                }
                Vec::new()
            }
            SourceEvent::Replaced { index, old, new } => {
                let mut memberships =
                    self.track_elements(owner, SourceEvent::Removed { index, items: old });
                memberships.extend(self.track_elements(owner, SourceEvent::Inserted { index, items: new }));
                memberships
            }
            SourceEvent::Reset(snapshot) => {
                if self.elements_match(owner, &snapshot) {
                    debug!(owner = %owner, "source reset left elements unchanged");
                    Vec::new()
                } else {
                    self.rebuild_elements(owner, snapshot);
                    vec![Membership::Reset]
                }
            }
        }
    }

    /// Build the element table of a freshly allocated owner from its source.
    pub(crate) fn populate_elements(&mut self, owner: NodeId) {
        let source = self.table(owner).source;
        let snapshot = self.snapshot(source);
        let ids = self.spawn_elements(owner, snapshot);
        self.table_mut(owner).elements = ids;
    }

    /// Dispose every element node and rebuild from `snapshot`.
    pub(crate) fn rebuild_elements(&mut self, owner: NodeId, snapshot: Vec<Value>) {
        let old = std::mem::take(&mut self.table_mut(owner).elements);
        for id in old {
            self.dispose(id);
        }
        let ids = self.spawn_elements(owner, snapshot);
        self.table_mut(owner).elements = ids;
        self.node_mut(owner).stats.full_recomputes += 1;
        debug!(owner = %owner, "rebuilt element table");
    }

    /// Re-evaluate an element node, optionally rebinding it to a new element.
    pub(crate) fn recompute_element(&mut self, id: NodeId, rebind: Option<Value>) {
        let inputs = match &self.node(id).state {
            NodeState::Element(state) => state.inputs.clone(),
            _ => panic!("node {id} is not an element node"),
        };
        let args: SmallVec<[Value; 2]> = inputs.iter().map(|i| self.value(*i).clone()).collect();

        let value = {
            let NodeState::Element(state) = &mut self.node_mut(id).state else {
                unreachable!()
            };
            if let Some(element) = rebind {
                state.element = element;
            }
            state.lambda.eval(&state.element, &args)
        };
        self.publish(id, value);
    }

    fn insert_elements(&mut self, owner: NodeId, at: usize, items: Vec<Value>) -> Option<Membership> {
        if items.is_empty() {
            return None;
        }
        let ids = self.spawn_elements(owner, items);
        let values = ids.iter().map(|id| self.value(*id).clone()).collect();
        self.table_mut(owner).elements.splice(at..at, ids);
        self.node_mut(owner).stats.incremental_updates += 1;
        Some(Membership::Added { index: at, values })
    }

    fn remove_elements(&mut self, owner: NodeId, at: usize, count: usize) -> Option<Membership> {
        if count == 0 {
            return None;
        }
        let ids: Vec<NodeId> = self.table_mut(owner).elements.drain(at..at + count).collect();
        let values = ids.iter().map(|id| self.value(*id).clone()).collect();
        for id in ids {
            self.dispose(id);
        }
        self.node_mut(owner).stats.incremental_updates += 1;
        Some(Membership::Removed { index: at, values })
    }

    fn remove_element_by_value(&mut self, owner: NodeId, item: &Value) -> Option<Membership> {
        let position = self
            .table(owner)
            .elements
            .iter()
            .position(|id| self.element_state(*id).element == *item);
        match position {
            Some(at) => self.remove_elements(owner, at, 1),
            None => {
                warn!(owner = %owner, item = %item, "removal of an untracked element ignored");
                None
            }
        }
    }

    fn spawn_elements(&mut self, owner: NodeId, items: Vec<Value>) -> Vec<NodeId> {
        let (lambda, inputs) = {
            let table = self.table(owner);
            (table.lambda.clone(), table.inputs.clone())
        };
        items
            .into_iter()
            .map(|item| self.spawn_element(owner, item, &lambda, &inputs))
            .collect()
    }

    fn spawn_element(
        &mut self,
        owner: NodeId,
        element: Value,
        lambda: &Lambda,
        inputs: &SmallVec<[NodeId; 2]>,
    ) -> NodeId {
        let args: SmallVec<[Value; 2]> = inputs.iter().map(|i| self.value(*i).clone()).collect();
        let value = lambda.eval(&element, &args);

        let state = ElementState {
            element,
            lambda: lambda.clone(),
            inputs: inputs.clone(),
        };
        let output = lambda.output();
        let id = self.allocate(|id| Node::new(id, output, value, NodeState::Element(state)));

        for input in inputs {
            self.link(*input, id);
        }
        // The owner listens to its element without listing it as a shared
        // dependency; the element is disposed through the owner's table.
        self.node_mut(id).add_dependent(owner);
        id
    }

    fn elements_match(&self, owner: NodeId, snapshot: &[Value]) -> bool {
        let elements = &self.table(owner).elements;
        elements.len() == snapshot.len()
            && elements
                .iter()
                .zip(snapshot)
                .all(|(id, item)| self.element_state(*id).element == *item)
    }

    fn element_state(&self, id: NodeId) -> &ElementState {
        match &self.node(id).state {
            NodeState::Element(state) => state,
            _ => panic!("node {id} is not an element node"),
        }
    }

    pub(crate) fn table(&self, owner: NodeId) -> &ElementTable {
        match self.node(owner).state.table() {
            Some(table) => table,
            None => panic!("node {owner} does not track elements"),
        }
    }

    pub(crate) fn table_mut(&mut self, owner: NodeId) -> &mut ElementTable {
        match self.node_mut(owner).state.table_mut() {
            Some(table) => table,
            None => panic!("node {owner} does not track elements"),
        }
    }
}

//! Graph Nodes
//!
//! This module defines the node record stored in the graph arena and the
//! closed set of node kinds.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::subscriber::Listeners;
use crate::ops::distinct::DistinctState;
use crate::ops::group::GroupState;
use crate::ops::tracking::{ElementState, ElementTable};
use crate::value::{Value, ValueType};

/// Handle to a node in a [`Graph`](super::Graph).
///
/// IDs are allocated by the owning graph in increasing order and never
/// reused, so a handle to a disposed node stays recognisably dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A mutable scalar input.
    Variable,

    /// A mutable ordered sequence input.
    Source,

    /// A per-element sub-computation owned by a tracking operator.
    Element,

    /// A fold of per-element values into one scalar.
    Group,

    /// One projected value per source element.
    Select,

    /// The distinct values of a source.
    Distinct,
}

impl NodeKind {
    /// Whether nodes of this kind publish a collection.
    pub fn is_collection(self) -> bool {
        matches!(self, NodeKind::Source | NodeKind::Select | NodeKind::Distinct)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Variable => "variable",
            NodeKind::Source => "source",
            NodeKind::Element => "element",
            NodeKind::Group => "group",
            NodeKind::Select => "select",
            NodeKind::Distinct => "distinct",
        }
    }
}

/// Work counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Updates resolved from the delta alone.
    pub incremental_updates: u64,

    /// Updates that had to re-read every tracked input.
    pub full_recomputes: u64,

    /// Notifications raised by the node.
    pub notifications: u64,
}

/// Kind-specific state.
pub(crate) enum NodeState {
    Variable,
    Source(Vec<Value>),
    Element(ElementState),
    Group(GroupState),
    Select(ElementTable),
    Distinct(DistinctState),
}

impl NodeState {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            NodeState::Variable => NodeKind::Variable,
            NodeState::Source(_) => NodeKind::Source,
            NodeState::Element(_) => NodeKind::Element,
            NodeState::Group(_) => NodeKind::Group,
            NodeState::Select(_) => NodeKind::Select,
            NodeState::Distinct(_) => NodeKind::Distinct,
        }
    }

    /// The per-element table of a tracking operator.
    pub(crate) fn table(&self) -> Option<&ElementTable> {
        match self {
            NodeState::Group(group) => Some(&group.table),
            NodeState::Select(table) => Some(table),
            _ => None,
        }
    }

    pub(crate) fn table_mut(&mut self) -> Option<&mut ElementTable> {
        match self {
            NodeState::Group(group) => Some(&mut group.table),
            NodeState::Select(table) => Some(table),
            _ => None,
        }
    }

    /// Nodes created by, and exclusively owned by, this node.
    pub(crate) fn owned_children(&self) -> Vec<super::NodeId> {
        self.table()
            .map(|table| table.elements.clone())
            .unwrap_or_default()
    }
}

/// A node in the graph arena.
pub(crate) struct Node {
    pub(crate) id: NodeId,

    /// Declared output type. For collections, the element type.
    pub(crate) output: ValueType,

    /// Current published value.
    pub(crate) value: Value,

    /// Shared nodes this node reads from.
    pub(crate) dependencies: SmallVec<[NodeId; 4]>,

    /// Nodes that receive this node's notifications.
    pub(crate) dependents: SmallVec<[NodeId; 4]>,

    pub(crate) listeners: Listeners,

    /// Set while the node is delivering its own notification.
    pub(crate) notifying: bool,

    pub(crate) stats: NodeStats,

    pub(crate) state: NodeState,
}

impl Node {
    pub(crate) fn new(id: NodeId, output: ValueType, value: Value, state: NodeState) -> Self {
        Self {
            id,
            output,
            value,
            dependencies: SmallVec::new(),
            dependents: SmallVec::new(),
            listeners: Listeners::default(),
            notifying: false,
            stats: NodeStats::default(),
            state,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.state.kind()
    }

    pub(crate) fn add_dependent(&mut self, id: NodeId) {
        if !self.dependents.contains(&id) {
            self.dependents.push(id);
        }
    }

    pub(crate) fn add_dependency(&mut self, id: NodeId) {
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("output", &self.output)
            .field("value", &self.value)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("listeners", &self.listeners)
            .finish()
    }
}

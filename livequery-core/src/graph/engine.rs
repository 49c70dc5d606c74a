//! Graph Engine
//!
//! The graph owns every node in an arena indexed by [`NodeId`]. Nodes refer
//! to each other by handle only, so shared bindings are plain lookups and
//! exclusive ownership (a tracking operator and its element nodes) is kept
//! in the owner's state and released on disposal.
//!
//! # Propagation
//!
//! A mutation of an input node raises a notification that is delivered
//! depth-first, synchronously, on the calling thread:
//!
//! 1. The emitting node has already updated its own value.
//! 2. Its external listeners are called with the payload.
//! 3. Each dependent handles the notification and may emit in turn.
//!
//! A node that is still delivering its own notification must not be
//! updated again. That can only happen through a dependency cycle, and it
//! panics instead of recursing without bound.

use std::collections::{HashMap, HashSet};

use smallvec::SmallVec;
use tracing::trace;

use super::change::Notification;
use super::node::{Node, NodeId, NodeKind, NodeState, NodeStats};
use super::subscriber::SubscriptionId;
use crate::error::{GraphError, GraphResult};
use crate::value::{Value, ValueType};

/// An arena of computation nodes.
pub struct Graph {
    /// All live nodes, indexed by ID.
    nodes: HashMap<NodeId, Node>,

    /// Next ID to hand out. IDs below this that are not in `nodes` are disposed.
    next_id: u64,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Get the total number of live nodes, element nodes included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether `id` was allocated by this graph and has since been disposed.
    pub fn is_disposed(&self, id: NodeId) -> bool {
        id.raw() < self.next_id && !self.nodes.contains_key(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(&id).map(Node::kind)
    }

    /// The declared output type of a node; for collections, the element type.
    pub fn value_type(&self, id: NodeId) -> Option<ValueType> {
        self.nodes.get(&id).map(|node| node.output)
    }

    /// Read a node's current value.
    ///
    /// # Panics
    ///
    /// Panics if the node has been disposed. Reading a disposed node is a
    /// bug in the caller, not a recoverable condition.
    pub fn value(&self, id: NodeId) -> &Value {
        &self.node(id).value
    }

    pub fn stats(&self, id: NodeId) -> Option<NodeStats> {
        self.nodes.get(&id).map(|node| node.stats)
    }

    /// Number of external listeners attached to a node.
    pub fn listener_count(&self, id: NodeId) -> usize {
        self.nodes.get(&id).map_or(0, |node| node.listeners.len())
    }

    /// Subscribe to a node's notifications.
    pub fn subscribe<F>(&mut self, id: NodeId, callback: F) -> GraphResult<SubscriptionId>
    where
        F: FnMut(&Notification) + 'static,
    {
        let node = self.get_mut(id)?;
        Ok(node.listeners.add(callback))
    }

    /// Remove a subscription. Returns false if the node or subscription is gone.
    pub fn unsubscribe(&mut self, id: NodeId, subscription: SubscriptionId) -> bool {
        self.nodes
            .get_mut(&id)
            .map_or(false, |node| node.listeners.remove(subscription))
    }

    /// Dispose a node.
    ///
    /// Owned element nodes are disposed first, then the node unsubscribes
    /// from every dependency and leaves the arena. Dependencies themselves
    /// are shared and stay alive. Disposing an already disposed node does
    /// nothing and returns false.
    pub fn dispose(&mut self, id: NodeId) -> bool {
        let children = match self.nodes.get(&id) {
            Some(node) => node.state.owned_children(),
            None => return false,
        };

        for child in children {
            self.dispose(child);
        }

        let Some(mut node) = self.nodes.remove(&id) else {
            return false;
        };

        for dependency in &node.dependencies {
            if let Some(dep) = self.nodes.get_mut(dependency) {
                dep.dependents.retain(|d| *d != id);
            }
        }
        node.listeners.clear();

        trace!(node = %id, kind = node.kind().name(), "disposed");
        true
    }

    /// Dispose `root` together with every operator it reads from.
    ///
    /// The walk follows dependency edges and stops at input nodes, which
    /// belong to whoever created them, and at the nodes in `keep`. Returns
    /// the number of operators disposed.
    pub fn dispose_query(&mut self, root: NodeId, keep: &[NodeId]) -> usize {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) || keep.contains(&id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if matches!(node.kind(), NodeKind::Variable | NodeKind::Source) {
                continue;
            }
            order.push(id);
            stack.extend(node.dependencies.iter().rev().copied());
        }

        let disposed = order.into_iter().filter(|id| self.dispose(*id)).count();
        trace!(root = %root, disposed, "query disposed");
        disposed
    }

    /// Force a node to recompute from scratch.
    ///
    /// Used when an incremental path cannot determine the new value.
    /// Inputs have nothing to recompute and are left alone.
    pub fn reset_value(&mut self, id: NodeId) -> GraphResult<()> {
        match self.get(id)?.kind() {
            NodeKind::Variable | NodeKind::Source => {}
            NodeKind::Element => self.recompute_element(id, None),
            NodeKind::Group => self.refold_group(id),
            NodeKind::Select => self.rebuild_select(id),
            NodeKind::Distinct => self.reconcile_distinct(id),
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Arena access
    // ------------------------------------------------------------------------

    pub(crate) fn get(&self, id: NodeId) -> GraphResult<&Node> {
        self.nodes.get(&id).ok_or(GraphError::UnknownNode { id })
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode { id })
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(&id) {
            Some(node) => node,
            None => panic!("node {id} read after dispose"),
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(&id) {
            Some(node) => node,
            None => panic!("node {id} updated after dispose"),
        }
    }

    /// Fail unless `id` is a live collection node.
    pub(crate) fn require_collection(&self, id: NodeId) -> GraphResult<()> {
        if self.get(id)?.kind().is_collection() {
            Ok(())
        } else {
            Err(GraphError::NotACollection { id })
        }
    }

    /// Insert a node built by `build`, which receives the new ID.
    pub(crate) fn allocate<F>(&mut self, build: F) -> NodeId
    where
        F: FnOnce(NodeId) -> Node,
    {
        let id = NodeId::from(self.next_id);
        self.next_id += 1;

        let node = build(id);
        trace!(node = %id, kind = node.kind().name(), "allocated");
        self.nodes.insert(id, node);
        id
    }

    /// Add an edge: `dependent` reads from `dependency`.
    pub(crate) fn link(&mut self, dependency: NodeId, dependent: NodeId) {
        self.node_mut(dependency).add_dependent(dependent);
        self.node_mut(dependent).add_dependency(dependency);
    }

    // ------------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------------

    /// Replace a scalar node's value, notifying only if it changed.
    pub(crate) fn publish(&mut self, id: NodeId, value: Value) {
        let node = self.node_mut(id);
        if node.value == value {
            return;
        }
        let old = std::mem::replace(&mut node.value, value.clone());
        self.emit(id, Notification::ValueChanged { old, new: value });
    }

    /// Raise a notification from `id` to its listeners and dependents.
    pub(crate) fn emit(&mut self, id: NodeId, notification: Notification) {
        let dependents: SmallVec<[NodeId; 4]> = {
            let node = self.node_mut(id);
            node.notifying = true;
            node.stats.notifications += 1;
            node.listeners.notify(&notification);
            node.dependents.clone()
        };

        trace!(node = %id, dependents = dependents.len(), "notify");

        for dependent in dependents {
            self.deliver(dependent, id, &notification);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.notifying = false;
        }
    }

    /// Hand a notification from `from` to `target` for handling.
    fn deliver(&mut self, target: NodeId, from: NodeId, notification: &Notification) {
        // Element nodes can be disposed by an earlier sibling's handling.
        let Some(node) = self.nodes.get(&target) else {
            return;
        };

        if node.notifying {
            panic!(
                "reentrant update of node {target} while it is delivering its own notification \
                 (dependency cycle through {from})"
            );
        }

        match node.kind() {
            NodeKind::Element => self.recompute_element(target, None),
            NodeKind::Group => self.on_group_input(target, from, notification),
            NodeKind::Select => self.on_select_input(target, from, notification),
            NodeKind::Distinct => self.on_distinct_input(target, from, notification),
            NodeKind::Variable | NodeKind::Source => {
                unreachable!("input node {target} received a notification from {from}")
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Iterator over the current elements of a collection node.
pub struct Items<'a> {
    inner: ItemsInner<'a>,
}

enum ItemsInner<'a> {
    Values(std::slice::Iter<'a, Value>),
    Nodes {
        graph: &'a Graph,
        ids: std::slice::Iter<'a, NodeId>,
    },
    Keys(indexmap::map::Keys<'a, Value, usize>),
}

impl<'a> Iterator for Items<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            ItemsInner::Values(iter) => iter.next(),
            ItemsInner::Nodes { graph, ids } => ids.next().map(|id| graph.value(*id)),
            ItemsInner::Keys(keys) => keys.next(),
        }
    }
}

impl Graph {
    /// Enumerate a collection node's current elements.
    ///
    /// Sources yield their items, projections yield their element nodes'
    /// values in source order, and distinct sets yield their visible keys
    /// in first-seen order.
    pub fn items(&self, id: NodeId) -> GraphResult<Items<'_>> {
        let inner = match &self.get(id)?.state {
            NodeState::Source(items) => ItemsInner::Values(items.iter()),
            NodeState::Select(table) => ItemsInner::Nodes {
                graph: self,
                ids: table.elements.iter(),
            },
            NodeState::Distinct(state) => ItemsInner::Keys(state.table.keys()),
            _ => return Err(GraphError::NotACollection { id }),
        };
        Ok(Items { inner })
    }

    /// Copy a collection's current elements.
    pub(crate) fn snapshot(&self, id: NodeId) -> Vec<Value> {
        match self.items(id) {
            Ok(items) => items.cloned().collect(),
            Err(_) => panic!("node {id} is not a live collection"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Context;
    use crate::ops::Lambda;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn dispose_is_idempotent() {
        let mut graph = Graph::new();
        let var = graph.variable(1);

        assert!(graph.is_alive(var));
        assert!(graph.dispose(var));
        assert!(!graph.dispose(var));
        assert!(graph.is_disposed(var));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn unknown_ids_are_not_disposed() {
        let graph = Graph::new();
        assert!(!graph.is_disposed(NodeId::from(42)));
        assert!(!graph.is_alive(NodeId::from(42)));
    }

    #[test]
    #[should_panic(expected = "read after dispose")]
    fn reading_a_disposed_node_panics() {
        let mut graph = Graph::new();
        let var = graph.variable(1);
        graph.dispose(var);
        let _ = graph.value(var);
    }

    #[test]
    fn listeners_see_updated_values() {
        let mut graph = Graph::new();
        let var = graph.variable(1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        graph
            .subscribe(var, move |n| seen_clone.borrow_mut().push(n.clone()))
            .unwrap();

        graph.set(var, 2).unwrap();
        graph.set(var, 2).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![Notification::ValueChanged {
                old: Value::Int(1),
                new: Value::Int(2)
            }]
        );
        assert_eq!(graph.stats(var).unwrap().notifications, 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut graph = Graph::new();
        let var = graph.variable(1);

        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        let sub = graph
            .subscribe(var, move |_| *count_clone.borrow_mut() += 1)
            .unwrap();

        graph.set(var, 2).unwrap();
        assert!(graph.unsubscribe(var, sub));
        graph.set(var, 3).unwrap();

        assert_eq!(*count.borrow(), 1);
        assert!(!graph.unsubscribe(var, sub));
    }

    #[test]
    fn disposing_an_owner_releases_its_elements_and_edges() {
        let mut graph = Graph::new();
        let factor = graph.variable(10);
        let mut ctx = Context::new();
        ctx.bind("factor", factor).unwrap();

        let source = graph
            .source(ValueType::Int, [Value::Int(1), Value::Int(2)])
            .unwrap();
        let lambda = Lambda::with_inputs(ValueType::Int, ["factor"], |x, args| {
            Value::Int(x.as_int().unwrap() * args[0].as_int().unwrap())
        });
        let select = graph.select(&ctx, source, lambda).unwrap();

        // source, factor, select, two elements
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.node(factor).dependents.len(), 2);

        assert!(graph.dispose(select));
        assert_eq!(graph.node_count(), 2);
        assert!(graph.node(factor).dependents.is_empty());
        assert!(graph.node(source).dependents.is_empty());

        // Shared bindings survive their readers.
        assert!(graph.is_alive(factor));
        assert!(graph.is_alive(source));
    }

    #[test]
    fn dispose_query_stops_at_inputs_and_kept_nodes() {
        let mut graph = Graph::new();
        let source = graph
            .source(ValueType::Int, [Value::Int(1), Value::Int(2)])
            .unwrap();
        let ctx = Context::new();
        let select = graph
            .select(&ctx, source, Lambda::identity(ValueType::Int))
            .unwrap();
        let shared = graph.distinct(select).unwrap();
        let root = graph.distinct(shared).unwrap();

        // The kept node and everything below it survive.
        assert_eq!(graph.dispose_query(root, &[shared]), 1);
        assert!(graph.is_alive(shared));
        assert!(graph.is_alive(select));

        assert_eq!(graph.dispose_query(shared, &[]), 2);
        assert!(graph.is_disposed(select));
        assert_eq!(graph.node_count(), 1);
        assert!(graph.node(source).dependents.is_empty());
    }

    #[test]
    #[should_panic(expected = "received a notification")]
    fn delivery_to_an_input_panics() {
        let mut graph = Graph::new();
        let upstream = graph.source(ValueType::Int, []).unwrap();
        let downstream = graph.source(ValueType::Int, []).unwrap();

        // Inputs never depend on anything; force a misrouted edge.
        graph.link(upstream, downstream);
        graph.push(upstream, 1).unwrap();
    }

    #[test]
    #[should_panic(expected = "reentrant update")]
    fn reentrant_update_panics() {
        let mut graph = Graph::new();
        let source = graph.source(ValueType::Int, []).unwrap();
        let select = graph
            .select(&Context::new(), source, Lambda::identity(ValueType::Int))
            .unwrap();

        // Simulate a cycle: the select is mid-notification when the source fires.
        graph.node_mut(select).notifying = true;
        graph.push(source, 1).unwrap();
    }

    #[test]
    fn items_rejects_scalars() {
        let mut graph = Graph::new();
        let var = graph.variable(true);
        assert!(matches!(
            graph.items(var),
            Err(GraphError::NotACollection { .. })
        ));
    }
}

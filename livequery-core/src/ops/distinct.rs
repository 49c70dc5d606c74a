//! Deduplication
//!
//! A distinct node publishes the set of distinct values in its source. It
//! keeps a reference count per value instead of element nodes: a value is
//! visible while at least one source item equals it.
//!
//! The visible set is ordered by first appearance. Reconciling against a
//! new snapshot keeps survivors in place and appends new values in
//! snapshot order.

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::error::GraphResult;
use crate::graph::{Change, Graph, Node, NodeId, NodeState, Notification};
use crate::value::Value;

/// Outcome of removing one occurrence from a [`MembershipTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The last occurrence went away; the value is no longer visible.
    Hidden,
    /// Other occurrences remain.
    Decremented,
    /// The value was not tracked.
    Untracked,
}

/// A reference-counted multiset with insertion-ordered keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipTable {
    counts: IndexMap<Value, usize>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table counting every item.
    pub fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut table = Self::new();
        for item in items {
            table.insert(item);
        }
        table
    }

    /// Count one occurrence. Returns true if the value just became visible.
    pub fn insert(&mut self, value: &Value) -> bool {
        match self.counts.get_mut(value) {
            Some(count) => {
                *count += 1;
                false
            }
            None => {
                self.counts.insert(value.clone(), 1);
                true
            }
        }
    }

    /// Drop one occurrence.
    pub fn remove(&mut self, value: &Value) -> Removal {
        match self.counts.get_mut(value) {
            None => Removal::Untracked,
            Some(count) if *count > 1 => {
                *count -= 1;
                Removal::Decremented
            }
            Some(_) => {
                self.counts.shift_remove(value);
                Removal::Hidden
            }
        }
    }

    /// Occurrences of `value`; zero if untracked.
    pub fn count(&self, value: &Value) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.counts.contains_key(value)
    }

    /// Visible values in first-seen order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, Value, usize> {
        self.counts.keys()
    }

    /// Number of visible values.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Replace the counts with those of `snapshot`.
    ///
    /// Returns the values that became visible and the values that stopped
    /// being visible. Values present before and after are in neither list.
    pub fn reconcile(&mut self, snapshot: &[Value]) -> (Vec<Value>, Vec<Value>) {
        let fresh = Self::from_items(snapshot).counts;

        let removed: Vec<Value> = self
            .counts
            .keys()
            .filter(|key| !fresh.contains_key(*key))
            .cloned()
            .collect();
        let added: Vec<Value> = fresh
            .keys()
            .filter(|key| !self.counts.contains_key(*key))
            .cloned()
            .collect();

        self.counts.retain(|key, count| match fresh.get(key) {
            Some(n) => {
                *count = *n;
                true
            }
            None => false,
        });
        for key in &added {
            self.counts.insert(key.clone(), fresh[key]);
        }

        (added, removed)
    }
}

/// State of a distinct node.
pub(crate) struct DistinctState {
    pub(crate) source: NodeId,
    pub(crate) table: MembershipTable,
}

impl Graph {
    /// Create a distinct node: `source.Distinct()`.
    pub fn distinct(&mut self, source: NodeId) -> GraphResult<NodeId> {
        self.require_collection(source)?;
        let output = self.get(source)?.output;

        let table = MembershipTable::from_items(self.items(source)?);
        let state = DistinctState { source, table };
        let id = self.allocate(|id| Node::new(id, output, Value::Seq(id), NodeState::Distinct(state)));
        self.link(source, id);
        Ok(id)
    }

    pub(crate) fn on_distinct_input(&mut self, id: NodeId, from: NodeId, notification: &Notification) {
        let Some(change) = notification.as_change() else {
            return;
        };
        if from != self.distinct_state(id).source {
            return;
        }

        let delta = match change {
            Change::Reset => {
                self.reconcile_distinct(id);
                return;
            }
            Change::Add { items, .. } => {
                let added = self.count_in(id, items);
                Change::from_delta(added, Vec::new())
            }
            Change::Remove { items, .. } => {
                let removed = self.count_out(id, items);
                Change::from_delta(Vec::new(), removed)
            }
            Change::Replace { old, new, .. } => {
                // Counting the new items first lets values present on both
                // sides cancel out without ever leaving the visible set.
                let added = self.count_in(id, new);
                let removed = self.count_out(id, old);
                Change::from_delta(added, removed)
            }
        };

        self.node_mut(id).stats.incremental_updates += 1;
        if let Some(change) = delta {
            trace!(node = %id, "distinct membership changed");
            self.emit(id, Notification::CollectionChanged(change));
        }
    }

    /// Rebuild the counts from the source and emit at most one event.
    pub(crate) fn reconcile_distinct(&mut self, id: NodeId) {
        let source = self.distinct_state(id).source;
        let snapshot = self.snapshot(source);

        let (added, removed) = self.distinct_state_mut(id).table.reconcile(&snapshot);
        self.node_mut(id).stats.full_recomputes += 1;
        debug!(
            node = %id,
            added = added.len(),
            removed = removed.len(),
            "distinct reconciled"
        );

        if let Some(change) = Change::from_delta(added, removed) {
            self.emit(id, Notification::CollectionChanged(change));
        }
    }

    fn count_in(&mut self, id: NodeId, items: &[Value]) -> Vec<Value> {
        let table = &mut self.distinct_state_mut(id).table;
        items.iter().filter(|item| table.insert(item)).cloned().collect()
    }

    fn count_out(&mut self, id: NodeId, items: &[Value]) -> Vec<Value> {
        let mut removed = Vec::new();
        for item in items {
            match self.distinct_state_mut(id).table.remove(item) {
                Removal::Hidden => removed.push(item.clone()),
                Removal::Decremented => {}
                Removal::Untracked => {
                    warn!(node = %id, item = %item, "removal of an untracked value ignored");
                }
            }
        }
        removed
    }

    fn distinct_state(&self, id: NodeId) -> &DistinctState {
        match &self.node(id).state {
            NodeState::Distinct(state) => state,
            _ => panic!("node {id} is not a distinct node"),
        }
    }

    fn distinct_state_mut(&mut self, id: NodeId) -> &mut DistinctState {
        match &mut self.node_mut(id).state {
            NodeState::Distinct(state) => state,
            _ => panic!("node {id} is not a distinct node"),
        }
    }
}

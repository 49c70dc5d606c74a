//! Input Nodes
//!
//! Variables and sources are the leaves of the graph and the only nodes a
//! caller mutates directly. Every mutation updates the input's own state
//! first and then raises exactly one notification describing the delta.

use tracing::trace;

use crate::error::{GraphError, GraphResult};
use crate::graph::{Change, Graph, Node, NodeId, NodeState, Notification};
use crate::value::{Value, ValueType};

impl Graph {
    /// Create a mutable scalar input.
    pub fn variable(&mut self, value: impl Into<Value>) -> NodeId {
        let value = value.into();
        self.allocate(|id| Node::new(id, value.value_type(), value, NodeState::Variable))
    }

    /// Set a variable's value. Setting an equal value raises nothing.
    pub fn set(&mut self, variable: NodeId, value: impl Into<Value>) -> GraphResult<()> {
        let value = value.into();
        let node = self.get(variable)?;
        if !matches!(node.state, NodeState::Variable) {
            return Err(GraphError::NotAnInput {
                id: variable,
                expected: "variable",
            });
        }
        check_type(node.output, &value)?;

        self.publish(variable, value);
        Ok(())
    }

    /// Create a mutable sequence input with the given element type.
    pub fn source<I>(&mut self, element: ValueType, items: I) -> GraphResult<NodeId>
    where
        I: IntoIterator<Item = Value>,
    {
        let items: Vec<Value> = items.into_iter().collect();
        for item in &items {
            check_type(element, item)?;
        }
        Ok(self.allocate(|id| Node::new(id, element, Value::Seq(id), NodeState::Source(items))))
    }

    /// Insert items at `index`, shifting later items right.
    pub fn insert<I>(&mut self, source: NodeId, index: usize, items: I) -> GraphResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let items: Vec<Value> = items.into_iter().collect();
        let element = self.get(source)?.output;
        for item in &items {
            check_type(element, item)?;
        }

        let current = self.source_items_mut(source)?;
        if index > current.len() {
            return Err(GraphError::IndexOutOfRange {
                index,
                len: current.len(),
            });
        }
        if items.is_empty() {
            return Ok(());
        }
        current.splice(index..index, items.iter().cloned());

        trace!(source = %source, index, count = items.len(), "insert");
        self.emit(
            source,
            Notification::CollectionChanged(Change::Add {
                index: Some(index),
                items,
            }),
        );
        Ok(())
    }

    /// Append one item.
    pub fn push(&mut self, source: NodeId, item: impl Into<Value>) -> GraphResult<()> {
        let len = self.source_items_mut(source)?.len();
        self.insert(source, len, [item.into()])
    }

    /// Remove `count` items starting at `index`. Returns the removed items.
    pub fn remove(&mut self, source: NodeId, index: usize, count: usize) -> GraphResult<Vec<Value>> {
        let current = self.source_items_mut(source)?;
        let end = index.saturating_add(count);
        if end > current.len() {
            return Err(GraphError::IndexOutOfRange {
                index: end,
                len: current.len(),
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let removed: Vec<Value> = current.drain(index..end).collect();

        trace!(source = %source, index, count, "remove");
        self.emit(
            source,
            Notification::CollectionChanged(Change::Remove {
                index: Some(index),
                items: removed.clone(),
            }),
        );
        Ok(removed)
    }

    /// Replace the item at `index`. Returns the previous item.
    pub fn replace(&mut self, source: NodeId, index: usize, item: impl Into<Value>) -> GraphResult<Value> {
        let item = item.into();
        check_type(self.get(source)?.output, &item)?;

        let current = self.source_items_mut(source)?;
        let len = current.len();
        let slot = current
            .get_mut(index)
            .ok_or(GraphError::IndexOutOfRange { index, len })?;
        let old = std::mem::replace(slot, item.clone());

        trace!(source = %source, index, "replace");
        self.emit(
            source,
            Notification::CollectionChanged(Change::Replace {
                index: Some(index),
                old: vec![old.clone()],
                new: vec![item],
            }),
        );
        Ok(old)
    }

    /// Replace the whole content of a source.
    pub fn reset<I>(&mut self, source: NodeId, items: I) -> GraphResult<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let items: Vec<Value> = items.into_iter().collect();
        let element = self.get(source)?.output;
        for item in &items {
            check_type(element, item)?;
        }

        *self.source_items_mut(source)? = items;

        trace!(source = %source, "reset");
        self.emit(source, Notification::CollectionChanged(Change::Reset));
        Ok(())
    }

    fn source_items_mut(&mut self, source: NodeId) -> GraphResult<&mut Vec<Value>> {
        match &mut self.get_mut(source)?.state {
            NodeState::Source(items) => Ok(items),
            _ => Err(GraphError::NotAnInput {
                id: source,
                expected: "source",
            }),
        }
    }
}

fn check_type(expected: ValueType, value: &Value) -> GraphResult<()> {
    let found = value.value_type();
    if found == expected {
        Ok(())
    } else {
        Err(GraphError::TypeMismatch { expected, found })
    }
}

//! Evaluation Context
//!
//! A context is a lookup scope from names to live nodes. Lambdas name the
//! nodes they read (a threshold variable, a lookup table) and the context
//! resolves those names when the owning operator is built.
//!
//! Scopes nest: a child scope sees every binding of its parent and may
//! shadow an outer name with its own. Names are unique within one scope.
//!
//! A context references nodes, it never owns them. Whoever created a
//! binding decides when the bound node is disposed.

use std::rc::Rc;

use indexmap::IndexMap;

use super::NodeId;
use crate::error::{GraphError, GraphResult};

/// A scope mapping names to nodes.
#[derive(Debug, Clone, Default)]
pub struct Context {
    bindings: IndexMap<Rc<str>, NodeId>,
    parent: Option<Rc<Context>>,
}

impl Context {
    /// Create an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child scope that falls back to this one on lookup.
    pub fn child(&self) -> Self {
        Self {
            bindings: IndexMap::new(),
            parent: Some(Rc::new(self.clone())),
        }
    }

    /// Bind `name` to `node` in this scope.
    ///
    /// Shadowing a parent binding is allowed; rebinding a name already bound
    /// in this scope is not.
    pub fn bind(&mut self, name: impl Into<Rc<str>>, node: NodeId) -> GraphResult<()> {
        let name = name.into();
        if self.bindings.contains_key(&name) {
            return Err(GraphError::DuplicateBinding {
                name: name.to_string(),
            });
        }
        self.bindings.insert(name, node);
        Ok(())
    }

    /// Look up a name, searching parent scopes outward.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        match self.bindings.get(name) {
            Some(id) => Some(*id),
            None => self.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }

    /// Look up a name or fail with `MissingBinding`.
    pub fn resolve(&self, name: &str) -> GraphResult<NodeId> {
        self.lookup(name).ok_or_else(|| GraphError::MissingBinding {
            name: name.to_string(),
        })
    }

    /// Nodes bound directly in this scope, in binding order.
    ///
    /// Parent bindings are not included: they belong to the outer scope.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.bindings.iter().map(|(name, id)| (name.as_ref(), *id))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

//! Root Facade
//!
//! [`ObservableValue`] binds a built graph to the one value a host cares
//! about: the root node of a compiled query. It republishes the root's
//! changes in host terms and owns disposal of the whole graph.
//!
//! # Events
//!
//! A root value change is raised twice, in this order:
//!
//! 1. a value-changed event carrying the old and new values
//! 2. a property-changed event naming [`VALUE_PROPERTY`]
//!
//! Collection roots additionally raise their structural changes.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut graph = Graph::new();
//! let source = graph.source(ValueType::Int, [2, 4, 6].map(Value::from))?;
//! let even = Lambda::new(ValueType::Bool, |x| Value::Bool(x.as_int().map_or(false, |n| n % 2 == 0)));
//! let root = graph.all(&Context::new(), source, even)?;
//!
//! let mut all_even = ObservableValue::new(graph, Context::new(), root)?;
//! all_even.subscribe_property_changed(|name| println!("{name} changed"));
//!
//! all_even.graph_mut().replace(source, 0, 3)?;
//! // prints "Value changed"
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::GraphResult;
use crate::graph::{Change, Context, Graph, Items, NodeId, Notification, SubscriptionId};
use crate::value::Value;

/// Property name raised with every root value change.
pub const VALUE_PROPERTY: &str = "Value";

type ValueCallback = Box<dyn FnMut(&Value, &Value)>;
type PropertyCallback = Box<dyn FnMut(&str)>;
type ChangeCallback = Box<dyn FnMut(&Change)>;

#[derive(Default)]
struct Subscribers {
    value_changed: Vec<(SubscriptionId, ValueCallback)>,
    property_changed: Vec<(SubscriptionId, PropertyCallback)>,
    collection_changed: Vec<(SubscriptionId, ChangeCallback)>,
}

impl Subscribers {
    fn dispatch(&mut self, notification: &Notification) {
        match notification {
            Notification::ValueChanged { old, new } => {
                for (_, callback) in self.value_changed.iter_mut() {
                    callback(old, new);
                }
                for (_, callback) in self.property_changed.iter_mut() {
                    callback(VALUE_PROPERTY);
                }
            }
            Notification::CollectionChanged(change) => {
                for (_, callback) in self.collection_changed.iter_mut() {
                    callback(change);
                }
            }
        }
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        self.value_changed.retain(|(entry, _)| *entry != id);
        self.property_changed.retain(|(entry, _)| *entry != id);
        self.collection_changed.retain(|(entry, _)| *entry != id);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.value_changed.len() + self.property_changed.len() + self.collection_changed.len()
    }

    fn clear(&mut self) {
        self.value_changed.clear();
        self.property_changed.clear();
        self.collection_changed.clear();
    }
}

/// An observable view of a graph's root node.
pub struct ObservableValue {
    graph: Graph,
    context: Context,
    root: NodeId,
    listener: Option<SubscriptionId>,
    subscribers: Rc<RefCell<Subscribers>>,
}

impl ObservableValue {
    /// Take ownership of `graph` and expose `root`.
    ///
    /// `context` holds the named bindings the graph was built with; they
    /// are disposed together with the root.
    pub fn new(mut graph: Graph, context: Context, root: NodeId) -> GraphResult<Self> {
        let subscribers = Rc::new(RefCell::new(Subscribers::default()));
        let forward = Rc::clone(&subscribers);
        let listener = graph.subscribe(root, move |n| forward.borrow_mut().dispatch(n))?;

        Ok(Self {
            graph,
            context,
            root,
            listener: Some(listener),
            subscribers,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The root's current value.
    ///
    /// # Panics
    ///
    /// Panics after [`dispose`](Self::dispose).
    pub fn value(&self) -> &Value {
        self.graph.value(self.root)
    }

    /// The root's current elements, if the root is a collection.
    pub fn items(&self) -> GraphResult<Items<'_>> {
        self.graph.items(self.root)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access for updating inputs.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn subscribe_value_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Value, &Value) + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers
            .borrow_mut()
            .value_changed
            .push((id, Box::new(callback)));
        id
    }

    pub fn subscribe_property_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&str) + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers
            .borrow_mut()
            .property_changed
            .push((id, Box::new(callback)));
        id
    }

    pub fn subscribe_collection_changed<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Change) + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers
            .borrow_mut()
            .collection_changed
            .push((id, Box::new(callback)));
        id
    }

    /// Remove any kind of facade subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.borrow_mut().remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.listener.is_none()
    }

    /// Dispose the root, every operator it was built from and every context
    /// binding. Unbound inputs stay alive. Safe to call twice.
    pub fn dispose(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        self.graph.unsubscribe(self.root, listener);

        // Bound nodes may be read by lambdas anywhere in the query, so they
        // go last.
        let bindings: Vec<NodeId> = self.context.bindings().map(|(_, id)| id).collect();
        self.graph.dispose_query(self.root, &bindings);
        for id in bindings {
            self.graph.dispose_query(id, &[]);
            self.graph.dispose(id);
        }

        self.subscribers.borrow_mut().clear();
        debug!(root = %self.root, remaining = self.graph.node_count(), "observable disposed");
    }
}

impl Drop for ObservableValue {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ObservableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("root", &self.root)
            .field("disposed", &self.is_disposed())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

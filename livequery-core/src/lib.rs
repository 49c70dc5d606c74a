//! LiveQuery Core
//!
//! This crate provides the incremental evaluation engine behind live
//! queries. A query such as `items.All(x => x.Price < limit)` is built into
//! a graph of computation nodes once; afterwards every mutation of its
//! inputs is propagated as a small delta, and each node does only the work
//! the delta requires.
//!
//! It implements:
//!
//! - Mutable inputs (scalar variables and ordered sources)
//! - Per-element tracking with one sub-computation per source element
//! - Group folds (`All`, `Any`, `Count`, `Sum`) with short-circuit updates
//! - Projection (`Select`) and ref-counted deduplication (`Distinct`)
//! - An observable root facade for hosts
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: node arena, contexts, notifications and propagation
//! - `ops`: node kinds and their constructors
//! - `observable`: root facade
//! - `value`: the dynamically typed values nodes publish
//!
//! # Example
//!
//! ```rust,ignore
//! use livequery_core::{Context, Graph, Lambda, Value, ValueType};
//!
//! let mut graph = Graph::new();
//! let source = graph.source(ValueType::Int, [2, 4, 6].map(Value::from))?;
//! let even = Lambda::new(ValueType::Bool, |x| Value::Bool(x.as_int().unwrap() % 2 == 0));
//! let all_even = graph.all(&Context::new(), source, even)?;
//!
//! assert_eq!(graph.value(all_even), &Value::Bool(true));
//!
//! // Only the replaced element is re-evaluated.
//! graph.replace(source, 0, 3)?;
//! assert_eq!(graph.value(all_even), &Value::Bool(false));
//! ```

pub mod error;
pub mod graph;
pub mod observable;
pub mod ops;
pub mod value;

pub use error::{GraphError, GraphResult};
pub use graph::{Change, Context, Graph, Items, NodeId, NodeKind, NodeStats, Notification, SubscriptionId};
pub use observable::{ObservableValue, VALUE_PROPERTY};
pub use ops::{Fold, Lambda, MembershipTable, Removal};
pub use value::{Value, ValueType};

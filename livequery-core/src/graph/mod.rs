//! Computation Graph
//!
//! This module implements the node graph that incremental queries run on.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes hold a current value (a scalar, or a handle to a live collection)
//! - Edges point from a dependency to the nodes that read it
//!
//! When an input changes, the change travels along the edges as a
//! [`Notification`]. Each node decides from the notification alone how much
//! of itself to recompute, and republishes only what actually changed.
//!
//! # Design Decisions
//!
//! 1. Nodes live in one arena and refer to each other by [`NodeId`]. Named
//!    bindings in a [`Context`] are plain handles; element nodes are owned
//!    by the operator that created them and die with it.
//!
//! 2. Node kinds form a closed set. New operators are new kinds.
//!
//! 3. Propagation is synchronous and depth-first, guarded per node against
//!    reentrant updates.

mod change;
mod context;
mod engine;
mod node;
mod subscriber;

pub use change::{Change, Notification};
pub use context::Context;
pub use engine::{Graph, Items};
pub use node::{NodeId, NodeKind, NodeStats};
pub use subscriber::SubscriptionId;

pub(crate) use node::{Node, NodeState};

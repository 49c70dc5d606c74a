//! Query Operators
//!
//! Each operator is a node kind with its own constructor on [`Graph`]:
//!
//! - `variable`, `source`: mutable inputs
//! - `select`: per-element projection
//! - `group`, `all`, `any`: fold of per-element values
//! - `distinct`: ref-counted deduplication
//!
//! [`Graph`]: crate::graph::Graph

pub(crate) mod distinct;
pub(crate) mod group;
mod input;
mod lambda;
mod select;
pub(crate) mod tracking;

pub use distinct::{MembershipTable, Removal};
pub use group::Fold;
pub use lambda::Lambda;

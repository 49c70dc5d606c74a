//! Group Reduction
//!
//! A group node folds the values of its element nodes into one scalar:
//! `All`, `Any`, `Count` and `Sum`.
//!
//! # Incremental Updates
//!
//! Each operator decides, for every kind of membership change, whether the
//! new aggregate follows from the previous aggregate and the delta alone.
//! If it does, the node updates without looking at any other element. If it
//! does not, the node refolds over every tracked value.
//!
//! For `All`:
//!
//! - an element turning false makes the aggregate false
//! - an element turning true from false could complete the conjunction or
//!   not, so the node refolds
//! - added elements AND into the aggregate
//! - removing only true elements leaves it as is; removing a false one refolds
//!
//! `Any` is the mirror image. `Count` and integer `Sum` are always
//! incremental. Float addition is not associative, so float sums refold on
//! every change to keep incremental and full results identical.

use tracing::debug;

use super::lambda::Lambda;
use super::tracking::{ElementTable, Membership};
use crate::error::{GraphError, GraphResult};
use crate::graph::{Context, Graph, Node, NodeId, NodeState, Notification};
use crate::value::{Value, ValueType};

/// A fold operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    /// Logical AND of boolean element values. True over no elements.
    All,
    /// Logical OR of boolean element values. False over no elements.
    Any,
    /// Number of elements whose value is true.
    Count,
    /// Sum of integer or float element values.
    Sum,
}

/// How to move from the previous aggregate to the next.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Keep,
    Set(Value),
    Refold,
}

impl Fold {
    pub fn name(self) -> &'static str {
        match self {
            Fold::All => "all",
            Fold::Any => "any",
            Fold::Count => "count",
            Fold::Sum => "sum",
        }
    }

    /// The aggregate type for elements of type `element`.
    pub fn output_type(self, element: ValueType) -> GraphResult<ValueType> {
        match (self, element) {
            (Fold::All | Fold::Any, ValueType::Bool) => Ok(ValueType::Bool),
            (Fold::Count, ValueType::Bool) => Ok(ValueType::Int),
            (Fold::Sum, ValueType::Int) => Ok(ValueType::Int),
            (Fold::Sum, ValueType::Float) => Ok(ValueType::Float),
            (fold, found) => Err(GraphError::UnsupportedFold {
                fold: fold.name(),
                found,
            }),
        }
    }

    /// Fold every value from scratch.
    pub(crate) fn fold<'a, I>(self, output: ValueType, values: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut values = values.into_iter();
        match self {
            Fold::All => Value::Bool(values.all(|v| truth(v))),
            Fold::Any => Value::Bool(values.any(|v| truth(v))),
            Fold::Count => Value::Int(values.filter(|v| truth(v)).count() as i64),
            Fold::Sum if output == ValueType::Float => {
                Value::Float(values.map(|v| v.as_float().unwrap_or(0.0)).sum())
            }
            Fold::Sum => Value::Int(
                values.fold(0i64, |acc, v| acc.wrapping_add(v.as_int().unwrap_or(0))),
            ),
        }
    }

    pub(crate) fn on_replaced(self, aggregate: &Value, old: &Value, new: &Value) -> Step {
        match self {
            Fold::All => match (truth(old), truth(new)) {
                (_, false) => Step::Set(Value::Bool(false)),
                (false, true) => Step::Refold,
                (true, true) => Step::Keep,
            },
            Fold::Any => match (truth(old), truth(new)) {
                (_, true) => Step::Set(Value::Bool(true)),
                (true, false) => Step::Refold,
                (false, false) => Step::Keep,
            },
            Fold::Count => {
                let delta = i64::from(truth(new)) - i64::from(truth(old));
                shift_int(aggregate, delta)
            }
            Fold::Sum => match (aggregate, old, new) {
                (Value::Int(sum), Value::Int(old), Value::Int(new)) => {
                    Step::Set(Value::Int(sum.wrapping_sub(*old).wrapping_add(*new)))
                }
                _ => Step::Refold,
            },
        }
    }

    pub(crate) fn on_added(self, aggregate: &Value, added: &[Value]) -> Step {
        match self {
            Fold::All => {
                if added.iter().all(truth) {
                    Step::Keep
                } else {
                    Step::Set(Value::Bool(false))
                }
            }
            Fold::Any => {
                if added.iter().any(truth) {
                    Step::Set(Value::Bool(true))
                } else {
                    Step::Keep
                }
            }
            Fold::Count => shift_int(aggregate, added.iter().filter(|v| truth(v)).count() as i64),
            Fold::Sum => match aggregate {
                Value::Int(sum) => Step::Set(Value::Int(
                    added
                        .iter()
                        .fold(*sum, |acc, v| acc.wrapping_add(v.as_int().unwrap_or(0))),
                )),
                _ => Step::Refold,
            },
        }
    }

    pub(crate) fn on_removed(self, aggregate: &Value, removed: &[Value]) -> Step {
        match self {
            Fold::All => {
                if removed.iter().all(truth) {
                    Step::Keep
                } else {
                    Step::Refold
                }
            }
            Fold::Any => {
                if removed.iter().any(truth) {
                    Step::Refold
                } else {
                    Step::Keep
                }
            }
            Fold::Count => shift_int(aggregate, -(removed.iter().filter(|v| truth(v)).count() as i64)),
            Fold::Sum => match aggregate {
                Value::Int(sum) => Step::Set(Value::Int(
                    removed
                        .iter()
                        .fold(*sum, |acc, v| acc.wrapping_sub(v.as_int().unwrap_or(0))),
                )),
                _ => Step::Refold,
            },
        }
    }
}

fn truth(value: &Value) -> bool {
    value.as_bool().unwrap_or(false)
}

fn shift_int(aggregate: &Value, delta: i64) -> Step {
    match aggregate {
        Value::Int(n) if delta == 0 => Step::Set(Value::Int(*n)),
        Value::Int(n) => Step::Set(Value::Int(n + delta)),
        _ => Step::Refold,
    }
}

/// State of a group node.
pub(crate) struct GroupState {
    pub(crate) fold: Fold,
    pub(crate) table: ElementTable,
}

impl Graph {
    /// Create a group node folding `lambda` over every element of `source`.
    ///
    /// `Fold::All` with a predicate lambda is `source.All(x => predicate)`.
    pub fn group(&mut self, ctx: &Context, source: NodeId, fold: Fold, lambda: Lambda) -> GraphResult<NodeId> {
        self.require_collection(source)?;
        let output = fold.output_type(lambda.output())?;
        let inputs = lambda.resolve(ctx, self)?;

        let initial = fold.fold(output, []);
        let state = GroupState {
            fold,
            table: ElementTable::new(source, lambda, inputs),
        };
        let id = self.allocate(|id| Node::new(id, output, initial, NodeState::Group(state)));
        self.link(source, id);
        self.populate_elements(id);

        let value = self.fold_elements(id);
        self.node_mut(id).value = value;
        Ok(id)
    }

    /// `source.All(x => lambda(x))`.
    pub fn all(&mut self, ctx: &Context, source: NodeId, predicate: Lambda) -> GraphResult<NodeId> {
        self.group(ctx, source, Fold::All, predicate)
    }

    /// `source.Any(x => lambda(x))`.
    pub fn any(&mut self, ctx: &Context, source: NodeId, predicate: Lambda) -> GraphResult<NodeId> {
        self.group(ctx, source, Fold::Any, predicate)
    }

    pub(crate) fn on_group_input(&mut self, id: NodeId, from: NodeId, notification: &Notification) {
        for membership in self.element_memberships(id, from, notification) {
            self.apply_membership(id, membership);
        }
    }

    /// Recompute the aggregate over every element and publish it.
    pub(crate) fn refold_group(&mut self, id: NodeId) {
        let value = self.fold_elements(id);
        self.node_mut(id).stats.full_recomputes += 1;
        debug!(node = %id, value = %value, "group refolded");
        self.publish(id, value);
    }

    fn apply_membership(&mut self, id: NodeId, membership: Membership) {
        let (fold, step) = {
            let node = self.node(id);
            let NodeState::Group(group) = &node.state else {
                unreachable!()
            };
            let aggregate = &node.value;
            let step = match &membership {
                Membership::Reset => Step::Refold,
                Membership::Added { values, .. } => group.fold.on_added(aggregate, values),
                Membership::Removed { values, .. } => group.fold.on_removed(aggregate, values),
                Membership::Replaced { old, new, .. } => group.fold.on_replaced(aggregate, old, new),
            };
            (group.fold, step)
        };

        match step {
            Step::Keep => self.node_mut(id).stats.incremental_updates += 1,
            Step::Set(value) => {
                self.node_mut(id).stats.incremental_updates += 1;
                self.publish(id, value);
            }
            Step::Refold => {
                debug!(node = %id, fold = fold.name(), "incremental update undecidable");
                self.refold_group(id);
            }
        }
    }

    fn fold_elements(&self, id: NodeId) -> Value {
        let node = self.node(id);
        let NodeState::Group(group) = &node.state else {
            panic!("node {id} is not a group node");
        };
        group
            .fold
            .fold(node.output, group.table.elements.iter().map(|e| self.value(*e)))
    }
}

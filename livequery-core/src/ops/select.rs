//! Projection
//!
//! A select node maps every source element through a lambda and publishes
//! the results as a collection in source order.

use tracing::debug;

use super::lambda::Lambda;
use super::tracking::{ElementTable, Membership};
use crate::error::GraphResult;
use crate::graph::{Change, Context, Graph, Node, NodeId, NodeState, Notification};
use crate::value::Value;

impl Graph {
    /// Create a select node: `source.Select(x => lambda(x))`.
    pub fn select(&mut self, ctx: &Context, source: NodeId, lambda: Lambda) -> GraphResult<NodeId> {
        self.require_collection(source)?;
        let inputs = lambda.resolve(ctx, self)?;

        let output = lambda.output();
        let table = ElementTable::new(source, lambda, inputs);
        let id = self.allocate(|id| Node::new(id, output, Value::Seq(id), NodeState::Select(table)));
        self.link(source, id);
        self.populate_elements(id);
        Ok(id)
    }

    pub(crate) fn on_select_input(&mut self, id: NodeId, from: NodeId, notification: &Notification) {
        for membership in self.element_memberships(id, from, notification) {
            let change = match membership {
                Membership::Reset => Change::Reset,
                Membership::Added { index, values } => Change::Add {
                    index: Some(index),
                    items: values,
                },
                Membership::Removed { index, values } => Change::Remove {
                    index: Some(index),
                    items: values,
                },
                Membership::Replaced { old, new, .. } if old == new => continue,
                Membership::Replaced { index, old, new } => {
                    self.node_mut(id).stats.incremental_updates += 1;
                    Change::Replace {
                        index: Some(index),
                        old: vec![old],
                        new: vec![new],
                    }
                }
            };
            self.emit(id, Notification::CollectionChanged(change));
        }
    }

    /// Rebuild every element node from the source and announce a reset.
    pub(crate) fn rebuild_select(&mut self, id: NodeId) {
        let source = self.table(id).source;
        let snapshot = self.snapshot(source);
        self.rebuild_elements(id, snapshot);
        debug!(node = %id, "select rebuilt");
        self.emit(id, Notification::CollectionChanged(Change::Reset));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::value::ValueType;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn times_ten() -> Lambda {
        Lambda::new(ValueType::Int, |x| Value::Int(x.as_int().unwrap() * 10))
    }

    fn record(graph: &mut Graph, id: NodeId) -> Rc<RefCell<Vec<Notification>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        graph
            .subscribe(id, move |n| log_clone.borrow_mut().push(n.clone()))
            .unwrap();
        log
    }

    #[test]
    fn append_forwards_position() {
        let mut graph = Graph::new();
        let source = graph.source(ValueType::Int, ints(&[1, 2, 3])).unwrap();
        let select = graph.select(&Context::new(), source, times_ten()).unwrap();
        assert_eq!(graph.snapshot(select), ints(&[10, 20, 30]));

        let log = record(&mut graph, select);
        graph.push(source, 4).unwrap();

        assert_eq!(graph.snapshot(select), ints(&[10, 20, 30, 40]));
        assert_eq!(
            *log.borrow(),
            vec![Notification::CollectionChanged(Change::Add {
                index: Some(3),
                items: ints(&[40])
            })]
        );
    }

    #[test]
    fn replace_is_suppressed_when_the_projection_is_unchanged() {
        let mut graph = Graph::new();
        let source = graph.source(ValueType::Int, ints(&[1, 2])).unwrap();
        let parity = Lambda::new(ValueType::Bool, |x| Value::Bool(x.as_int().unwrap() % 2 == 0));
        let select = graph.select(&Context::new(), source, parity).unwrap();
        let log = record(&mut graph, select);

        graph.replace(source, 0, 3).unwrap();
        assert!(log.borrow().is_empty());

        graph.replace(source, 0, 4).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![Notification::CollectionChanged(Change::Replace {
                index: Some(0),
                old: vec![Value::Bool(false)],
                new: vec![Value::Bool(true)]
            })]
        );
    }

    #[test]
    fn context_inputs_reproject_every_element() {
        let mut graph = Graph::new();
        let factor = graph.variable(2);
        let mut ctx = Context::new();
        ctx.bind("factor", factor).unwrap();

        let source = graph.source(ValueType::Int, ints(&[1, 2])).unwrap();
        let scale = Lambda::with_inputs(ValueType::Int, ["factor"], |x, args| {
            Value::Int(x.as_int().unwrap() * args[0].as_int().unwrap())
        });
        let select = graph.select(&ctx, source, scale).unwrap();
        let log = record(&mut graph, select);

        graph.set(factor, 3).unwrap();

        assert_eq!(graph.snapshot(select), ints(&[3, 6]));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn reset_value_rebuilds_and_announces() {
        let mut graph = Graph::new();
        let source = graph.source(ValueType::Int, ints(&[1])).unwrap();
        let select = graph.select(&Context::new(), source, times_ten()).unwrap();
        let log = record(&mut graph, select);

        graph.reset_value(select).unwrap();

        assert_eq!(graph.snapshot(select), ints(&[10]));
        assert_eq!(
            *log.borrow(),
            vec![Notification::CollectionChanged(Change::Reset)]
        );
        assert_eq!(graph.stats(select).unwrap().full_recomputes, 1);
    }

    #[test]
    fn missing_binding_creates_nothing() {
        let mut graph = Graph::new();
        let source = graph.source(ValueType::Int, ints(&[1])).unwrap();
        let lambda = Lambda::with_inputs(ValueType::Int, ["factor"], |x, _| x.clone());

        assert_eq!(
            graph.select(&Context::new(), source, lambda),
            Err(GraphError::MissingBinding {
                name: "factor".into()
            })
        );
        assert_eq!(graph.node_count(), 1);
    }
}

//! Integration Tests for Live Queries
//!
//! These tests build small query graphs through the public API and verify
//! that input mutations propagate as the expected deltas.

use std::cell::RefCell;
use std::rc::Rc;

use livequery_core::{
    Change, Context, Fold, Graph, Lambda, NodeId, Notification, ObservableValue, Value, ValueType,
};

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Int(*v)).collect()
}

fn items(graph: &Graph, id: NodeId) -> Vec<Value> {
    graph.items(id).unwrap().cloned().collect()
}

fn record(graph: &mut Graph, id: NodeId) -> Rc<RefCell<Vec<Notification>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();
    graph
        .subscribe(id, move |n| log_clone.borrow_mut().push(n.clone()))
        .unwrap();
    log
}

fn is_even() -> Lambda {
    Lambda::new(ValueType::Bool, |x| Value::Bool(x.as_int().unwrap() % 2 == 0))
}

/// Test that distinct hides a value only when its last occurrence goes.
#[test]
fn distinct_tracks_duplicates() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, ints(&[1, 2, 2, 3])).unwrap();
    let distinct = graph.distinct(source).unwrap();
    assert_eq!(items(&graph, distinct), ints(&[1, 2, 3]));

    let log = record(&mut graph, distinct);

    // Remove one of the two 2s: still visible.
    graph.remove(source, 2, 1).unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(items(&graph, distinct), ints(&[1, 2, 3]));

    // Remove the other.
    graph.remove(source, 1, 1).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![Notification::CollectionChanged(Change::Remove {
            index: None,
            items: ints(&[2])
        })]
    );
    assert_eq!(items(&graph, distinct), ints(&[1, 3]));
}

/// Test that All short-circuits to false and refolds on the way back.
#[test]
fn all_short_circuits_and_refolds() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, ints(&[2, 4, 6])).unwrap();
    let all = graph.all(&Context::new(), source, is_even()).unwrap();
    assert_eq!(graph.value(all), &Value::Bool(true));
    let log = record(&mut graph, all);

    graph.replace(source, 0, 3).unwrap();
    assert_eq!(graph.value(all), &Value::Bool(false));
    let stats = graph.stats(all).unwrap();
    assert_eq!(stats.incremental_updates, 1);
    assert_eq!(stats.full_recomputes, 0);

    graph.replace(source, 0, 2).unwrap();
    assert_eq!(graph.value(all), &Value::Bool(true));
    assert_eq!(graph.stats(all).unwrap().full_recomputes, 1);

    assert_eq!(
        *log.borrow(),
        vec![
            Notification::ValueChanged {
                old: Value::Bool(true),
                new: Value::Bool(false)
            },
            Notification::ValueChanged {
                old: Value::Bool(false),
                new: Value::Bool(true)
            },
        ]
    );
}

/// Test that All over an empty source is true and tracks appends.
#[test]
fn all_over_empty_source() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, []).unwrap();
    let all = graph.all(&Context::new(), source, is_even()).unwrap();
    assert_eq!(graph.value(all), &Value::Bool(true));

    graph.push(source, 1).unwrap();
    assert_eq!(graph.value(all), &Value::Bool(false));

    graph.remove(source, 0, 1).unwrap();
    assert_eq!(graph.value(all), &Value::Bool(true));
}

/// Test that select projects in order and forwards appends with a position.
#[test]
fn select_projects_and_forwards_appends() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, ints(&[1, 2, 3])).unwrap();
    let times_ten = Lambda::new(ValueType::Int, |x| Value::Int(x.as_int().unwrap() * 10));
    let select = graph.select(&Context::new(), source, times_ten).unwrap();
    assert_eq!(items(&graph, select), ints(&[10, 20, 30]));

    let log = record(&mut graph, select);
    graph.push(source, 4).unwrap();

    assert_eq!(items(&graph, select), ints(&[10, 20, 30, 40]));
    assert_eq!(
        *log.borrow(),
        vec![Notification::CollectionChanged(Change::Add {
            index: Some(3),
            items: ints(&[40])
        })]
    );
}

/// Test that a context variable read by the predicate drives the fold.
#[test]
fn context_variable_drives_group() {
    let mut graph = Graph::new();
    let limit = graph.variable(10);
    let mut ctx = Context::new();
    ctx.bind("limit", limit).unwrap();

    let source = graph.source(ValueType::Int, ints(&[1, 5, 9])).unwrap();
    let below = Lambda::with_inputs(ValueType::Bool, ["limit"], |x, args| {
        Value::Bool(x.as_int() < args[0].as_int())
    });
    let count = graph
        .group(&ctx, source, Fold::Count, below)
        .unwrap();
    assert_eq!(graph.value(count), &Value::Int(3));

    graph.set(limit, 6).unwrap();
    assert_eq!(graph.value(count), &Value::Int(2));

    graph.set(limit, 0).unwrap();
    assert_eq!(graph.value(count), &Value::Int(0));
    assert_eq!(graph.stats(count).unwrap().full_recomputes, 0);
}

/// Test that operators compose: distinct projections folded with Sum.
#[test]
fn operators_compose() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, ints(&[1, 2, 3, 4])).unwrap();
    let parity = Lambda::new(ValueType::Int, |x| Value::Int(x.as_int().unwrap() % 2));
    let select = graph.select(&Context::new(), source, parity).unwrap();
    let distinct = graph.distinct(select).unwrap();
    let sum = graph
        .group(
            &Context::new(),
            distinct,
            Fold::Sum,
            Lambda::identity(ValueType::Int),
        )
        .unwrap();

    assert_eq!(items(&graph, distinct), ints(&[1, 0]));
    assert_eq!(graph.value(sum), &Value::Int(1));

    // Dropping every odd number hides 1 from the distinct set.
    graph.remove(source, 2, 1).unwrap();
    graph.remove(source, 0, 1).unwrap();
    assert_eq!(items(&graph, distinct), ints(&[0]));
    assert_eq!(graph.value(sum), &Value::Int(0));

    graph.reset(source, ints(&[7, 9])).unwrap();
    assert_eq!(items(&graph, distinct), ints(&[1]));
    assert_eq!(graph.value(sum), &Value::Int(1));
}

/// Test that the facade republishes root changes and disposes the graph.
#[test]
fn facade_owns_the_graph() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, ints(&[2, 4])).unwrap();
    let mut ctx = Context::new();
    ctx.bind("items", source).unwrap();
    let root = graph.all(&ctx, source, is_even()).unwrap();

    let mut facade = ObservableValue::new(graph, ctx, root).unwrap();
    let properties = Rc::new(RefCell::new(Vec::new()));
    let log = properties.clone();
    facade.subscribe_property_changed(move |name| log.borrow_mut().push(name.to_string()));

    facade.graph_mut().push(source, 5).unwrap();
    assert_eq!(facade.value(), &Value::Bool(false));
    assert_eq!(*properties.borrow(), vec!["Value".to_string()]);

    facade.dispose();
    assert!(facade.graph().is_disposed(root));
    assert!(facade.graph().is_disposed(source));
    assert_eq!(facade.graph().node_count(), 0);
}

/// Test that disposing a facade over a composed query leaves only host inputs.
#[test]
fn facade_disposes_composed_query() {
    let mut graph = Graph::new();
    let factor = graph.variable(10);
    let mut ctx = Context::new();
    ctx.bind("factor", factor).unwrap();

    let source = graph.source(ValueType::Int, ints(&[1, 2, 2])).unwrap();
    let scale = Lambda::with_inputs(ValueType::Int, ["factor"], |x, args| {
        Value::Int(x.as_int().unwrap() * args[0].as_int().unwrap())
    });
    let select = graph.select(&ctx, source, scale).unwrap();
    let distinct = graph.distinct(select).unwrap();
    let sum = graph
        .group(&ctx, distinct, Fold::Sum, Lambda::identity(ValueType::Int))
        .unwrap();

    let mut facade = ObservableValue::new(graph, ctx, sum).unwrap();
    assert_eq!(facade.value(), &Value::Int(30));

    facade.graph_mut().set(factor, 100).unwrap();
    assert_eq!(facade.value(), &Value::Int(300));

    facade.dispose();
    assert_eq!(facade.graph().node_count(), 1);
    assert!(facade.graph().is_alive(source));
    assert!(facade.graph().is_disposed(factor));

    // The host keeps using its source after the query is gone.
    facade.graph_mut().push(source, 3).unwrap();
    assert_eq!(items(facade.graph(), source), ints(&[1, 2, 2, 3]));
}

/// Test that a disposed node stops receiving updates and disposal is idempotent.
#[test]
fn disposed_nodes_stay_silent() {
    let mut graph = Graph::new();
    let source = graph.source(ValueType::Int, ints(&[2])).unwrap();
    let all = graph.all(&Context::new(), source, is_even()).unwrap();
    let log = record(&mut graph, all);

    assert!(graph.dispose(all));
    assert!(!graph.dispose(all));
    assert_eq!(graph.node_count(), 1);

    graph.push(source, 3).unwrap();
    assert!(log.borrow().is_empty());
}

//! Per-element sub-expressions.
//!
//! A [`Lambda`] is the already-compiled body of a per-element function such
//! as the predicate of `All` or the projection of `Select`. It declares its
//! output type and the context names it reads besides the element itself.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::GraphResult;
use crate::graph::{Context, Graph, NodeId};
use crate::value::{Value, ValueType};

type Body = Rc<dyn Fn(&Value, &[Value]) -> Value>;

/// A compiled per-element function.
#[derive(Clone)]
pub struct Lambda {
    output: ValueType,
    inputs: SmallVec<[Rc<str>; 2]>,
    body: Body,
}

impl Lambda {
    /// A lambda of the element alone.
    pub fn new<F>(output: ValueType, body: F) -> Self
    where
        F: Fn(&Value) -> Value + 'static,
    {
        Self {
            output,
            inputs: SmallVec::new(),
            body: Rc::new(move |element, _| body(element)),
        }
    }

    /// A lambda that also reads named context bindings.
    ///
    /// `body` receives the element and the current values of `inputs`, in
    /// the order they were named.
    pub fn with_inputs<I, S, F>(output: ValueType, inputs: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Rc<str>>,
        F: Fn(&Value, &[Value]) -> Value + 'static,
    {
        Self {
            output,
            inputs: inputs.into_iter().map(Into::into).collect(),
            body: Rc::new(body),
        }
    }

    /// The lambda `x => x`.
    pub fn identity(output: ValueType) -> Self {
        Self::new(output, Value::clone)
    }

    pub fn output(&self) -> ValueType {
        self.output
    }

    pub fn inputs(&self) -> &[Rc<str>] {
        &self.inputs
    }

    /// Resolve input names to live nodes.
    pub(crate) fn resolve(&self, ctx: &Context, graph: &Graph) -> GraphResult<SmallVec<[NodeId; 2]>> {
        self.inputs
            .iter()
            .map(|name| {
                let id = ctx.resolve(name)?;
                graph.get(id)?;
                Ok(id)
            })
            .collect()
    }

    /// Evaluate against one element.
    ///
    /// # Panics
    ///
    /// Panics if the body returns a value of a type other than the declared
    /// output type.
    pub(crate) fn eval(&self, element: &Value, args: &[Value]) -> Value {
        let value = (self.body)(element, args);
        assert_eq!(
            value.value_type(),
            self.output,
            "lambda declared {} but produced {value}",
            self.output
        );
        value
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("output", &self.output)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

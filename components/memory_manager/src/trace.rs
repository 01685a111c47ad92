//! Object tracing for the garbage collector.
//!
//! Heap values report their outgoing object references through the
//! [`Trace`] trait. The collector calls [`Trace::trace`] for every gray
//! object and shades the reported children.

use crate::marking::MarkState;
use core_types::Value;

/// Trait for values that can live in a garbage-collected heap.
///
/// Implementations must report every [`core_types::ObjectRef`] reachable
/// from `self`, including references buried inside values. Missing an edge
/// makes the collector free a live object.
pub trait Trace {
    /// Reports every object reference held by `self` to the visitor.
    fn trace(&self, visitor: &mut Visitor<'_>);
}

/// Edge visitor handed to [`Trace::trace`].
///
/// Visiting a white object shades it gray and queues it for scanning;
/// visiting gray or black objects is a no-op.
pub struct Visitor<'a> {
    marks: &'a MarkState,
}

impl<'a> Visitor<'a> {
    pub(crate) fn new(marks: &'a MarkState) -> Self {
        Visitor { marks }
    }

    /// Visits one outgoing object reference.
    pub fn visit(&mut self, child: core_types::ObjectRef) {
        self.marks.shade(child);
    }

    /// Visits the object reference inside a value, if any.
    pub fn visit_value(&mut self, value: &Value) {
        if let Value::Object(child) = value {
            self.visit(*child);
        }
    }
}

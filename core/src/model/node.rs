use crate::internal::*;
use std::fmt;

/// A graph node: one operation, its inputs wires and its output outlets.
#[derive(Debug, Clone)]
pub struct Node {
    /// node id in the graph arena
    pub id: usize,
    /// friendly name, unique in a graph
    pub name: String,
    /// source of each input, in inlet order
    pub inputs: Vec<OutletId>,
    /// the operation
    pub op: Box<dyn Op>,
    /// one entry per output port
    pub outputs: TVec<Outlet>,
}

impl fmt::Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "#{} \"{}\" {}", self.id, self.name, self.op())
    }
}

impl Node {
    pub fn op(&self) -> &dyn Op {
        &*self.op
    }

    /// Try to downcast the node operation to O.
    pub fn op_as<O: Op>(&self) -> Option<&O> {
        self.op().downcast_ref::<O>()
    }

    /// Check if the node operation is of type O.
    pub fn op_is<O: Op>(&self) -> bool {
        self.op_as::<O>().is_some()
    }

    pub fn same_as(&self, other: &Node) -> bool {
        self.inputs == other.inputs && self.op.same_as(other.op.as_ref())
    }
}

/// An output port of a node: its fact and the inlets it feeds.
#[derive(Clone, Debug)]
pub struct Outlet {
    pub fact: TypedFact,
    pub successors: TVec<InletId>,
}

/// Identifier for a node output in the graph.
///
/// This happens to be a unique identifier of any variable tensor in the graph
/// (as the graph typically connect one single node output to one or several
/// inputs slots)
#[derive(Clone, Copy, PartialEq, Eq, Hash, new, Default, PartialOrd, Ord)]
pub struct OutletId {
    pub node: usize,
    pub slot: usize,
}

impl fmt::Debug for OutletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}/{}>", self.node, self.slot)
    }
}

/// Identifier for a node input in the graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, new, Ord, PartialOrd)]
pub struct InletId {
    pub node: usize,
    pub slot: usize,
}

impl fmt::Debug for InletId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, ">{}/{}", self.node, self.slot)
    }
}

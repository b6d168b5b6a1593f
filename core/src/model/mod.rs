//! ## Models and their lifecycle
//!
//! A `Graph` is an arena of `Node`s, each one wrapping an `Op`. Wires go
//! from an `OutletId` (node output) to one or several `InletId`s (node
//! inputs), and every outlet carries a `TypedFact`.
//!
//! Structural changes are expressed as `ModelPatch`es, then the graph is
//! `compact`ed to drop what the registered results no longer need.
mod fact;
mod graph;
mod node;
pub mod order;
mod patch;

pub use self::fact::TypedFact;
pub use self::graph::Graph;
pub use self::node::{InletId, Node, Outlet, OutletId};
pub use self::order::eval_order;
pub use self::patch::ModelPatch;

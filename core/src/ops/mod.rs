//! Ops
use std::fmt;

use downcast_rs::Downcast;

use crate::internal::*;

#[macro_use]
pub mod macros;

pub mod array;
pub mod binary;
pub mod cast;
pub mod dummy;
pub mod element_wise;
pub mod io;
pub mod konst;
pub mod matmul;

/// A graph operation.
///
/// `name` is the IR layer type, `attributes` the content of the IR `<data>`
/// element. Facts are inferred from input facts, values from input values.
pub trait Op: fmt::Debug + dyn_clone::DynClone + Send + Sync + 'static + Downcast {
    fn name(&self) -> Cow<'_, str>;

    /// Opset the layer type belongs to.
    fn version(&self) -> &'static str {
        "opset1"
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>>;

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>>;

    /// Compare two ops.
    fn same_as(&self, _other: &dyn Op) -> bool {
        false
    }
}

impl_downcast!(Op);
dyn_clone::clone_trait_object!(Op);

impl<O: Op> From<O> for Box<dyn Op> {
    fn from(it: O) -> Box<dyn Op> {
        Box::new(it)
    }
}

impl fmt::Display for dyn Op {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name())
    }
}

/// Parse a boolean IR attribute.
pub fn parse_bool(name: &str, value: &str) -> CarveResult<bool> {
    match value.trim() {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        _ => bail!("Invalid boolean value {:?} for attribute {}", value, name),
    }
}

/// Normalize a possibly negative axis against a rank.
pub fn resolve_axis(axis: i64, rank: usize) -> CarveResult<usize> {
    let resolved = if axis < 0 { axis + rank as i64 } else { axis };
    ensure!(
        0 <= resolved && (resolved as usize) < rank,
        "Axis {} out of range for rank {}",
        axis,
        rank
    );
    Ok(resolved as usize)
}

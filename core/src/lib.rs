//! # carve-core
//!
//! Typed operation graph, reference interpreter and tensor-level subgraph
//! extraction.
//!
//! ## Example
//!
//! ```
//! use carve_core::internal::*;
//! use carve_core::ops::binary::BinaryKind;
//!
//! let mut model = Graph::default();
//! let x = model.add_parameter("x", TypedFact::dt_shape(DatumType::F32, [1, 3])).unwrap();
//! let three = model.add_const("three", tensor1(&[3f32])).unwrap();
//! let add = model.wire_node("add", BinaryKind::Add.into_op(), &[x, three]).unwrap();
//! let relu = model.wire_node("relu", UnaryKind::Relu.into_op(), &add).unwrap();
//! model.add_result("output", relu[0]).unwrap();
//!
//! // turn "add:0" into a model input, dropping "x" and the constant
//! let boundary = extract_subgraph(&mut model, &["add:0"], &["relu:0"], &SpliceOptions::default()).unwrap();
//! assert_eq!(boundary.inputs, vec!["add:0".to_string()]);
//!
//! let compiled = compile(model, &CompileConfig::default().with_layout(None)).unwrap();
//! let outputs = compiled.infer(tvec!(tensor2(&[[-1f32, 0., 2.]]))).unwrap();
//! assert_eq!(*outputs.outputs[0], tensor2(&[[0f32, 0., 2.]]));
//! ```

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate downcast_rs;
#[macro_use]
extern crate log;

pub extern crate carve_data;

#[macro_use]
pub mod ops;

pub mod model;
pub mod plan;
pub mod runtime;
pub mod splice;

pub use dyn_clone;

/// This prelude is meant for code using carve.
pub mod prelude {
    pub use crate::model::{Graph, InletId, Node, OutletId, TypedFact};
    pub use crate::runtime::{compile, CompileConfig, CompiledModel, PerformanceMode};
    pub use crate::splice::{extract_subgraph, Boundary, InputStrategy, SpliceOptions, TensorRef};
    pub use carve_data::prelude::*;
}

/// This prelude is meant for code extending carve (like implementing new ops).
pub mod internal {
    pub use crate::model::*;
    pub use crate::ops::element_wise::UnaryKind;
    pub use crate::ops::Op;
    pub use crate::plan::{SimplePlan, SimpleState};
    pub use crate::prelude::*;
    pub use carve_data::internal::*;
    pub use std::fmt;
}

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("CARVE_LOG").try_init();
}

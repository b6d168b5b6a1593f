//! # carve-ir
//!
//! Reader and writer for OpenVINO-style IR models: an XML topology
//! (`<net>`, `<layers>`, `<edges>`) and a flat little-endian weights file.
//!
//! ```no_run
//! let ir = carve_ir::ir();
//! let mut model = ir.model_for_path("model.xml").unwrap();
//! carve_ir::prelude::extract_subgraph(
//!     &mut model,
//!     &["encoder/add:0"],
//!     &["decoder/mul:0"],
//!     &Default::default(),
//! )
//! .unwrap();
//! ir.write_to_files(&model, "simple_model").unwrap();
//! ```
#[macro_use]
extern crate log;

pub mod framework;
pub mod layer;
mod read;
pub mod registry;
pub mod weights;
mod write;
pub mod xml;

pub use framework::Ir;

pub fn ir() -> Ir {
    Ir::default()
}

pub mod prelude {
    pub use crate::framework::Ir;
    pub use crate::ir;
    pub use carve_core::prelude::*;
}

pub mod internal {
    pub use crate::prelude::*;
    pub use carve_core::internal::*;
}

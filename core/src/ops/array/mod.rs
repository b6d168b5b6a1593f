//! Shape-changing operations.
mod concat;
mod reshape;
mod split;

pub use concat::Concat;
pub use reshape::Reshape;
pub use split::Split;

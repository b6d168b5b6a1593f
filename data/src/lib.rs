#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used about everywhere in carve, for node inputs and outputs, or
/// tensor dimensions.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub type CarveResult<T> = anyhow::Result<T>;
pub type CarveError = anyhow::Error;

pub mod prelude {
    pub use crate::datum::{Datum, DatumType};
    pub use crate::dim::{Dim, ShapeFact};
    pub use crate::tensor::litteral::*;
    pub use crate::tensor::{IntoArcTensor, Tensor};
    pub use crate::tvec;
    pub use crate::TVec;
    pub use crate::{CarveError, CarveResult};
    pub use crate::{dispatch_datum, dispatch_numbers};
    pub use half::f16;
}

pub mod internal {
    pub use crate::prelude::*;
    pub use crate::tensor::Storage;
    pub use anyhow::{anyhow, bail, ensure, format_err, Context as CarveErrorContext};
    pub use ndarray as carve_ndarray;
    pub use smallvec as carve_smallvec;
    pub use std::borrow::Cow;
    pub use std::collections::HashMap;
    pub use std::sync::Arc;
}

pub use anyhow;
pub use itertools;

mod datum;
mod dim;
mod tensor;

//! `Tensor`, carve main data object of interest.
use crate::internal::*;
use itertools::Itertools;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Dimension, IxDyn};
use std::fmt;

pub mod litteral;

#[doc(hidden)]
#[derive(Clone, PartialEq)]
pub enum Storage {
    Bool(ArrayD<bool>),
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F16(ArrayD<f16>),
    F32(ArrayD<f32>),
}

macro_rules! with_storage {
    ($storage:expr, $a:ident => $body:expr) => {
        match $storage {
            Storage::Bool($a) => $body,
            Storage::U8($a) => $body,
            Storage::I32($a) => $body,
            Storage::I64($a) => $body,
            Storage::F16($a) => $body,
            Storage::F32($a) => $body,
        }
    };
}

/// Tensor is a concrete tensor in carve.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    storage: Storage,
}

impl Tensor {
    /// Create a tensor filled with the default (zero) value of T.
    pub fn zero<T: Datum>(shape: &[usize]) -> Tensor {
        T::into_storage(ArrayD::default(IxDyn(shape))).into()
    }

    pub fn zero_dt(dt: DatumType, shape: &[usize]) -> Tensor {
        dispatch_datum!(Self::zero(dt)(shape))
    }

    /// Create a tensor from a shape and a row-major buffer.
    pub fn from_shape<T: Datum>(shape: &[usize], data: &[T]) -> CarveResult<Tensor> {
        let array = ArrayD::from_shape_vec(IxDyn(shape), data.to_vec())
            .with_context(|| format!("Building a {shape:?} tensor from {} values", data.len()))?;
        Ok(array.into())
    }

    pub fn datum_type(&self) -> DatumType {
        match self.storage {
            Storage::Bool(_) => DatumType::Bool,
            Storage::U8(_) => DatumType::U8,
            Storage::I32(_) => DatumType::I32,
            Storage::I64(_) => DatumType::I64,
            Storage::F16(_) => DatumType::F16,
            Storage::F32(_) => DatumType::F32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_storage!(&self.storage, a => a.shape())
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_array_view<T: Datum>(&self) -> CarveResult<ArrayViewD<'_, T>> {
        T::storage_view(&self.storage).with_context(|| {
            format!(
                "Tensor datum type error: tensor is {:?}, accessed as {:?}",
                self.datum_type(),
                T::datum_type()
            )
        })
    }

    pub fn to_array_view_mut<T: Datum>(&mut self) -> CarveResult<ArrayViewMutD<'_, T>> {
        let dt = self.datum_type();
        T::storage_view_mut(&mut self.storage).with_context(|| {
            format!("Tensor datum type error: tensor is {:?}, accessed as {:?}", dt, T::datum_type())
        })
    }

    pub fn into_array<T: Datum>(self) -> CarveResult<ArrayD<T>> {
        T::from_storage(self.storage).map_err(|storage| {
            let found = Tensor { storage }.datum_type();
            format_err!("Tensor datum type error: tensor is {:?}, accessed as {:?}", found, T::datum_type())
        })
    }

    /// Values in logical (row-major) order.
    pub fn to_vec<T: Datum>(&self) -> CarveResult<Vec<T>> {
        Ok(self.to_array_view::<T>()?.iter().copied().collect())
    }

    pub fn to_scalar<T: Datum>(&self) -> CarveResult<T> {
        ensure!(self.len() == 1, "Expected a single value tensor, got {:?}", self);
        self.to_array_view::<T>()?.iter().next().copied().context("Empty tensor")
    }

    /// Integer values of the tensor, whatever its integer type.
    pub fn to_i64_vec(&self) -> CarveResult<Vec<i64>> {
        ensure!(self.datum_type().is_integer(), "Expected an integer tensor, got {:?}", self);
        let cast = self.cast_to_dt(DatumType::I64)?;
        cast.to_vec::<i64>()
    }

    fn values_as_f64<T: Datum>(&self) -> CarveResult<ArrayD<f64>> {
        Ok(self.to_array_view::<T>()?.mapv(|x| x.to_f64()))
    }

    fn from_f64_values<T: Datum>(values: &ArrayD<f64>) -> Tensor {
        values.mapv(T::from_f64).into()
    }

    pub fn cast_to_dt(&self, dt: DatumType) -> CarveResult<Cow<'_, Tensor>> {
        if self.datum_type() == dt {
            return Ok(Cow::Borrowed(self));
        }
        let values = dispatch_datum!(Self::values_as_f64(self.datum_type())(self))?;
        Ok(Cow::Owned(dispatch_datum!(Self::from_f64_values(dt)(&values))))
    }

    fn into_shape_t<T: Datum>(self, shape: &[usize]) -> CarveResult<Tensor> {
        let array = self.into_array::<T>()?;
        let array = array.as_standard_layout().into_owned();
        Ok(array.into_shape_with_order(IxDyn(shape))?.into())
    }

    /// Reshape, keeping values in row-major order.
    pub fn into_shape(self, shape: &[usize]) -> CarveResult<Tensor> {
        ensure!(
            shape.iter().product::<usize>() == self.len(),
            "Can not reshape {:?} to {:?}",
            self.shape(),
            shape
        );
        let dt = self.datum_type();
        dispatch_datum!(Self::into_shape_t(dt)(self, shape))
    }

    /// Compare two tensors. Floats are compared with a tolerance when
    /// `approx` is set, everything else must match exactly.
    pub fn close_enough(&self, other: &Tensor, approx: bool) -> CarveResult<()> {
        ensure!(
            self.datum_type() == other.datum_type(),
            "Datum type mismatch: {:?} vs {:?}",
            self.datum_type(),
            other.datum_type()
        );
        ensure!(self.shape() == other.shape(), "Shape mismatch {:?} vs {:?}", self.shape(), other.shape());
        if !(approx && self.datum_type().is_float()) {
            ensure!(self == other, "Values mismatch: {:?} vs {:?}", self, other);
            return Ok(());
        }
        let (atol, rtol) = if self.datum_type() == DatumType::F16 { (1e-3, 1e-3) } else { (1e-5, 1e-4) };
        let ma = self.cast_to_dt(DatumType::F32)?;
        let mb = other.cast_to_dt(DatumType::F32)?;
        let ma = ma.to_array_view::<f32>()?;
        let mb = mb.to_array_view::<f32>()?;
        for ((ix, a), b) in ma.indexed_iter().zip(mb.iter()) {
            if !((a.is_nan() && b.is_nan()) || (a - b).abs() <= atol + rtol * b.abs()) {
                bail!("Mismatch at {:?}: {} vs {}", ix.slice(), a, b)
            }
        }
        Ok(())
    }

    fn dump(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let shape = self.shape().iter().join(",");
        let values = with_storage!(&self.storage, a => {
            let mut s = a.iter().take(12).join(", ");
            if a.len() > 12 {
                s.push_str(", ...");
            }
            s
        });
        if shape.is_empty() {
            write!(f, "{} {}", self.datum_type(), values)
        } else {
            write!(f, "{},{} {}", shape, self.datum_type(), values)
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.dump(f)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.dump(f)
    }
}

impl From<Storage> for Tensor {
    fn from(storage: Storage) -> Tensor {
        Tensor { storage }
    }
}

impl<T: Datum> From<ArrayD<T>> for Tensor {
    fn from(it: ArrayD<T>) -> Tensor {
        T::into_storage(it).into()
    }
}

pub trait IntoArcTensor {
    fn into_arc_tensor(self) -> Arc<Tensor>;
}

impl IntoArcTensor for Tensor {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self)
    }
}

impl IntoArcTensor for Arc<Tensor> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dt_has_shape() {
        let t = Tensor::zero_dt(DatumType::F16, &[2, 3]);
        assert_eq!(t.datum_type(), DatumType::F16);
        assert_eq!(t.shape(), &[2, 3]);
        assert!(t.to_vec::<f16>().unwrap().iter().all(|x| *x == f16::ZERO));
    }

    #[test]
    fn wrong_type_access_fails() {
        let t = tensor1(&[1i32, 2]);
        assert!(t.to_array_view::<f32>().is_err());
        assert!(t.into_array::<i64>().is_err());
    }

    #[test]
    fn cast_f16_to_f32() {
        let t = tensor1(&[f16::from_f32(1.5), f16::from_f32(-2.0)]);
        let c = t.cast_to_dt(DatumType::F32).unwrap();
        assert_eq!(c.into_owned(), tensor1(&[1.5f32, -2.0]));
    }

    #[test]
    fn cast_to_bool() {
        let t = tensor1(&[0i64, 3, -1]);
        assert_eq!(t.cast_to_dt(DatumType::Bool).unwrap().into_owned(), tensor1(&[false, true, true]));
    }

    #[test]
    fn reshape_keeps_row_major_order() {
        let t = tensor2(&[[1i32, 2, 3], [4, 5, 6]]);
        let t = t.into_shape(&[3, 2]).unwrap();
        assert_eq!(t, tensor2(&[[1i32, 2], [3, 4], [5, 6]]));
        assert!(t.into_shape(&[4]).is_err());
    }

    #[test]
    fn close_enough_tolerates_float_noise() {
        let a = tensor1(&[1.0f32, 2.0]);
        let b = tensor1(&[1.0f32, 2.000001]);
        assert!(a.close_enough(&b, true).is_ok());
        assert!(a.close_enough(&b, false).is_err());
        let err = a.close_enough(&tensor1(&[1.0f32, 2.5]), true).unwrap_err();
        assert!(err.to_string().contains("Mismatch at [1]"));
    }

    #[test]
    fn from_shape_checks_len() {
        assert!(Tensor::from_shape(&[2, 2], &[1f32, 2., 3.]).is_err());
        let t = Tensor::from_shape(&[2, 2], &[1f32, 2., 3., 4.]).unwrap();
        assert!(t.to_scalar::<f32>().is_err());
        assert_eq!(format!("{t:?}"), "2,2,f32 1, 2, 3, 4");
    }
}

use crate::internal::*;
use ndarray::*;

pub fn tensor0<A: Datum>(x: A) -> Tensor {
    arr0(x).into_dyn().into()
}

pub fn tensor1<A: Datum>(xs: &[A]) -> Tensor {
    arr1(xs).into_dyn().into()
}

pub fn tensor2<A: Datum, const N: usize>(xs: &[[A; N]]) -> Tensor {
    arr2(xs).into_dyn().into()
}

pub fn tensor3<A: Datum, const N: usize, const M: usize>(xs: &[[[A; M]; N]]) -> Tensor {
    arr3(xs).into_dyn().into()
}

pub fn rctensor0<A: Datum>(x: A) -> Arc<Tensor> {
    Arc::new(tensor0(x))
}

pub fn rctensor1<A: Datum>(xs: &[A]) -> Arc<Tensor> {
    Arc::new(tensor1(xs))
}

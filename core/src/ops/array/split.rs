use crate::internal::*;
use crate::ops::resolve_axis;
use ndarray::{Axis, Slice};

/// Split a tensor in `num_splits` equal chunks along an axis given by a
/// constant second input.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Split {
    pub num_splits: usize,
}

impl Split {
    fn axis_value(axis: &Tensor) -> CarveResult<i64> {
        let values = axis.to_i64_vec().context("Split axis must be an integer")?;
        ensure!(values.len() == 1, "Split axis must be a single value, got {:?}", axis);
        Ok(values[0])
    }

    fn eval_t<T: Datum>(&self, input: &Tensor, axis: usize) -> CarveResult<TVec<Arc<Tensor>>> {
        let view = input.to_array_view::<T>()?;
        let chunk = view.shape()[axis] / self.num_splits;
        Ok((0..self.num_splits)
            .map(|ix| {
                let slice = Slice::from(ix * chunk..(ix + 1) * chunk);
                Tensor::from(view.slice_axis(Axis(axis), slice).to_owned()).into_arc_tensor()
            })
            .collect())
    }
}

impl Op for Split {
    fn name(&self) -> Cow<'_, str> {
        "Split".into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![("num_splits".to_string(), self.num_splits.to_string())]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 2);
        ensure!(self.num_splits > 0, "Split needs a positive num_splits");
        let axis = inputs[1].konst.as_ref().context("Split axis must be a constant")?;
        let axis = resolve_axis(Self::axis_value(axis)?, inputs[0].rank())?;
        let mut shape = inputs[0].shape.clone();
        let dim = match shape[axis] {
            Dim::Val(d) => {
                ensure!(
                    d % self.num_splits == 0,
                    "Split: dimension {} on axis {} is not divisible by {}",
                    d,
                    axis,
                    self.num_splits
                );
                Dim::Val(d / self.num_splits)
            }
            Dim::Any => Dim::Any,
        };
        shape.set_dim(axis, dim)?;
        Ok((0..self.num_splits)
            .map(|_| TypedFact::dt_shape(inputs[0].datum_type, shape.clone()))
            .collect())
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        ensure!(inputs.len() == 2, "Split expects 2 inputs, got {}", inputs.len());
        let input = &inputs[0];
        let axis = resolve_axis(Self::axis_value(&inputs[1])?, input.rank())?;
        let len = input.shape()[axis];
        ensure!(len % self.num_splits == 0, "Split: {} is not divisible by {}", len, self.num_splits);
        dispatch_datum!(Self::eval_t(input.datum_type())(self, input, axis))
    }

    impl_op_same_as!();
}

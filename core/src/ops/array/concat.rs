use crate::internal::*;
use crate::ops::resolve_axis;
use ndarray::{ArrayViewD, Axis};

/// Concatenation of inputs along an axis. Negative axes count from the end.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Concat {
    pub axis: i64,
}

impl Concat {
    fn eval_t<T: Datum>(axis: usize, inputs: &[Arc<Tensor>]) -> CarveResult<Tensor> {
        let views = inputs.iter().map(|t| t.to_array_view::<T>()).collect::<CarveResult<Vec<ArrayViewD<T>>>>()?;
        Ok(ndarray::concatenate(Axis(axis), &views)?.into())
    }
}

impl Op for Concat {
    fn name(&self) -> Cow<'_, str> {
        "Concat".into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![("axis".to_string(), self.axis.to_string())]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        ensure!(!inputs.is_empty(), "Concat needs at least one input");
        let first = inputs[0];
        let rank = first.rank();
        let axis = resolve_axis(self.axis, rank)?;
        let mut shape: TVec<Dim> = first.shape.iter().copied().collect();
        for input in &inputs[1..] {
            ensure!(input.datum_type == first.datum_type, "Concat of mixed types {:?} and {:?}", first, input);
            ensure!(input.rank() == rank, "Concat of mixed ranks {:?} and {:?}", first, input);
            for (ix, (acc, d)) in shape.iter_mut().zip(input.shape.iter()).enumerate() {
                if ix == axis {
                    *acc = match (*acc, *d) {
                        (Dim::Val(a), Dim::Val(b)) => Dim::Val(a + b),
                        _ => Dim::Any,
                    };
                } else {
                    ensure!(acc.compatible_with(d), "Concat on axis {}: {:?} and {:?} mismatch", axis, first, input);
                    if !acc.is_concrete() {
                        *acc = *d;
                    }
                }
            }
        }
        Ok(tvec!(TypedFact::dt_shape(first.datum_type, shape.into_iter().collect::<ShapeFact>())))
    }

    fn eval(&self, inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        ensure!(!inputs.is_empty(), "Concat needs at least one input");
        let dt = inputs[0].datum_type();
        ensure!(inputs.iter().all(|t| t.datum_type() == dt), "Concat of mixed types");
        let axis = resolve_axis(self.axis, inputs[0].rank())?;
        let result = dispatch_datum!(Self::eval_t(dt)(axis, &inputs))?;
        Ok(tvec!(result.into_arc_tensor()))
    }

    impl_op_same_as!();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn concat_last_axis() {
        let op = Concat::new(-1);
        let a = tensor2(&[[1f32], [2.]]).into_arc_tensor();
        let b = tensor2(&[[3f32, 4.], [5., 6.]]).into_arc_tensor();
        let out = op.eval(tvec!(a, b)).unwrap();
        assert_eq!(*out[0], tensor2(&[[1f32, 3., 4.], [2., 5., 6.]]));
    }

    #[test]
    fn facts() {
        let op = Concat::new(1);
        let a = TypedFact::dt_shape(DatumType::F32, ShapeFact::from_dims([Dim::Any, Dim::Val(3)]));
        let b = TypedFact::shape::<f32>([16, 5]);
        let out = op.output_facts(&[&a, &b]).unwrap();
        assert_eq!(out[0].shape, ShapeFact::from([16, 8]));
        let c = TypedFact::shape::<f32>([4, 5]);
        assert!(op.output_facts(&[&b, &c]).is_err());
        assert!(Concat::new(2).output_facts(&[&b]).is_err());
    }
}

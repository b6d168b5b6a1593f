use crate::internal::*;

/// Element type conversion, `Convert` in the IR.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Cast {
    pub to: DatumType,
}

impl Op for Cast {
    fn name(&self) -> Cow<'_, str> {
        "Convert".into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![("destination_type".to_string(), self.to.ir_element_type().to_string())]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 1);
        Ok(tvec!(TypedFact::dt_shape(self.to, inputs[0].shape.clone())))
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        let input = args_1!(inputs);
        if input.datum_type() == self.to {
            return Ok(tvec!(input));
        }
        Ok(tvec!(input.cast_to_dt(self.to)?.into_owned().into_arc_tensor()))
    }

    impl_op_same_as!();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn f16_to_f32() {
        let op = Cast::new(DatumType::F32);
        let input = tensor1(&[f16::from_f32(0.5), f16::from_f32(-1.0)]).into_arc_tensor();
        let out = op.eval(tvec!(input)).unwrap();
        assert_eq!(*out[0], tensor1(&[0.5f32, -1.0]));
    }

    #[test]
    fn facts() {
        let op = Cast::new(DatumType::I64);
        let fact = TypedFact::shape::<f32>([2, 3]);
        assert_eq!(op.output_facts(&[&fact]).unwrap()[0], TypedFact::shape::<i64>([2, 3]));
    }
}

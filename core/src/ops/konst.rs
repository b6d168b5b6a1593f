use crate::internal::*;

#[derive(Debug, Clone, new, PartialEq)]
pub struct Const(pub Arc<Tensor>);

impl Op for Const {
    fn name(&self) -> Cow<'_, str> {
        "Const".into()
    }

    /// `offset` and `size` are only known by the weights writer.
    fn attributes(&self) -> Vec<(String, String)> {
        vec![
            ("element_type".to_string(), self.0.datum_type().ir_element_type().to_string()),
            ("shape".to_string(), ShapeFact::from(self.0.shape()).to_string()),
        ]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 0);
        Ok(tvec!(self.0.clone().into()))
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        Ok(tvec![self.0.clone()])
    }

    impl_op_same_as!();
}

//! Graph boundary operations.
use crate::internal::*;

/// A model input. Its value is provided at run time.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Parameter {
    pub fact: TypedFact,
}

impl Op for Parameter {
    fn name(&self) -> Cow<'_, str> {
        "Parameter".into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![
            ("shape".to_string(), self.fact.shape.to_string()),
            ("element_type".to_string(), self.fact.datum_type.ir_element_type().to_string()),
        ]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 0);
        Ok(tvec!(self.fact.clone()))
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        bail!("Parameter evaluated without a value")
    }

    impl_op_same_as!();
}

/// A model output. Serialized as a `Result` layer, it has no output port:
/// the value it exposes is the one of its single input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output;

impl Op for Output {
    fn name(&self) -> Cow<'_, str> {
        "Result".into()
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 1);
        Ok(tvec!())
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        Ok(tvec!())
    }

    impl_op_same_as!();
}

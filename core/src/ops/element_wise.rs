//! Unary element-wise operations.
use crate::internal::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Relu,
    Sigmoid,
    Tanh,
    Exp,
    Negative,
}

impl UnaryKind {
    pub const ALL: [UnaryKind; 5] =
        [UnaryKind::Relu, UnaryKind::Sigmoid, UnaryKind::Tanh, UnaryKind::Exp, UnaryKind::Negative];

    pub fn name(&self) -> &'static str {
        match self {
            UnaryKind::Relu => "Relu",
            UnaryKind::Sigmoid => "Sigmoid",
            UnaryKind::Tanh => "Tanh",
            UnaryKind::Exp => "Exp",
            UnaryKind::Negative => "Negative",
        }
    }

    pub fn from_name(name: &str) -> Option<UnaryKind> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn into_op(self) -> Box<dyn Op> {
        Box::new(ElementWiseOp(self))
    }

    fn accepts(&self, dt: DatumType) -> bool {
        match self {
            UnaryKind::Relu => dt.is_number(),
            UnaryKind::Negative => dt.is_float() || dt == DatumType::I32 || dt == DatumType::I64,
            _ => dt.is_float(),
        }
    }

    fn compute(&self, x: f64) -> f64 {
        match self {
            UnaryKind::Relu => x.max(0.0),
            UnaryKind::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            UnaryKind::Tanh => x.tanh(),
            UnaryKind::Exp => x.exp(),
            UnaryKind::Negative => -x,
        }
    }
}

#[derive(Debug, Clone, new, PartialEq)]
pub struct ElementWiseOp(pub UnaryKind);

impl ElementWiseOp {
    fn eval_t<T: Datum>(&self, a: &Tensor) -> CarveResult<Tensor> {
        let kind = self.0;
        let view = a.to_array_view::<T>()?;
        let result = if kind == UnaryKind::Relu {
            view.mapv(|x| if x > T::default() { x } else { T::default() })
        } else {
            view.mapv(|x| T::from_f64(kind.compute(x.to_f64())))
        };
        Ok(result.into())
    }
}

impl Op for ElementWiseOp {
    fn name(&self) -> Cow<'_, str> {
        self.0.name().into()
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 1);
        let dt = inputs[0].datum_type;
        ensure!(self.0.accepts(dt), "{} is not defined on {}", self.0.name(), dt);
        Ok(tvec!(inputs[0].without_value()))
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        let a = args_1!(inputs);
        let dt = a.datum_type();
        ensure!(self.0.accepts(dt), "{} is not defined on {}", self.0.name(), dt);
        let result = dispatch_numbers!(Self::eval_t(dt)(self, &a))?;
        Ok(tvec!(result.into_arc_tensor()))
    }

    impl_op_same_as!();
}

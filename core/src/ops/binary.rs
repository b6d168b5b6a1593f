//! Element-wise binary operations with numpy broadcasting.
use crate::internal::*;
use ndarray::{IxDyn, Zip};

/// Arithmetic on the numeric datum types. Integers wrap on overflow.
pub trait Arithmetic: Datum {
    fn add(a: Self, b: Self) -> Self;
    fn sub(a: Self, b: Self) -> Self;
    fn mul(a: Self, b: Self) -> Self;
    /// Integer division by zero yields zero: callers check divisors first.
    fn div(a: Self, b: Self) -> Self;
}

macro_rules! int_arithmetic {
    ($($t:ty),*) => { $(
        impl Arithmetic for $t {
            fn add(a: Self, b: Self) -> Self { a.wrapping_add(b) }
            fn sub(a: Self, b: Self) -> Self { a.wrapping_sub(b) }
            fn mul(a: Self, b: Self) -> Self { a.wrapping_mul(b) }
            fn div(a: Self, b: Self) -> Self { a.checked_div(b).unwrap_or_default() }
        }
    )* };
}

macro_rules! float_arithmetic {
    ($($t:ty),*) => { $(
        impl Arithmetic for $t {
            fn add(a: Self, b: Self) -> Self { a + b }
            fn sub(a: Self, b: Self) -> Self { a - b }
            fn mul(a: Self, b: Self) -> Self { a * b }
            fn div(a: Self, b: Self) -> Self { a / b }
        }
    )* };
}

int_arithmetic!(u8, i32, i64);
float_arithmetic!(f16, f32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
}

impl BinaryKind {
    pub const ALL: [BinaryKind; 6] = [
        BinaryKind::Add,
        BinaryKind::Subtract,
        BinaryKind::Multiply,
        BinaryKind::Divide,
        BinaryKind::Maximum,
        BinaryKind::Minimum,
    ];

    /// IR layer type.
    pub fn name(&self) -> &'static str {
        match self {
            BinaryKind::Add => "Add",
            BinaryKind::Subtract => "Subtract",
            BinaryKind::Multiply => "Multiply",
            BinaryKind::Divide => "Divide",
            BinaryKind::Maximum => "Maximum",
            BinaryKind::Minimum => "Minimum",
        }
    }

    pub fn from_name(name: &str) -> Option<BinaryKind> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn into_op(self) -> Box<dyn Op> {
        Box::new(TypedBinOp(self))
    }

    fn function<T: Arithmetic>(&self) -> fn(T, T) -> T {
        match self {
            BinaryKind::Add => T::add,
            BinaryKind::Subtract => T::sub,
            BinaryKind::Multiply => T::mul,
            BinaryKind::Divide => T::div,
            BinaryKind::Maximum => |a, b| if a >= b { a } else { b },
            BinaryKind::Minimum => |a, b| if a <= b { a } else { b },
        }
    }

    fn eval_t<T: Arithmetic>(&self, a: &Tensor, b: &Tensor) -> CarveResult<Tensor> {
        let shape = ShapeFact::from(a.shape())
            .broadcast(&ShapeFact::from(b.shape()))?
            .as_concrete()
            .context("Broadcast of concrete shapes is concrete")?;
        let a = a.to_array_view::<T>()?;
        let b = b.to_array_view::<T>()?;
        let a = a
            .broadcast(IxDyn(&shape))
            .with_context(|| format!("Broadcasting {:?} to {:?}", a.shape(), shape))?;
        let b = b
            .broadcast(IxDyn(&shape))
            .with_context(|| format!("Broadcasting {:?} to {:?}", b.shape(), shape))?;
        if *self == BinaryKind::Divide
            && T::datum_type().is_integer()
            && b.iter().any(|x| *x == T::default())
        {
            bail!("Integer division by zero")
        }
        let f = self.function::<T>();
        Ok(Zip::from(&a).and(&b).map_collect(|x, y| f(*x, *y)).into())
    }
}

/// Binary element-wise operation, broadcasting numpy style.
#[derive(Debug, Clone, new, PartialEq)]
pub struct TypedBinOp(pub BinaryKind);

impl Op for TypedBinOp {
    fn name(&self) -> Cow<'_, str> {
        self.0.name().into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![("auto_broadcast".to_string(), "numpy".to_string())]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 2);
        let (a, b) = (inputs[0], inputs[1]);
        ensure!(
            a.datum_type == b.datum_type,
            "{} operands must have the same type, got {:?} and {:?}",
            self.0.name(),
            a,
            b
        );
        ensure!(a.datum_type.is_number(), "{} is not defined on {}", self.0.name(), a.datum_type);
        Ok(tvec!(TypedFact::dt_shape(a.datum_type, a.shape.broadcast(&b.shape)?)))
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        let (a, b) = args_2!(inputs);
        ensure!(a.datum_type() == b.datum_type(), "Mixed types {:?} and {:?}", a, b);
        let dt = a.datum_type();
        let kind = self.0;
        let result = dispatch_numbers!(Self::eval_dispatch(dt)(kind, &a, &b))?;
        Ok(tvec!(result.into_arc_tensor()))
    }

    impl_op_same_as!();
}

impl TypedBinOp {
    fn eval_dispatch<T: Arithmetic>(kind: BinaryKind, a: &Tensor, b: &Tensor) -> CarveResult<Tensor> {
        kind.eval_t::<T>(a, b)
    }
}

//! Tensor type information attached to graph outlets.
use crate::internal::*;

/// Fully typed tensor information: element type, (partial) shape and an
/// optional constant value.
#[derive(Clone, PartialEq)]
pub struct TypedFact {
    /// tensor element type
    pub datum_type: DatumType,
    /// tensor shape
    pub shape: ShapeFact,
    /// optional constant value
    pub konst: Option<Arc<Tensor>>,
}

impl TypedFact {
    pub fn dt_shape(datum_type: DatumType, shape: impl Into<ShapeFact>) -> TypedFact {
        TypedFact { datum_type, shape: shape.into(), konst: None }
    }

    pub fn shape<T: Datum>(shape: impl Into<ShapeFact>) -> TypedFact {
        Self::dt_shape(T::datum_type(), shape)
    }

    pub fn scalar<T: Datum>() -> TypedFact {
        Self::dt_shape(T::datum_type(), ShapeFact::scalar())
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Same type and shape, constant value dropped.
    pub fn without_value(&self) -> TypedFact {
        TypedFact { konst: None, ..self.clone() }
    }

    /// Type matches and every known dimension agrees.
    pub fn compatible_with(&self, other: &TypedFact) -> bool {
        self.datum_type == other.datum_type && self.shape.compatible_with(&other.shape)
    }

    /// Check a concrete tensor could flow through an outlet with this fact.
    pub fn matches(&self, t: &Tensor) -> bool {
        self.datum_type == t.datum_type()
            && self.shape.compatible_with(&ShapeFact::from(t.shape()))
    }
}

impl From<Arc<Tensor>> for TypedFact {
    fn from(t: Arc<Tensor>) -> TypedFact {
        TypedFact {
            datum_type: t.datum_type(),
            shape: ShapeFact::from(t.shape()),
            konst: Some(t),
        }
    }
}

impl From<Tensor> for TypedFact {
    fn from(t: Tensor) -> TypedFact {
        t.into_arc_tensor().into()
    }
}

impl fmt::Debug for TypedFact {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.rank() > 0 {
            write!(fmt, "{},{}", self.shape, self.datum_type)?;
        } else {
            write!(fmt, "{}", self.datum_type)?;
        }
        if let Some(k) = &self.konst {
            write!(fmt, " 🟰 {k:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compatibility_ignores_constant_and_dynamic_dims() {
        let konst: TypedFact = tensor2(&[[1f32, 2.]]).into();
        let dynamic = TypedFact::dt_shape(DatumType::F32, ShapeFact::from_dims([Dim::Any, Dim::Val(2)]));
        assert!(konst.compatible_with(&dynamic));
        assert!(!konst.compatible_with(&TypedFact::shape::<i32>([1, 2])));
        assert!(dynamic.matches(&Tensor::zero::<f32>(&[16, 2])));
        assert!(!dynamic.matches(&Tensor::zero::<f32>(&[16, 3])));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", TypedFact::shape::<f32>([1, 3])), "1,3,f32");
        assert_eq!(format!("{:?}", TypedFact::scalar::<i64>()), "i64");
    }
}

//! Tensor dimensions and shapes, possibly partially known.
use crate::internal::*;
use itertools::Itertools;
use std::fmt;
use std::ops::Deref;

/// A single tensor dimension: a known size, or dynamic.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    Val(usize),
    Any,
}

impl Dim {
    pub fn as_val(&self) -> Option<usize> {
        match self {
            Dim::Val(v) => Some(*v),
            Dim::Any => None,
        }
    }

    pub fn to_usize(&self) -> CarveResult<usize> {
        self.as_val().context("Dynamic dimension where a concrete one is required")
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, Dim::Val(_))
    }

    /// A dynamic dimension is compatible with anything.
    pub fn compatible_with(&self, other: &Dim) -> bool {
        match (self, other) {
            (Dim::Val(a), Dim::Val(b)) => a == b,
            _ => true,
        }
    }

    /// Numpy broadcasting of two dimensions.
    pub fn broadcast(self, other: Dim) -> CarveResult<Dim> {
        match (self, other) {
            (Dim::Val(1), d) | (d, Dim::Val(1)) => Ok(d),
            (Dim::Val(a), Dim::Val(b)) if a == b => Ok(Dim::Val(a)),
            (Dim::Val(a), Dim::Val(b)) => bail!("Can not broadcast {} against {}", a, b),
            (Dim::Any, Dim::Val(v)) | (Dim::Val(v), Dim::Any) => Ok(Dim::Val(v)),
            (Dim::Any, Dim::Any) => Ok(Dim::Any),
        }
    }
}

impl From<usize> for Dim {
    fn from(v: usize) -> Dim {
        Dim::Val(v)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Dim::Val(v) => write!(f, "{v}"),
            Dim::Any => write!(f, "?"),
        }
    }
}

impl fmt::Debug for Dim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for Dim {
    type Err = CarveError;

    fn from_str(s: &str) -> CarveResult<Dim> {
        match s.trim() {
            "?" | "-1" => Ok(Dim::Any),
            s => Ok(Dim::Val(s.parse().with_context(|| format!("Invalid dimension {s:?}"))?)),
        }
    }
}

/// Ordered dimensions of a tensor.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ShapeFact(TVec<Dim>);

impl ShapeFact {
    pub fn from_dims<D: Into<Dim>>(dims: impl IntoIterator<Item = D>) -> ShapeFact {
        ShapeFact(dims.into_iter().map(|d| d.into()).collect())
    }

    pub fn scalar() -> ShapeFact {
        ShapeFact::default()
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn is_concrete(&self) -> bool {
        self.0.iter().all(|d| d.is_concrete())
    }

    /// Shape as plain integers, if every dimension is known.
    pub fn as_concrete(&self) -> Option<TVec<usize>> {
        self.0.iter().map(|d| d.as_val()).collect()
    }

    pub fn volume(&self) -> Option<usize> {
        self.as_concrete().map(|s| s.iter().product())
    }

    pub fn set_dim(&mut self, axis: usize, dim: Dim) -> CarveResult<()> {
        ensure!(axis < self.rank(), "Axis {} out of rank {} shape {}", axis, self.rank(), self);
        self.0[axis] = dim;
        Ok(())
    }

    pub fn compatible_with(&self, other: &ShapeFact) -> bool {
        self.rank() == other.rank()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| a.compatible_with(b))
    }

    /// Numpy multidirectional broadcasting.
    pub fn broadcast(&self, other: &ShapeFact) -> CarveResult<ShapeFact> {
        let rank = self.rank().max(other.rank());
        let pad = |s: &ShapeFact, ix: usize| -> Dim {
            let offset = rank - s.rank();
            if ix < offset { Dim::Val(1) } else { s.0[ix - offset] }
        };
        let dims = (0..rank)
            .map(|ix| pad(self, ix).broadcast(pad(other, ix)))
            .collect::<CarveResult<TVec<Dim>>>()
            .with_context(|| format!("Broadcasting {self} and {other}"))?;
        Ok(ShapeFact(dims))
    }

    /// Parse the comma separated form used by IR `shape` attributes.
    pub fn parse_ir(s: &str) -> CarveResult<ShapeFact> {
        let s = s.trim().trim_start_matches('[').trim_end_matches(']');
        if s.trim().is_empty() {
            return Ok(ShapeFact::scalar());
        }
        Ok(ShapeFact(s.split(',').map(|d| d.parse()).collect::<CarveResult<_>>()?))
    }
}

impl Deref for ShapeFact {
    type Target = [Dim];
    fn deref(&self) -> &[Dim] {
        &self.0
    }
}

impl From<&[usize]> for ShapeFact {
    fn from(it: &[usize]) -> ShapeFact {
        ShapeFact::from_dims(it.iter().copied())
    }
}

impl<const N: usize> From<[usize; N]> for ShapeFact {
    fn from(it: [usize; N]) -> ShapeFact {
        ShapeFact::from_dims(it)
    }
}

impl FromIterator<Dim> for ShapeFact {
    fn from_iter<I: IntoIterator<Item = Dim>>(iter: I) -> ShapeFact {
        ShapeFact(iter.into_iter().collect())
    }
}

impl fmt::Display for ShapeFact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

impl fmt::Debug for ShapeFact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_dims() {
        assert_eq!("?".parse::<Dim>().unwrap(), Dim::Any);
        assert_eq!("-1".parse::<Dim>().unwrap(), Dim::Any);
        assert_eq!(" 12".parse::<Dim>().unwrap(), Dim::Val(12));
        assert!("x".parse::<Dim>().is_err());
    }

    #[test]
    fn parse_ir_shape() {
        let s = ShapeFact::parse_ir("1,?,4").unwrap();
        assert_eq!(s.dims(), &[Dim::Val(1), Dim::Any, Dim::Val(4)]);
        assert_eq!(s.to_string(), "1,?,4");
        assert_eq!(ShapeFact::parse_ir("").unwrap().rank(), 0);
        assert_eq!(ShapeFact::parse_ir("[2,3]").unwrap(), ShapeFact::from([2, 3]));
    }

    #[test]
    fn broadcast_shapes() {
        let a = ShapeFact::from([16, 1, 3]);
        let b = ShapeFact::from([4, 1]);
        assert_eq!(a.broadcast(&b).unwrap(), ShapeFact::from([16, 4, 3]));
        assert!(ShapeFact::from([3]).broadcast(&ShapeFact::from([4])).is_err());
        let dynamic = ShapeFact::from_dims([Dim::Any, Dim::Val(3)]);
        assert_eq!(dynamic.broadcast(&ShapeFact::from([3])).unwrap(), dynamic);
    }

    #[test]
    fn concrete() {
        assert_eq!(ShapeFact::from([2, 3]).volume(), Some(6));
        assert!(!ShapeFact::from_dims([Dim::Any]).is_concrete());
    }

    proptest! {
        #[test]
        fn broadcast_with_ones_is_identity(dims in proptest::collection::vec(1usize..5, 0..4)) {
            let shape = ShapeFact::from(&*dims);
            let ones = ShapeFact::from(&*vec![1usize; dims.len()]);
            prop_assert_eq!(shape.broadcast(&ones).unwrap(), shape.clone());
            prop_assert_eq!(ones.broadcast(&shape).unwrap(), shape);
        }
    }
}

use crate::internal::*;
use crate::ops::binary::Arithmetic;
use ndarray::{Axis, IxDyn};
use rayon::prelude::*;

/// Batched matrix product, numpy `matmul` semantics.
///
/// Rank 1 operands are promoted to matrices (row for `a`, column for `b`)
/// and the promoted axis is removed from the output. Batch axes broadcast.
/// Batches are computed in parallel on the current rayon pool.
#[derive(Debug, Clone, Default, new, PartialEq)]
pub struct MatMul {
    pub transpose_a: bool,
    pub transpose_b: bool,
}

struct Geometry {
    batch: TVec<Dim>,
    m: Dim,
    k: Dim,
    n: Dim,
    a_vector: bool,
    b_vector: bool,
}

impl Geometry {
    fn output_shape(&self) -> ShapeFact {
        let mut shape = self.batch.clone();
        if !self.a_vector {
            shape.push(self.m);
        }
        if !self.b_vector {
            shape.push(self.n);
        }
        shape.into_iter().collect()
    }
}

impl MatMul {
    fn geometry(&self, a: &[Dim], b: &[Dim]) -> CarveResult<Geometry> {
        ensure!(!a.is_empty() && !b.is_empty(), "MatMul operands can not be scalars");
        let a_vector = a.len() == 1;
        let b_vector = b.len() == 1;
        let (a_batch, mut m, mut ka) =
            if a_vector { (&[][..], Dim::Val(1), a[0]) } else { (&a[..a.len() - 2], a[a.len() - 2], a[a.len() - 1]) };
        if self.transpose_a && !a_vector {
            std::mem::swap(&mut m, &mut ka);
        }
        let (b_batch, mut kb, mut n) =
            if b_vector { (&[][..], b[0], Dim::Val(1)) } else { (&b[..b.len() - 2], b[b.len() - 2], b[b.len() - 1]) };
        if self.transpose_b && !b_vector {
            std::mem::swap(&mut kb, &mut n);
        }
        ensure!(ka.compatible_with(&kb), "MatMul inner dimensions mismatch: {} vs {}", ka, kb);
        let k = if ka.is_concrete() { ka } else { kb };
        let batch = a_batch
            .iter()
            .copied()
            .collect::<ShapeFact>()
            .broadcast(&b_batch.iter().copied().collect::<ShapeFact>())?;
        Ok(Geometry { batch: batch.iter().copied().collect(), m, k, n, a_vector, b_vector })
    }

    fn eval_t<T: Arithmetic>(&self, a: &Tensor, b: &Tensor) -> CarveResult<Tensor> {
        let dims = |t: &Tensor| t.shape().iter().map(|d| Dim::Val(*d)).collect::<TVec<_>>();
        let geo = self.geometry(&dims(a), &dims(b))?;
        let batch = geo.batch.iter().map(|d| d.to_usize()).collect::<CarveResult<TVec<usize>>>()?;
        let (m, k, n) = (geo.m.to_usize()?, geo.k.to_usize()?, geo.n.to_usize()?);
        let batch_count: usize = batch.iter().product();

        let mut a = a.to_array_view::<T>()?;
        if geo.a_vector {
            a = a.insert_axis(Axis(0));
        } else if self.transpose_a {
            let rank = a.ndim();
            a.swap_axes(rank - 2, rank - 1);
        }
        let mut b = b.to_array_view::<T>()?;
        if geo.b_vector {
            b = b.insert_axis(Axis(1));
        } else if self.transpose_b {
            let rank = b.ndim();
            b.swap_axes(rank - 2, rank - 1);
        }
        let full = |rows: usize, cols: usize| {
            let mut shape: TVec<usize> = batch.clone();
            shape.push(rows);
            shape.push(cols);
            shape
        };
        let a_shape = full(m, k);
        let a = a
            .broadcast(IxDyn(&a_shape))
            .with_context(|| format!("Broadcasting {:?} to {:?}", a.shape(), a_shape))?
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((batch_count, m, k))?;
        let b_shape = full(k, n);
        let b = b
            .broadcast(IxDyn(&b_shape))
            .with_context(|| format!("Broadcasting {:?} to {:?}", b.shape(), b_shape))?
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((batch_count, k, n))?;

        let products: Vec<Vec<T>> = (0..batch_count)
            .into_par_iter()
            .map(|ix| {
                let a = a.index_axis(Axis(0), ix);
                let b = b.index_axis(Axis(0), ix);
                let mut c = Vec::with_capacity(m * n);
                for i in 0..m {
                    for j in 0..n {
                        let mut acc = T::default();
                        for p in 0..k {
                            acc = T::add(acc, T::mul(a[(i, p)], b[(p, j)]));
                        }
                        c.push(acc);
                    }
                }
                c
            })
            .collect();
        let data: Vec<T> = products.into_iter().flatten().collect();
        let shape = geo.output_shape().as_concrete().context("Concrete shapes only at run time")?;
        Tensor::from_shape(&shape, &data)
    }
}

impl Op for MatMul {
    fn name(&self) -> Cow<'_, str> {
        "MatMul".into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![
            ("transpose_a".to_string(), self.transpose_a.to_string()),
            ("transpose_b".to_string(), self.transpose_b.to_string()),
        ]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 2);
        let (a, b) = (inputs[0], inputs[1]);
        ensure!(a.datum_type == b.datum_type, "MatMul operands types differ: {:?} and {:?}", a, b);
        ensure!(a.datum_type.is_number(), "MatMul is not defined on {}", a.datum_type);
        let geo = self.geometry(&a.shape, &b.shape)?;
        Ok(tvec!(TypedFact::dt_shape(a.datum_type, geo.output_shape())))
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        let (a, b) = args_2!(inputs);
        ensure!(a.datum_type() == b.datum_type(), "Mixed types {:?} and {:?}", a, b);
        let dt = a.datum_type();
        let c = dispatch_numbers!(Self::eval_t(dt)(self, &a, &b))?;
        Ok(tvec!(c.into_arc_tensor()))
    }

    impl_op_same_as!();
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(op: MatMul, a: Tensor, b: Tensor) -> Tensor {
        let out = op.eval(tvec!(a.into_arc_tensor(), b.into_arc_tensor())).unwrap();
        (*out[0]).clone()
    }

    #[test]
    fn plain_product() {
        let a = tensor2(&[[1f32, 2.], [3., 4.]]);
        let b = tensor2(&[[5f32, 6.], [7., 8.]]);
        assert_eq!(run(MatMul::default(), a, b), tensor2(&[[19f32, 22.], [43., 50.]]));
    }

    #[test]
    fn transposed_b() {
        let a = tensor2(&[[1f32, 2.]]);
        let b = tensor2(&[[3f32, 4.], [5., 6.], [7., 8.]]);
        assert_eq!(run(MatMul::new(false, true), a, b), tensor2(&[[11f32, 17., 23.]]));
    }

    #[test]
    fn vector_operands() {
        let a = tensor1(&[1i32, 2]);
        let b = tensor2(&[[1i32, 0, 2], [0, 1, 3]]);
        assert_eq!(run(MatMul::default(), a, b), tensor1(&[1i32, 2, 8]));
    }

    #[test]
    fn batched_broadcast() {
        let a = Tensor::from_shape(&[3, 1, 2], &[1f32, 0., 0., 1., 1., 1.]).unwrap();
        let b = tensor2(&[[2f32], [3.]]);
        let c = run(MatMul::default(), a, b);
        assert_eq!(c.shape(), &[3, 1, 1]);
        assert_eq!(c.to_vec::<f32>().unwrap(), vec![2., 3., 5.]);
    }

    #[test]
    fn facts_with_dynamic_batch() {
        let a = TypedFact::dt_shape(DatumType::F32, ShapeFact::from_dims([Dim::Any, Dim::Val(4)]));
        let b = TypedFact::shape::<f32>([4, 8]);
        let c = MatMul::default().output_facts(&[&a, &b]).unwrap();
        assert_eq!(c[0].shape, ShapeFact::from_dims([Dim::Any, Dim::Val(8)]));
        let bad = TypedFact::shape::<f32>([5, 8]);
        assert!(MatMul::default().output_facts(&[&a, &bad]).is_err());
    }
}

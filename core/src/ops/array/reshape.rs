use crate::internal::*;

/// Reshape to a target given by a constant second input. With
/// `special_zero`, a 0 copies the input dimension at the same position.
/// One -1 at most is inferred from the element count.
#[derive(Debug, Clone, new, PartialEq)]
pub struct Reshape {
    pub special_zero: bool,
}

impl Reshape {
    pub fn compute_shape(&self, input: &[Dim], target: &[i64]) -> CarveResult<TVec<Dim>> {
        let mut shape: TVec<Dim> = tvec!();
        let mut copied: TVec<usize> = tvec!();
        let mut inferred = None;
        for (ix, &d) in target.iter().enumerate() {
            match d {
                -1 => {
                    ensure!(inferred.is_none(), "Reshape target {:?} has more than one -1", target);
                    inferred = Some(ix);
                    shape.push(Dim::Val(1));
                }
                0 if self.special_zero => {
                    let dim = *input
                        .get(ix)
                        .with_context(|| format!("Reshape target {target:?} copies a missing axis"))?;
                    copied.push(ix);
                    shape.push(dim);
                }
                d if d >= 0 => shape.push(Dim::Val(d as usize)),
                d => bail!("Invalid reshape dimension {}", d),
            }
        }
        // Dimensions copied from the input cancel out in the volume ratio.
        let volume = |dims: &[Dim], skip: Option<usize>| -> Option<usize> {
            dims.iter()
                .enumerate()
                .filter(|(ix, _)| !copied.contains(ix) && Some(*ix) != skip)
                .map(|(_, d)| d.as_val())
                .product()
        };
        let input_volume = volume(input, None);
        let known_volume = volume(&shape, inferred);
        if let Some(ix) = inferred {
            shape[ix] = match (input_volume, known_volume) {
                (Some(i), Some(k)) => {
                    ensure!(k != 0 && i % k == 0, "Can not reshape {:?} to {:?}", input, target);
                    Dim::Val(i / k)
                }
                _ => Dim::Any,
            };
        } else if let (Some(i), Some(k)) = (input_volume, known_volume) {
            ensure!(i == k, "Can not reshape {:?} to {:?}", input, target);
        }
        Ok(shape)
    }
}

impl Op for Reshape {
    fn name(&self) -> Cow<'_, str> {
        "Reshape".into()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        vec![("special_zero".to_string(), self.special_zero.to_string())]
    }

    fn output_facts(&self, inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        check_input_arity!(self, inputs, 2);
        let target = inputs[1].konst.as_ref().context("Reshape target shape must be a constant")?;
        let shape = self.compute_shape(&inputs[0].shape, &target.to_i64_vec()?)?;
        Ok(tvec!(TypedFact::dt_shape(inputs[0].datum_type, shape.into_iter().collect::<ShapeFact>())))
    }

    fn eval(&self, mut inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        let (input, target) = args_2!(inputs);
        let dims = input.shape().iter().map(|d| Dim::Val(*d)).collect::<TVec<_>>();
        let shape = self.compute_shape(&dims, &target.to_i64_vec()?)?;
        let shape = shape.iter().map(|d| d.to_usize()).collect::<CarveResult<TVec<usize>>>()?;
        let input = Arc::try_unwrap(input).unwrap_or_else(|shared| (*shared).clone());
        Ok(tvec!(input.into_shape(&shape)?.into_arc_tensor()))
    }

    impl_op_same_as!();
}

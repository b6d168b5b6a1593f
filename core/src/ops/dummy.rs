use crate::internal::*;

/// Placeholder left in place of obliterated nodes, until compaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dummy;

impl Op for Dummy {
    fn name(&self) -> Cow<'_, str> {
        "Dummy".into()
    }

    fn output_facts(&self, _inputs: &[&TypedFact]) -> CarveResult<TVec<TypedFact>> {
        Ok(tvec!())
    }

    fn eval(&self, _inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
        bail!("eval() called on a Dummy op. This is a bug.")
    }
}

use super::{InputStrategy, Splicer, TensorRef};
use crate::internal::*;
use crate::ops::io::Output;

impl Splicer<'_> {
    /// Expose each referenced tensor as a model output.
    pub fn splice_outputs<S: AsRef<str>>(&mut self, references: &[S]) -> CarveResult<()> {
        for reference in references {
            let reference = reference.as_ref();
            self.splice_output(reference).with_context(|| format!("Splicing output {reference:?}"))?;
        }
        Ok(())
    }

    /// A new Result taps the port, existing consumers are left untouched.
    pub fn splice_output(&mut self, reference: &str) -> CarveResult<()> {
        let tref: TensorRef = reference.parse()?;
        if tref.port.is_none() && self.options.strategy == InputStrategy::PortOnly {
            warn!("{:?} is not a tensor name, skipped", reference);
            return Ok(());
        }
        let id = self.index.resolve(&tref.op)?;
        let node = self.graph.node(id);
        if node.op_is::<Output>() {
            info!("Keeping original result {}", node.name);
            self.add_output(id);
            return Ok(());
        }
        let port = match tref.port {
            Some(port) => port,
            None => {
                ensure!(
                    node.outputs.len() == 1,
                    "Operation {:?} has {} outputs, designate one as {}:<port>",
                    node.name,
                    node.outputs.len(),
                    node.name
                );
                0
            }
        };
        ensure!(
            port < node.outputs.len(),
            "Operation {:?} has no output port {} ({} outputs)",
            node.name,
            port,
            node.outputs.len()
        );
        let outlet = OutletId::new(id, port);
        if let Some(&result) = self.spliced_outputs.get(&outlet) {
            debug!("{} already spliced as output", reference);
            self.add_output(result);
            return Ok(());
        }
        if self.graph.outlet_names(outlet).is_empty() {
            self.graph.add_outlet_name(outlet, reference);
        }
        let name = self.graph.unique_name(reference).into_owned();
        let mut patch = ModelPatch::new(format!("splicing {reference} as output"));
        let tap = patch.tap_model(self.graph, outlet)?;
        let result = patch.add_result(name, tap)?;
        let mapping = patch.apply(self.graph)?;
        let result = *mapping.get(&result).context("Result missing from patch")?;
        info!("New result {} for {}", self.graph.node(result).name, reference);
        self.spliced_outputs.insert(outlet, result);
        self.add_output(result);
        Ok(())
    }
}

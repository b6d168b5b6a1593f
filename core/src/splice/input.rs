use super::{InputStrategy, Splicer, TensorRef};
use crate::internal::*;
use crate::ops::io::Parameter;
use crate::ops::konst::Const;

impl Splicer<'_> {
    /// Turn each referenced tensor into a model input.
    pub fn splice_inputs<S: AsRef<str>>(&mut self, references: &[S]) -> CarveResult<()> {
        for reference in references {
            let reference = reference.as_ref();
            self.splice_input(reference).with_context(|| format!("Splicing input {reference:?}"))?;
        }
        Ok(())
    }

    pub fn splice_input(&mut self, reference: &str) -> CarveResult<()> {
        let tref: TensorRef = reference.parse()?;
        if tref.port.is_none() && self.options.strategy == InputStrategy::PortOnly {
            warn!("{:?} is not a tensor name, skipped", reference);
            return Ok(());
        }
        let id = self.index.resolve(&tref.op)?;
        let node = self.graph.node(id);
        if let Some(port) = tref.port {
            ensure!(
                port < node.outputs.len(),
                "Operation {:?} has no output port {} ({} outputs)",
                node.name,
                port,
                node.outputs.len()
            );
        }
        if node.op_is::<Parameter>() {
            info!("Keeping original parameter {}", node.name);
            self.add_input(id);
            return Ok(());
        }
        match tref.port {
            Some(port) => self.splice_port(OutletId::new(id, port), reference),
            None => self.splice_edges(id),
        }
    }

    /// The new Parameter replaces the port for every consumer.
    fn splice_port(&mut self, outlet: OutletId, reference: &str) -> CarveResult<()> {
        let param = self.input_parameter(outlet, reference)?;
        let mut patch = ModelPatch::new(format!("splicing {reference} as input"));
        let tap = patch.tap_model(self.graph, OutletId::new(param, 0))?;
        patch.shunt_outside(self.graph, outlet, tap)?;
        patch.apply(self.graph)?;
        self.add_input(param);
        Ok(())
    }

    /// One Parameter per non-constant input edge of the node, only this
    /// node is rewired.
    fn splice_edges(&mut self, id: usize) -> CarveResult<()> {
        let inputs = self.graph.node(id).inputs.clone();
        let mut patch = ModelPatch::new(format!("splicing inputs of {}", self.graph.node(id).name));
        for (slot, source) in inputs.into_iter().enumerate() {
            let source_node = self.graph.node(source.node);
            if source_node.op_is::<Const>() {
                debug!("Input #{} of {} is constant, kept", slot, self.graph.node(id).name);
                continue;
            }
            if source_node.op_is::<Parameter>() {
                info!("Keeping original parameter {}", source_node.name);
                self.add_input(source.node);
                continue;
            }
            let reference = format!("{}:{}", source_node.name, source.slot);
            let param = self.input_parameter(source, &reference)?;
            let tap = patch.tap_model(self.graph, OutletId::new(param, 0))?;
            patch.shunt_inlet(self.graph, InletId::new(id, slot), tap)?;
            self.add_input(param);
        }
        patch.apply(self.graph)?;
        Ok(())
    }

    /// The Parameter standing for `outlet`, created on first use.
    ///
    /// The new Parameter takes over the tensor names of the port, the
    /// reference being one of them.
    fn input_parameter(&mut self, outlet: OutletId, reference: &str) -> CarveResult<usize> {
        if let Some(&param) = self.spliced_inputs.get(&outlet) {
            debug!("{} already spliced as input", reference);
            return Ok(param);
        }
        let fact = self.graph.outlet_fact(outlet)?.without_value();
        let name = self.graph.unique_name(reference).into_owned();
        let param = self.graph.add_parameter(name, fact)?;
        for name in self.graph.take_outlet_names(outlet) {
            self.graph.add_outlet_name(param, name);
        }
        self.graph.add_outlet_name(param, reference);
        info!("New parameter {} for {}", self.graph.node(param.node).name, reference);
        self.spliced_inputs.insert(outlet, param.node);
        Ok(param.node)
    }
}

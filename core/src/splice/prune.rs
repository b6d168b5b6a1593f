use super::{Boundary, NameIndex, Splicer};
use crate::internal::*;

impl Splicer<'_> {
    /// Reduce the interface to the spliced boundary, then garbage-collect
    /// the graph.
    ///
    /// Parameters and results come out in target order. A deregistered
    /// Parameter still needed by a surviving result is caught by validation.
    pub fn prune(&mut self) -> CarveResult<Boundary> {
        let boundary = self.boundary();
        for &p in &self.graph.parameters {
            if !self.inputs.contains(&p) {
                info!("Removing parameter {}", self.graph.node(p).name);
            }
        }
        self.graph.parameters = self.inputs.clone();
        let mut patch = ModelPatch::new("pruning results");
        for &r in &self.graph.results {
            if !self.outputs.contains(&r) {
                info!("Removing result {}", self.graph.node(r).name);
                patch.obliterate(r)?;
            }
        }
        self.graph.results = self.outputs.clone();
        patch.apply(self.graph)?;
        self.graph.compact()?;
        self.inputs = self.graph.parameters.clone();
        self.outputs = self.graph.results.clone();
        self.index = NameIndex::new(self.graph)?;
        self.spliced_inputs.clear();
        self.spliced_outputs.clear();
        Ok(boundary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::binary::BinaryKind;
    use crate::splice::{InputStrategy, SpliceOptions};

    // a -> relu -> mul(relu, b) -> out
    //         \--> exp --------> out2
    fn model() -> Graph {
        let mut model = Graph::default();
        let a = model.add_parameter("a", TypedFact::shape::<f32>([1, 2])).unwrap();
        let b = model.add_parameter("b", TypedFact::shape::<f32>([1, 2])).unwrap();
        let relu = model.wire_node("relu", UnaryKind::Relu.into_op(), &[a]).unwrap()[0];
        let mul = model.wire_node("mul", BinaryKind::Multiply.into_op(), &[relu, b]).unwrap()[0];
        let exp = model.wire_node("exp", UnaryKind::Exp.into_op(), &[relu]).unwrap()[0];
        model.add_result("out", mul).unwrap();
        model.add_result("out2", exp).unwrap();
        model
    }

    #[test]
    fn interface_is_the_boundary() {
        let mut model = model();
        let boundary = {
            let mut splicer = Splicer::new(&mut model, &SpliceOptions::default()).unwrap();
            splicer.splice_inputs(&["relu:0"]).unwrap();
            splicer.splice_outputs(&["exp:0"]).unwrap();
            splicer.prune().unwrap()
        };
        assert_eq!(boundary, Boundary { inputs: vec!["relu:0".into()], outputs: vec!["exp:0".into()] });
        model.validate().unwrap();
        let names = |ids: &[usize]| ids.iter().map(|&id| model.node(id).name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&model.parameters), boundary.inputs);
        assert_eq!(names(&model.results), boundary.outputs);
        assert_eq!(model.nodes().len(), 3);
        assert!(model.node_by_name("mul").is_err());
        assert!(model.node_by_name("a").is_err());
    }

    #[test]
    fn dropped_parameter_still_in_use_is_reported() {
        let mut model = model();
        {
            let options = SpliceOptions::default().with_strategy(InputStrategy::AllEdges);
            let mut splicer = Splicer::new(&mut model, &options).unwrap();
            splicer.splice_inputs(&["relu:0"]).unwrap();
            splicer.splice_outputs(&["mul"]).unwrap();
            splicer.prune().unwrap();
        }
        let err = model.validate().unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }
}

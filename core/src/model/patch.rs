use std::ops::{Deref, DerefMut};

use crate::internal::*;
use crate::ops::dummy::Dummy;
use crate::ops::io::Parameter;

/// A change to apply to a model.
///
/// Actually structured around a model that represent the new nodes to be
/// inserted, plus information about how to connect these new nodes to the
/// pre-existing graph.
#[derive(Clone, Debug, Default)]
pub struct ModelPatch {
    /// patch label for auditing and debugging
    pub context: Vec<String>,
    /// the model-like 'patch' of nodes to add to the model
    pub model: Graph,
    /// map of patch inputs to model wires
    pub incoming: HashMap<OutletId, OutletId>,
    /// map of old wires to be replaced by new wires
    pub shunt_outlet_by: HashMap<OutletId, OutletId>,
    /// map of single model inlets to be rewired to new wires
    pub shunt_inlet_by: HashMap<InletId, OutletId>,
    /// operations to discard from the model
    pub obliterate: Vec<usize>,
}

impl Deref for ModelPatch {
    type Target = Graph;
    fn deref(&self) -> &Graph {
        &self.model
    }
}

impl DerefMut for ModelPatch {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut self.model
    }
}

impl ModelPatch {
    pub fn new(s: impl Into<String>) -> Self {
        Self::default().with_context(s)
    }

    pub fn with_context(mut self, s: impl Into<String>) -> Self {
        self.context.push(s.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.model.nodes.is_empty()
            && self.shunt_outlet_by.is_empty()
            && self.shunt_inlet_by.is_empty()
            && self.obliterate.is_empty()
    }

    /// Draw a tap from a preexisting node.
    ///
    /// returns an OutletId usable in the little "patch" model
    pub fn tap_model(&mut self, model: &Graph, outlet: OutletId) -> CarveResult<OutletId> {
        let fact = model.outlet_fact(outlet)?.clone();
        let name = format!("incoming-{}/{}", outlet.node, outlet.slot);
        let id = self.model.add_node(name, Parameter::new(fact.without_value()), tvec!(fact))?;
        let id = OutletId::new(id, 0);
        self.incoming.insert(id, outlet);
        Ok(id)
    }

    /// Replace an Outlet in the target model by one from the patch.
    ///
    /// Every successor of `outlet` will read from `by` instead.
    pub fn shunt_outside(&mut self, model: &Graph, outlet: OutletId, by: OutletId) -> CarveResult<()> {
        let original_fact = model.outlet_fact(outlet)?;
        let new_fact = self.model.outlet_fact(by)?;
        if !original_fact.compatible_with(new_fact) {
            bail!("Trying to substitute a {:?} by {:?}.\n{:?}", original_fact, new_fact, self.context);
        }
        self.shunt_outlet_by.insert(outlet, by);
        Ok(())
    }

    /// Rewire a single inlet of the target model to a patch wire.
    pub fn shunt_inlet(&mut self, model: &Graph, inlet: InletId, by: OutletId) -> CarveResult<()> {
        let node = &model.nodes()[inlet.node];
        let source = *node
            .inputs
            .get(inlet.slot)
            .with_context(|| format!("Node {} has no input {}", node, inlet.slot))?;
        let original_fact = model.outlet_fact(source)?;
        let new_fact = self.model.outlet_fact(by)?;
        if !original_fact.compatible_with(new_fact) {
            bail!("Trying to feed {:?} with {:?} instead of {:?}", inlet, new_fact, original_fact);
        }
        self.shunt_inlet_by.insert(inlet, by);
        Ok(())
    }

    pub fn obliterate(&mut self, node: usize) -> CarveResult<()> {
        self.obliterate.push(node);
        Ok(())
    }

    /// Apply all changes in the patch to the target model.
    ///
    /// Returns the target node id of each patch node (taps excluded).
    /// Registered parameters and results of the patch model are registered
    /// in the target, after the existing ones.
    pub fn apply(self, target: &mut Graph) -> CarveResult<HashMap<usize, usize>> {
        let ModelPatch {
            model: patch,
            incoming: mut mapping,
            shunt_outlet_by,
            shunt_inlet_by,
            obliterate,
            context,
        } = self;
        trace!("Applying patch {:?}", context);
        let mut nodes_mapping = HashMap::new();
        let mut all_inputs = HashMap::new(); // new_node_id_in_model -> [ patch_outlet_id ]
        let Graph { nodes, parameters, results, mut outlet_names, .. } = patch;
        for node in nodes {
            if node.op_is::<Parameter>() && mapping.contains_key(&OutletId::new(node.id, 0)) {
                // this is a tap
                continue;
            }
            let Node { id, name, inputs, op, outputs } = node;
            let n_outputs = outputs.len();
            let facts = outputs.into_iter().map(|of| of.fact).collect();
            let added_node_id = target.add_node(name, op, facts)?;
            nodes_mapping.insert(id, added_node_id);
            for ix in 0..n_outputs {
                mapping.insert(OutletId::new(id, ix), OutletId::new(added_node_id, ix));
                for name in outlet_names.remove(&OutletId::new(id, ix)).unwrap_or_default() {
                    target.add_outlet_name(OutletId::new(added_node_id, ix), name);
                }
            }
            all_inputs.insert(added_node_id, inputs);
        }
        for (outlet, by) in shunt_outlet_by {
            let fixed_by = mapping[&by];
            let succs = target.nodes()[outlet.node].outputs[outlet.slot].successors.clone();
            for succ in succs {
                target.add_edge(fixed_by, succ)?;
            }
        }
        for (inlet, by) in shunt_inlet_by {
            target.add_edge(mapping[&by], inlet)?;
        }
        for (node, inputs) in all_inputs {
            for (ix, input) in inputs.into_iter().enumerate() {
                target.add_edge(mapping[&input], InletId::new(node, ix))?;
            }
        }
        for node in obliterate {
            target.node_mut(node).op = Box::new(Dummy);
        }
        for p in parameters {
            if let Some(id) = nodes_mapping.get(&p) {
                target.parameters.push(*id);
            }
        }
        for r in results {
            if let Some(id) = nodes_mapping.get(&r) {
                target.results.push(*id);
            }
        }
        Ok(nodes_mapping)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::binary::BinaryKind;
    use crate::ops::io::Output;

    fn model() -> Graph {
        let mut model = Graph::default();
        let a = model.add_parameter("a", TypedFact::shape::<f32>([2])).unwrap();
        let relu = model.wire_node("relu", UnaryKind::Relu.into_op(), &[a]).unwrap()[0];
        let exp = model.wire_node("exp", UnaryKind::Exp.into_op(), &[relu]).unwrap()[0];
        let tanh = model.wire_node("tanh", UnaryKind::Tanh.into_op(), &[relu]).unwrap()[0];
        let add = model.wire_node("add", BinaryKind::Add.into_op(), &[exp, tanh]).unwrap()[0];
        model.add_result("output", add).unwrap();
        model
    }

    #[test]
    fn shunt_outside_moves_every_successor() {
        let mut model = model();
        let relu = OutletId::new(1, 0);
        let mut patch = ModelPatch::new("test");
        let tap = patch.tap_model(&model, relu).unwrap();
        let neg = patch.wire_node("neg", UnaryKind::Negative.into_op(), &[tap]).unwrap()[0];
        patch.shunt_outside(&model, relu, neg).unwrap();
        let mapping = patch.apply(&mut model).unwrap();
        let neg = mapping[&neg.node];
        assert_eq!(model.outlet_successors(relu), &[InletId::new(neg, 0)]);
        assert_eq!(model.outlet_successors(OutletId::new(neg, 0)).len(), 2);
        model.validate().unwrap();
    }

    #[test]
    fn shunt_inlet_rewires_one_inlet() {
        let mut model = model();
        let mut patch = ModelPatch::new("test");
        let p = patch.add_parameter("p", TypedFact::shape::<f32>([2])).unwrap();
        patch.shunt_inlet(&model, InletId::new(3, 0), p).unwrap();
        let mapping = patch.apply(&mut model).unwrap();
        let p = mapping[&p.node];
        assert_eq!(model.parameters, vec![0, p]);
        assert_eq!(model.nodes[3].inputs, vec![OutletId::new(p, 0)]);
        assert_eq!(model.outlet_successors(OutletId::new(1, 0)), &[InletId::new(2, 0)]);
        model.validate().unwrap();
    }

    #[test]
    fn incompatible_shunt_is_refused() {
        let model = model();
        let mut patch = ModelPatch::new("test");
        let p = patch.add_parameter("p", TypedFact::shape::<f32>([3])).unwrap();
        assert!(patch.shunt_outside(&model, OutletId::new(1, 0), p).is_err());
    }

    #[test]
    fn obliterated_nodes_become_dummies() {
        let mut model = model();
        let mut patch = ModelPatch::default();
        patch.obliterate(5).unwrap();
        patch.apply(&mut model).unwrap();
        assert!(model.nodes[5].op_is::<Dummy>());
        assert!(!model.nodes[5].op_is::<Output>());
        assert!(model.validate().is_err());
    }
}

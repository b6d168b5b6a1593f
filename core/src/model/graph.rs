use super::order;
use crate::internal::*;
use crate::ops::dummy::Dummy;
use crate::ops::io::{Output, Parameter};
use crate::ops::konst::Const;
use carve_data::itertools::Itertools;
use std::collections::HashSet;
use std::fmt;

/// Main model class.
///
/// An arena of nodes. Graph inputs are `Parameter` nodes, outputs are
/// `Result` nodes; only the registered ones (`parameters`, `results`) form
/// the model interface.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    /// model name, as found in the IR
    pub name: String,
    /// all nodes in the model
    pub nodes: Vec<Node>,
    /// registered Parameter nodes, in interface order
    pub parameters: Vec<usize>,
    /// registered Result nodes, in interface order
    pub results: Vec<usize>,
    /// tensor names attached to outlets
    pub outlet_names: HashMap<OutletId, Vec<String>>,
}

impl Graph {
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn Op>>,
        output_facts: TVec<TypedFact>,
    ) -> CarveResult<usize> {
        let op = op.into();
        let name = name.into();
        let id = self.nodes.len();
        let outputs =
            output_facts.into_iter().map(|fact| Outlet { fact, successors: tvec!() }).collect();
        let node = Node { id, name, op, inputs: vec![], outputs };
        self.nodes.push(node);
        Ok(id)
    }

    /// Connect a node outlet to a node inlet.
    pub fn add_edge(&mut self, outlet: OutletId, inlet: InletId) -> CarveResult<()> {
        ensure!(outlet.node < self.nodes.len(), "Invalid outlet {:?}", outlet);
        ensure!(inlet.node < self.nodes.len(), "Invalid inlet {:?}", inlet);
        ensure!(
            outlet.slot < self.nodes[outlet.node].outputs.len(),
            "Node {} has no output port {}",
            self.nodes[outlet.node],
            outlet.slot
        );
        if let Some(previous) = self.nodes[inlet.node].inputs.get(inlet.slot).cloned() {
            self.nodes[previous.node].outputs[previous.slot]
                .successors
                .retain(|succ| *succ != inlet);
        }
        self.nodes[outlet.node].outputs[outlet.slot].successors.push(inlet);
        let succ = &mut self.nodes[inlet.node];
        #[allow(clippy::comparison_chain)]
        if inlet.slot == succ.inputs.len() {
            succ.inputs.push(outlet);
        } else if inlet.slot < succ.inputs.len() {
            succ.inputs[inlet.slot] = outlet;
        } else {
            bail!(
                "Edges must be added in order and consecutive. Trying to connect input {:?} of node {}",
                inlet.slot,
                succ
            )
        }
        Ok(())
    }

    /// Add a node, infer its output facts and connect its inputs.
    pub fn wire_node(
        &mut self,
        name: impl Into<String>,
        op: impl Into<Box<dyn Op>>,
        inputs: &[OutletId],
    ) -> CarveResult<TVec<OutletId>> {
        let name = name.into();
        let op = op.into();
        let input_facts = inputs
            .iter()
            .map(|o| self.outlet_fact(*o).cloned())
            .collect::<CarveResult<TVec<_>>>()?;
        let input_facts: TVec<&TypedFact> = input_facts.iter().collect();
        let output_facts = op
            .output_facts(&input_facts)
            .with_context(|| format!("wiring {} ({}), determining output facts", name, op))?;
        let id = self.add_node(name, op, output_facts)?;
        for (ix, i) in inputs.iter().enumerate() {
            self.add_edge(*i, InletId::new(id, ix))?;
        }
        Ok((0..self.nodes[id].outputs.len()).map(|ix| OutletId::new(id, ix)).collect())
    }

    pub fn add_const(
        &mut self,
        name: impl Into<String>,
        v: impl IntoArcTensor,
    ) -> CarveResult<OutletId> {
        let v = v.into_arc_tensor();
        let fact = TypedFact::from(v.clone());
        let id = self.add_node(name, Const::new(v), tvec!(fact))?;
        Ok(OutletId::new(id, 0))
    }

    /// Add and register a model input.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        fact: TypedFact,
    ) -> CarveResult<OutletId> {
        let fact = fact.without_value();
        let id = self.add_node(name, Parameter::new(fact.clone()), tvec!(fact))?;
        self.parameters.push(id);
        Ok(OutletId::new(id, 0))
    }

    /// Add and register a model output reading `outlet`.
    pub fn add_result(&mut self, name: impl Into<String>, outlet: OutletId) -> CarveResult<usize> {
        let id = self.add_node(name, Output, tvec!())?;
        self.add_edge(outlet, InletId::new(id, 0))?;
        self.results.push(id);
        Ok(id)
    }

    /// Change the fact of a Parameter node, keeping op and outlet in sync.
    pub fn set_parameter_fact(&mut self, id: usize, fact: TypedFact) -> CarveResult<()> {
        let fact = fact.without_value();
        let node = &mut self.nodes[id];
        ensure!(node.op_is::<Parameter>(), "Node {} is not a Parameter", node);
        node.op = Box::new(Parameter::new(fact.clone()));
        node.outputs[0].fact = fact;
        Ok(())
    }

    // nodes and their facts

    pub fn node_id_by_name(&self, name: &str) -> CarveResult<usize> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.id)
            .with_context(|| format!("No node found for name: \"{name}\""))
    }

    /// Find a node by its name.
    pub fn node_by_name(&self, name: impl AsRef<str>) -> CarveResult<&Node> {
        let id: usize = self.node_id_by_name(name.as_ref())?;
        Ok(&self.nodes[id])
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Get input tensor information for a node.
    pub fn node_input_facts(&self, node_id: usize) -> CarveResult<TVec<&TypedFact>> {
        self.nodes[node_id].inputs.iter().map(|o| self.outlet_fact(*o)).collect()
    }

    // outlets

    /// Get tensor information for a single outlet.
    pub fn outlet_fact(&self, outlet: OutletId) -> CarveResult<&TypedFact> {
        ensure!(outlet.node < self.nodes.len(), "Invalid outlet for graph: {:?}", outlet);
        self.nodes[outlet.node]
            .outputs
            .get(outlet.slot)
            .map(|o| &o.fact)
            .with_context(|| format!("Invalid outlet reference: {outlet:?}"))
    }

    pub fn outlet_successors(&self, outlet: OutletId) -> &[InletId] {
        &self.nodes[outlet.node].outputs[outlet.slot].successors
    }

    // tensor names

    pub fn outlet_names(&self, outlet: OutletId) -> &[String] {
        self.outlet_names.get(&outlet).map(|v| &**v).unwrap_or(&[])
    }

    pub fn add_outlet_name(&mut self, outlet: OutletId, name: impl Into<String>) {
        let name = name.into();
        let names = self.outlet_names.entry(outlet).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn take_outlet_names(&mut self, outlet: OutletId) -> Vec<String> {
        self.outlet_names.remove(&outlet).unwrap_or_default()
    }

    // interface

    /// Outlets of the registered parameters.
    pub fn input_outlets(&self) -> TVec<OutletId> {
        self.parameters.iter().map(|&id| OutletId::new(id, 0)).collect()
    }

    /// Outlets feeding the registered results.
    pub fn output_outlets(&self) -> CarveResult<TVec<OutletId>> {
        self.results
            .iter()
            .map(|&id| {
                self.nodes[id]
                    .inputs
                    .first()
                    .copied()
                    .with_context(|| format!("Result {} is not connected", self.nodes[id]))
            })
            .collect()
    }

    pub fn input_fact(&self, ix: usize) -> CarveResult<&TypedFact> {
        let id = *self.parameters.get(ix).with_context(|| format!("No input #{ix}"))?;
        self.outlet_fact(OutletId::new(id, 0))
    }

    pub fn output_fact(&self, ix: usize) -> CarveResult<&TypedFact> {
        let outlet = *self.output_outlets()?.get(ix).with_context(|| format!("No output #{ix}"))?;
        self.outlet_fact(outlet)
    }

    /// Count of (node, parameters, results), as seen from the graph outputs.
    pub fn op_count(&self) -> CarveResult<(usize, usize, usize)> {
        let order = self.eval_order()?;
        let extra = self.parameters.iter().filter(|p| !order.contains(p)).count();
        Ok((order.len() + extra, self.parameters.len(), self.results.len()))
    }

    // misc

    /// Computes an evalutation order for the graph inputs and outputs
    pub fn eval_order(&self) -> CarveResult<Vec<usize>> {
        order::eval_order(self)
    }

    /// Evaluation order covering every node of the arena, reachable or not.
    pub fn full_order(&self) -> CarveResult<Vec<usize>> {
        let all = (0..self.nodes.len()).collect_vec();
        order::eval_order_for_nodes(&self.nodes, &[], &all)
    }

    /// Performs a sanity check on network connections.
    pub fn check_edges(&self) -> CarveResult<()> {
        for node in &self.nodes {
            for (ix, input) in node.inputs.iter().enumerate() {
                let prec = self
                    .nodes
                    .get(input.node)
                    .with_context(|| format!("Node {} reads from missing node {:?}", node, input))?;
                let outlet = prec.outputs.get(input.slot).with_context(|| {
                    format!("Node {} reads from missing outlet {:?}", node, input)
                })?;
                if !outlet.successors.contains(&InletId::new(node.id, ix)) {
                    bail!(
                        "Mismatched oncoming edge, node:{} input:{} from {:?} not reciprocated",
                        node,
                        ix,
                        input
                    )
                }
            }
            for (ix, output) in node.outputs.iter().enumerate() {
                for succ in &output.successors {
                    let reciprocated = self
                        .nodes
                        .get(succ.node)
                        .and_then(|n| n.inputs.get(succ.slot))
                        .is_some_and(|o| *o == OutletId::new(node.id, ix));
                    if !reciprocated {
                        bail!(
                            "Mismatched outgoing edge, node:{} output:{} to {:?} not reciprocated",
                            node,
                            ix,
                            succ
                        )
                    }
                }
            }
        }
        Ok(())
    }

    /// Check node ids match their arena position and names are unique.
    pub fn check_names(&self) -> CarveResult<()> {
        for (ix, n) in self.nodes.iter().enumerate() {
            ensure!(ix == n.id, "Invalid node id: position is {}, node is {}", ix, n);
        }
        let dups = self.nodes.iter().map(|n| &n.name).duplicates().collect_vec();
        ensure!(dups.is_empty(), "Duplicate node name(s): {:?}", dups);
        Ok(())
    }

    /// Check the registered interface is made of the right kind of nodes,
    /// and that no unregistered Parameter feeds a registered result.
    pub fn check_interface(&self) -> CarveResult<()> {
        for &p in &self.parameters {
            let node = self.nodes.get(p).with_context(|| format!("Parameter #{p} not in graph"))?;
            ensure!(node.op_is::<Parameter>(), "Registered parameter {} is not a Parameter", node);
        }
        for &r in &self.results {
            let node = self.nodes.get(r).with_context(|| format!("Result #{r} not in graph"))?;
            ensure!(node.op_is::<Output>(), "Registered result {} is not a Result", node);
        }
        ensure!(self.parameters.iter().all_unique(), "Parameter registered twice");
        ensure!(self.results.iter().all_unique(), "Result registered twice");
        for id in self.eval_order()? {
            let node = &self.nodes[id];
            if node.op_is::<Parameter>() && !self.parameters.contains(&id) {
                bail!("Parameter {} is used by the model outputs but not registered", node)
            }
            if node.op_is::<Dummy>() {
                bail!("Obliterated node {} is used by the model outputs", node)
            }
        }
        Ok(())
    }

    /// Re-run fact inference over the whole graph, in evaluation order.
    pub fn infer_facts(&mut self) -> CarveResult<()> {
        for id in self.full_order()? {
            let facts = {
                let node = &self.nodes[id];
                let inputs = self.node_input_facts(id)?;
                node.op
                    .output_facts(&inputs)
                    .with_context(|| format!("Inferring facts for {node}"))?
            };
            let node = &mut self.nodes[id];
            ensure!(
                facts.len() == node.outputs.len(),
                "Node {} has {} outputs, inference found {}",
                node,
                node.outputs.len(),
                facts.len()
            );
            for (outlet, fact) in node.outputs.iter_mut().zip(facts) {
                outlet.fact = fact;
            }
        }
        Ok(())
    }

    /// Full structural check followed by fact re-inference.
    pub fn validate(&mut self) -> CarveResult<()> {
        self.check_names()?;
        self.check_edges()?;
        self.check_interface()?;
        self.infer_facts()
    }

    /// generates a name for a new node in the model that will not conflict (by suffixing with a
    /// dot and number)
    pub fn unique_name<'n>(&self, prefix: impl Into<Cow<'n, str>>) -> Cow<'n, str> {
        let prefix = prefix.into();
        if self.nodes.iter().all(|n| n.name != *prefix) {
            return prefix;
        }
        let names: HashSet<&str> = self.nodes.iter().map(|n| &*n.name).collect();
        let mut i = 1;
        loop {
            let s = format!("{prefix}.{i}");
            if !names.contains(&*s) {
                return Cow::Owned(s);
            }
            i += 1;
        }
    }

    /// Structural equality: same nodes in the same arena positions, wired the
    /// same way, with equal ops and the same interface nodes.
    ///
    /// Interface registration order is not compared.
    pub fn same_as(&self, other: &Graph) -> bool {
        let sorted = |ids: &[usize]| ids.iter().copied().sorted().collect::<Vec<_>>();
        self.nodes.len() == other.nodes.len()
            && self.nodes.iter().zip(&other.nodes).all(|(a, b)| a.name == b.name && a.same_as(b))
            && sorted(&self.parameters) == sorted(&other.parameters)
            && sorted(&self.results) == sorted(&other.results)
    }

    /// Garbage-collect the arena.
    ///
    /// Keeps the nodes needed to compute the registered results plus the
    /// registered parameters, renumbers them in evaluation order, and drops
    /// edges to discarded nodes.
    pub fn compact(&mut self) -> CarveResult<()> {
        let mut order = self.eval_order()?;
        for &p in &self.parameters {
            if !order.contains(&p) {
                order.push(p);
            }
        }
        if order.len() == self.nodes.len() && order.iter().enumerate().all(|(a, b)| a == *b) {
            return Ok(());
        }
        let mut old_to_new = vec![usize::MAX; self.nodes.len()];
        for (ix, id) in order.iter().enumerate() {
            old_to_new[*id] = ix;
        }
        for node in self.nodes.iter().filter(|n| old_to_new[n.id] == usize::MAX) {
            debug!("Compaction drops {}", node);
        }
        let mut old_nodes: Vec<Option<Node>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        let mut new_nodes = Vec::with_capacity(order.len());
        for &id in &order {
            let mut node = old_nodes[id].take().context("Node visited twice during compaction")?;
            node.id = old_to_new[node.id];
            for input in &mut node.inputs {
                ensure!(
                    old_to_new[input.node] != usize::MAX,
                    "Node {} reads from a discarded node",
                    node.name
                );
                input.node = old_to_new[input.node];
            }
            for output in &mut node.outputs {
                output.successors.retain(|s| old_to_new[s.node] != usize::MAX);
                for succ in &mut output.successors {
                    succ.node = old_to_new[succ.node];
                }
                output.successors.sort();
            }
            new_nodes.push(node);
        }
        self.nodes = new_nodes;
        for p in &mut self.parameters {
            *p = old_to_new[*p];
        }
        let results = std::mem::take(&mut self.results);
        self.results = results.into_iter().map(|r| old_to_new[r]).collect();
        self.outlet_names = std::mem::take(&mut self.outlet_names)
            .into_iter()
            .filter(|(k, _)| old_to_new[k.node] != usize::MAX)
            .map(|(k, v)| (OutletId::new(old_to_new[k.node], k.slot), v))
            .collect();
        ensure!(self.nodes.iter().enumerate().all(|(ix, n)| n.id == ix));
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        for node in &self.nodes {
            let inputs = node.inputs.iter().map(|o| format!("{o:?}")).join(" ");
            let facts = node.outputs.iter().map(|o| format!("{:?}", o.fact)).join(" ; ");
            writeln!(fmt, "{:5} | {:16} | {:12} {:40} => {}", node.id, inputs, node.op().name(), node.name, facts)?;
            for (slot, outlet) in node.outputs.iter().enumerate() {
                let names = self.outlet_names(OutletId::new(node.id, slot));
                if !names.is_empty() || outlet.successors.len() > 1 {
                    writeln!(
                        fmt,
                        "      |   * output #{}: {} {}",
                        slot,
                        names.join(","),
                        outlet.successors.iter().map(|s| format!("{s:?}")).join(", ")
                    )?;
                }
            }
        }
        writeln!(fmt, "parameters: {}", self.parameters.iter().join(", "))?;
        writeln!(fmt, "results: {}", self.results.iter().join(", "))?;
        Ok(())
    }
}

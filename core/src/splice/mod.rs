//! Tensor-level subgraph extraction.
//!
//! Chosen tensors become the new model inputs, chosen tensors become the new
//! model outputs, and everything not needed in between is pruned.
use std::str::FromStr;

use crate::internal::*;

mod index;
mod input;
mod output;
mod prune;
mod tensor_ref;

pub use index::NameIndex;
pub use tensor_ref::TensorRef;

/// What an operation-level reference (no `:port`) means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputStrategy {
    /// Only `op:port` references are spliced, others are skipped with a warning.
    #[default]
    PortOnly,
    /// An operation-level input reference cuts every non-constant input edge
    /// of the operation. An operation-level output reference designates the
    /// single output of the operation.
    AllEdges,
}

impl FromStr for InputStrategy {
    type Err = CarveError;
    fn from_str(s: &str) -> CarveResult<InputStrategy> {
        match s {
            "port" => Ok(InputStrategy::PortOnly),
            "edges" => Ok(InputStrategy::AllEdges),
            _ => bail!("Unknown splicing strategy {:?} (expected port or edges)", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpliceOptions {
    pub strategy: InputStrategy,
}

impl SpliceOptions {
    pub fn with_strategy(self, strategy: InputStrategy) -> SpliceOptions {
        SpliceOptions { strategy, ..self }
    }
}

/// Names of the Parameter and Result nodes forming the extracted interface,
/// in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Boundary {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Stateful splicing session on a graph.
///
/// Node ids stay valid until `prune`, which compacts the graph.
#[derive(Debug)]
pub struct Splicer<'g> {
    graph: &'g mut Graph,
    options: SpliceOptions,
    index: NameIndex,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
    spliced_inputs: HashMap<OutletId, usize>,
    spliced_outputs: HashMap<OutletId, usize>,
}

impl<'g> Splicer<'g> {
    pub fn new(graph: &'g mut Graph, options: &SpliceOptions) -> CarveResult<Splicer<'g>> {
        let index = NameIndex::new(graph)?;
        Ok(Splicer {
            graph,
            options: options.clone(),
            index,
            inputs: vec![],
            outputs: vec![],
            spliced_inputs: HashMap::new(),
            spliced_outputs: HashMap::new(),
        })
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Node, parameter and result counts, as reported between steps.
    pub fn counts(&self) -> CarveResult<(usize, usize, usize)> {
        self.graph.op_count()
    }

    pub fn log_counts(&self, step: &str) -> CarveResult<()> {
        let (nodes, parameters, results) = self.counts()?;
        info!("{}: model nodes {}, parameters {}, results {}", step, nodes, parameters, results);
        Ok(())
    }

    /// Boundary as currently staged.
    pub fn boundary(&self) -> Boundary {
        let names = |ids: &[usize]| -> Vec<String> {
            ids.iter().map(|&id| self.graph.node(id).name.clone()).collect()
        };
        Boundary { inputs: names(&self.inputs), outputs: names(&self.outputs) }
    }

    fn add_input(&mut self, id: usize) {
        if !self.inputs.contains(&id) {
            self.inputs.push(id);
        }
    }

    fn add_output(&mut self, id: usize) {
        if !self.outputs.contains(&id) {
            self.outputs.push(id);
        }
    }
}

/// Extract the subgraph between `inputs` and `outputs` tensor references,
/// in place. The graph is validated on success.
pub fn extract_subgraph<I: AsRef<str>, O: AsRef<str>>(
    graph: &mut Graph,
    inputs: &[I],
    outputs: &[O],
    options: &SpliceOptions,
) -> CarveResult<Boundary> {
    let boundary = {
        let mut splicer = Splicer::new(graph, options)?;
        splicer.log_counts("loaded")?;
        splicer.splice_inputs(inputs)?;
        splicer.log_counts("inputs spliced")?;
        splicer.splice_outputs(outputs)?;
        splicer.log_counts("outputs spliced")?;
        let boundary = splicer.prune()?;
        splicer.log_counts("pruned")?;
        boundary
    };
    graph.validate()?;
    Ok(boundary)
}

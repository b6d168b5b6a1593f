//! Evaluation order computation.
use crate::internal::*;
use bit_set::BitSet;

/// Find an evaluation order for a graph, computing its registered results
/// and stopping at its registered parameters.
pub fn eval_order(model: &Graph) -> CarveResult<Vec<usize>> {
    eval_order_for_nodes(model.nodes(), &model.parameters, &model.results)
}

/// Find a working evaluation order for a list of nodes.
///
/// Nodes in `inputs` are considered computed whatever their own inputs are.
pub fn eval_order_for_nodes(
    nodes: &[Node],
    inputs: &[usize],
    targets: &[usize],
) -> CarveResult<Vec<usize>> {
    let mut order: Vec<usize> = Vec::new();
    let mut done = BitSet::with_capacity(nodes.len());
    let mut pending = BitSet::with_capacity(nodes.len());
    let mut needed: Vec<usize> = targets.iter().rev().copied().collect();
    while let Some(&node) = needed.last() {
        ensure!(node < nodes.len(), "Node {} is not in the graph", node);
        if done.contains(node) {
            needed.pop();
            continue;
        }
        if inputs.contains(&node) || nodes[node].inputs.iter().all(|i| done.contains(i.node)) {
            order.push(node);
            needed.pop();
            done.insert(node);
            continue;
        }
        if !pending.insert(node) {
            bail!("Loop detected in graph around node {}", nodes[node]);
        }
        for input in nodes[node].inputs.iter().rev() {
            if !done.contains(input.node) {
                ensure!(
                    !pending.contains(input.node),
                    "Loop detected in graph around node {}",
                    nodes[input.node]
                );
                needed.push(input.node);
            }
        }
    }
    Ok(order)
}

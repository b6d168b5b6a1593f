use std::borrow::Borrow;
use std::marker::PhantomData;

use crate::internal::*;
use crate::model::order::eval_order_for_nodes;

/// An evaluation plan: the node order computing a set of outputs, and the
/// step after which each intermediate value can be dropped.
#[derive(Debug, Clone)]
pub struct SimplePlan<M: Borrow<Graph>> {
    pub model: M,
    pub outputs: Vec<OutletId>,
    pub order: Vec<usize>,
    pub flush_lists: Vec<TVec<usize>>,
}

impl<M: Borrow<Graph>> SimplePlan<M> {
    /// This contructor returns a plan that will compute all the model registered outputs in one pass.
    pub fn new(model: M) -> CarveResult<SimplePlan<M>> {
        let outputs = model.borrow().output_outlets()?.to_vec();
        Self::new_for_outputs(model, &outputs)
    }

    /// This contructor returns a plan that will compute all specified outputs in one pass.
    pub fn new_for_outputs(model: M, outputs: &[OutletId]) -> CarveResult<SimplePlan<M>> {
        let (order, flush_lists) = {
            let graph = model.borrow();
            let targets = outputs.iter().map(|o| o.node).collect::<Vec<usize>>();
            let order = eval_order_for_nodes(graph.nodes(), &graph.parameters, &targets)?;
            let mut values_needed_until_step = vec![0; graph.nodes().len()];
            for (step, n) in order.iter().enumerate() {
                for i in &graph.node(*n).inputs {
                    values_needed_until_step[i.node] = step;
                }
            }
            for o in outputs {
                values_needed_until_step[o.node] = order.len();
            }
            let mut flush_lists: Vec<TVec<usize>> = vec![tvec!(); order.len() + 1];
            for (node, &flush_at) in values_needed_until_step.iter().enumerate() {
                if flush_at != 0 {
                    flush_lists[flush_at].push(node)
                }
            }
            (order, flush_lists)
        };
        Ok(SimplePlan { model, outputs: outputs.to_vec(), order, flush_lists })
    }

    pub fn run(&self, inputs: TVec<Tensor>) -> CarveResult<TVec<Arc<Tensor>>> {
        let mut state = SimpleState::new(self)?;
        state.run(inputs)
    }

    pub fn model(&self) -> &Graph {
        self.model.borrow()
    }
}

/// Values computed while running a plan.
#[derive(Clone, Debug)]
pub struct SimpleState<M, P>
where
    M: Borrow<Graph>,
    P: Borrow<SimplePlan<M>>,
{
    plan: P,
    pub values: Vec<Option<TVec<Arc<Tensor>>>>,
    _phantom: PhantomData<M>,
}

impl<M, P> SimpleState<M, P>
where
    M: Borrow<Graph>,
    P: Borrow<SimplePlan<M>>,
{
    pub fn new(plan: P) -> CarveResult<SimpleState<M, P>> {
        let values = vec![None; plan.borrow().model().nodes().len()];
        Ok(SimpleState { plan, values, _phantom: PhantomData })
    }

    /// Reset wires state.
    pub fn reset_wires(&mut self) {
        self.values.iter_mut().for_each(|s| *s = None);
    }

    pub fn run(&mut self, inputs: TVec<Tensor>) -> CarveResult<TVec<Arc<Tensor>>> {
        self.run_plan_with_eval(inputs, self::eval)
    }

    /// Run the plan, feeding the registered parameters with `inputs` (in
    /// registration order) and delegating node evaluation to `eval`.
    pub fn run_plan_with_eval<Eval>(
        &mut self,
        inputs: TVec<Tensor>,
        mut eval: Eval,
    ) -> CarveResult<TVec<Arc<Tensor>>>
    where
        Eval: FnMut(&Node, TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>>,
    {
        self.set_inputs(inputs)?;
        let result = {
            let plan: &SimplePlan<M> = self.plan.borrow();
            let values = &mut self.values;
            let model = plan.model();
            for (step, n) in plan.order.iter().enumerate() {
                let node = model.node(*n);
                if values[node.id].is_none() {
                    trace!("Running step {}, node {}", step, node);
                    let inputs = node
                        .inputs
                        .iter()
                        .map(|i| {
                            values[i.node].as_ref().and_then(|v| v.get(i.slot)).cloned().with_context(
                                || format!("Evaluating {node}: input {i:?} is not computed"),
                            )
                        })
                        .collect::<CarveResult<TVec<_>>>()?;
                    let vs = eval(node, inputs).with_context(|| format!("Evaluating {node}"))?;
                    ensure!(
                        vs.len() == node.outputs.len(),
                        "Evaluating {}: expected {} outputs, got {}",
                        node,
                        node.outputs.len(),
                        vs.len()
                    );
                    if cfg!(debug_assertions) {
                        for (ix, (v, outlet)) in vs.iter().zip(node.outputs.iter()).enumerate() {
                            ensure!(
                                outlet.fact.matches(v),
                                "Evaluating {}: output {}, expected {:?}, got {:?}",
                                node,
                                ix,
                                outlet.fact,
                                v
                            );
                        }
                    }
                    values[node.id] = Some(vs);
                }
                for flush in &plan.flush_lists[step] {
                    trace!("Flushing value of node #{}", flush);
                    values[*flush] = None;
                }
            }
            plan.outputs
                .iter()
                .map(|o| {
                    values[o.node]
                        .as_ref()
                        .and_then(|v| v.get(o.slot))
                        .cloned()
                        .with_context(|| format!("Output {o:?} is not computed"))
                })
                .collect::<CarveResult<TVec<_>>>()?
        };
        self.reset_wires();
        Ok(result)
    }

    pub fn set_inputs(&mut self, inputs: TVec<Tensor>) -> CarveResult<()> {
        let expected = self.model().parameters.len();
        ensure!(inputs.len() == expected, "Model expects {} input(s), got {}", expected, inputs.len());
        for (ix, t) in inputs.into_iter().enumerate() {
            self.set_input(ix, t)?
        }
        Ok(())
    }

    pub fn set_input(&mut self, input: usize, t: Tensor) -> CarveResult<()> {
        let model = self.plan.borrow().model();
        let id = *model
            .parameters
            .get(input)
            .ok_or_else(|| format_err!("Invalid input id for model ({}).", input))?;
        let fact = model.outlet_fact(OutletId::new(id, 0))?;
        ensure!(
            fact.matches(&t),
            "Setting input {} ({}): expected {:?}, got {:?}",
            input,
            model.node(id).name,
            fact,
            t
        );
        self.values[id] = Some(tvec!(t.into_arc_tensor()));
        Ok(())
    }

    pub fn plan(&self) -> &SimplePlan<M> {
        self.plan.borrow()
    }

    pub fn model(&self) -> &Graph {
        self.plan().model()
    }
}

pub fn eval(node: &Node, inputs: TVec<Arc<Tensor>>) -> CarveResult<TVec<Arc<Tensor>>> {
    node.op().eval(inputs)
}

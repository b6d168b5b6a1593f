//! Compilation of a graph into a runnable model.
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::internal::*;
use crate::ops::cast::Cast;
use crate::ops::konst::Const;

/// Scheduling hint, mirroring the device plugin hints of the IR runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformanceMode {
    #[default]
    Throughput,
    Latency,
}

impl FromStr for PerformanceMode {
    type Err = CarveError;
    fn from_str(s: &str) -> CarveResult<PerformanceMode> {
        match &*s.to_ascii_lowercase() {
            "throughput" => Ok(PerformanceMode::Throughput),
            "latency" => Ok(PerformanceMode::Latency),
            _ => bail!("Unknown performance mode {:?} (expected throughput or latency)", s),
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PerformanceMode::Throughput => write!(f, "THROUGHPUT"),
            PerformanceMode::Latency => write!(f, "LATENCY"),
        }
    }
}

/// Compilation options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileConfig {
    /// Layout applied to every parameter, one letter per axis. `N` marks the batch axis.
    pub layout: Option<String>,
    /// Batch size forced on the `N` axis of every parameter.
    pub batch: Option<usize>,
    /// Worker threads of the inference pool. 0 lets rayon decide.
    pub num_threads: usize,
    pub num_streams: usize,
    /// Inference precision. Only f32 is supported.
    pub precision: Option<DatumType>,
    pub performance_mode: PerformanceMode,
    pub enable_profiling: bool,
}

impl Default for CompileConfig {
    fn default() -> CompileConfig {
        CompileConfig {
            layout: Some("NC".to_string()),
            batch: None,
            num_threads: 4,
            num_streams: 1,
            precision: Some(DatumType::F32),
            performance_mode: PerformanceMode::Throughput,
            enable_profiling: false,
        }
    }
}

impl CompileConfig {
    pub fn with_layout(self, layout: Option<&str>) -> Self {
        CompileConfig { layout: layout.map(|l| l.to_string()), ..self }
    }

    pub fn with_batch(self, batch: Option<usize>) -> Self {
        CompileConfig { batch, ..self }
    }

    pub fn with_num_threads(self, num_threads: usize) -> Self {
        CompileConfig { num_threads, ..self }
    }

    pub fn with_num_streams(self, num_streams: usize) -> Self {
        CompileConfig { num_streams, ..self }
    }

    pub fn with_precision(self, precision: Option<DatumType>) -> Self {
        CompileConfig { precision, ..self }
    }

    pub fn with_performance_mode(self, performance_mode: PerformanceMode) -> Self {
        CompileConfig { performance_mode, ..self }
    }

    pub fn with_profiling(self, enable_profiling: bool) -> Self {
        CompileConfig { enable_profiling, ..self }
    }

    fn batch_axis(&self, rank: usize) -> CarveResult<Option<usize>> {
        let Some(layout) = &self.layout else {
            return Ok(Some(0).filter(|_| rank > 0));
        };
        ensure!(
            layout.chars().count() == rank,
            "Layout {} does not apply to a rank {} parameter",
            layout,
            rank
        );
        Ok(layout.chars().position(|c| c == 'N'))
    }
}

/// Timing of one node during a profiled inference.
#[derive(Debug, Clone)]
pub struct ProfilingInfo {
    pub node_name: String,
    pub node_type: String,
    pub duration: Duration,
}

/// Result of one inference.
#[derive(Debug, Clone)]
pub struct Inference {
    /// one tensor per registered result
    pub outputs: TVec<Arc<Tensor>>,
    /// per node timings, in evaluation order, when profiling is enabled
    pub profile: Option<Vec<ProfilingInfo>>,
}

/// A validated graph with concrete inputs, ready to run.
#[derive(Debug)]
pub struct CompiledModel {
    plan: SimplePlan<Graph>,
    pool: rayon::ThreadPool,
    config: CompileConfig,
}

/// Check and prepare `model` for inference.
pub fn compile(mut model: Graph, config: &CompileConfig) -> CarveResult<CompiledModel> {
    model.validate()?;
    ensure!(config.num_streams > 0, "At least one stream is required");
    for &p in &model.parameters.clone() {
        let mut fact = model.outlet_fact(OutletId::new(p, 0))?.clone();
        let axis = config
            .batch_axis(fact.rank())
            .with_context(|| format!("Applying layout to {}", model.node(p)))?;
        if let Some(batch) = config.batch {
            let axis = axis.with_context(|| {
                format!("Can not set batch on {}: no N axis in layout", model.node(p))
            })?;
            fact.shape.set_dim(axis, Dim::Val(batch))?;
            debug!("Setting batch of {} to {}", model.node(p).name, batch);
            model.set_parameter_fact(p, fact)?;
        }
    }
    match config.precision {
        None => (),
        Some(DatumType::F32) => convert_f16_to_f32(&mut model)?,
        Some(other) => bail!("Unsupported inference precision {}", other),
    }
    model.infer_facts()?;
    for &p in &model.parameters {
        let fact = model.outlet_fact(OutletId::new(p, 0))?;
        ensure!(
            fact.shape.is_concrete(),
            "Input {} has a dynamic shape ({:?}), set a batch size",
            model.node(p).name,
            fact
        );
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .thread_name(|i| format!("carve-infer-{i}"))
        .build()?;
    info!(
        "Compiled {} nodes, mode: {}, threads: {}, streams: {}",
        model.nodes().len(),
        config.performance_mode,
        pool.current_num_threads(),
        config.num_streams
    );
    let plan = SimplePlan::new(model)?;
    Ok(CompiledModel { plan, pool, config: config.clone() })
}

fn convert_f16_to_f32(model: &mut Graph) -> CarveResult<()> {
    for id in 0..model.nodes().len() {
        let node = model.node(id);
        if let Some(k) = node.op_as::<Const>().filter(|k| k.0.datum_type() == DatumType::F16) {
            let converted = k.0.cast_to_dt(DatumType::F32)?.into_owned().into_arc_tensor();
            debug!("Converting constant {} to f32", node.name);
            let node = model.node_mut(id);
            node.op = Box::new(Const::new(converted.clone()));
            node.outputs[0].fact = converted.into();
        } else if node.op_as::<Cast>().is_some_and(|c| c.to == DatumType::F16) {
            model.node_mut(id).op = Box::new(Cast::new(DatumType::F32));
        } else if model.parameters.contains(&id) && node.outputs[0].fact.datum_type == DatumType::F16 {
            let fact = TypedFact::dt_shape(DatumType::F32, node.outputs[0].fact.shape.clone());
            debug!("Converting input {} to f32", node.name);
            model.set_parameter_fact(id, fact)?;
        }
    }
    Ok(())
}

impl CompiledModel {
    pub fn model(&self) -> &Graph {
        self.plan.model()
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn input_facts(&self) -> CarveResult<TVec<&TypedFact>> {
        let model = self.model();
        (0..model.parameters.len()).map(|ix| model.input_fact(ix)).collect()
    }

    pub fn output_facts(&self) -> CarveResult<TVec<&TypedFact>> {
        let model = self.model();
        (0..model.results.len()).map(|ix| model.output_fact(ix)).collect()
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.model().parameters.iter().map(|&p| &*self.model().node(p).name).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.model().results.iter().map(|&r| &*self.model().node(r).name).collect()
    }

    /// Number of requests worth running concurrently.
    pub fn optimal_number_of_infer_requests(&self) -> usize {
        match self.config.performance_mode {
            PerformanceMode::Throughput => self.config.num_streams,
            PerformanceMode::Latency => 1,
        }
    }

    /// Zero-filled tensors for every input.
    pub fn zero_inputs(&self) -> CarveResult<TVec<Tensor>> {
        self.input_facts()?
            .into_iter()
            .map(|fact| {
                let shape = fact.shape.as_concrete().context("Compiled inputs are concrete")?;
                Ok(Tensor::zero_dt(fact.datum_type, &shape))
            })
            .collect()
    }

    pub fn create_infer_request(&self) -> InferRequest<'_> {
        InferRequest { model: self, inputs: vec![None; self.model().parameters.len()] }
    }

    /// Run the model on the inference pool.
    pub fn infer(&self, inputs: TVec<Tensor>) -> CarveResult<Inference> {
        let profiling = self.config.enable_profiling;
        self.pool.install(|| {
            let mut state = SimpleState::new(&self.plan)?;
            let mut profile = vec![];
            let outputs = state.run_plan_with_eval(inputs, |node, inputs| {
                if !profiling {
                    return node.op().eval(inputs);
                }
                let start = Instant::now();
                let outputs = node.op().eval(inputs)?;
                profile.push(ProfilingInfo {
                    node_name: node.name.clone(),
                    node_type: node.op().name().into_owned(),
                    duration: start.elapsed(),
                });
                Ok(outputs)
            })?;
            Ok(Inference { outputs, profile: profiling.then_some(profile) })
        })
    }
}

/// Inputs staged one by one before running an inference.
#[derive(Debug)]
pub struct InferRequest<'m> {
    model: &'m CompiledModel,
    inputs: Vec<Option<Tensor>>,
}

impl InferRequest<'_> {
    pub fn set_input(&mut self, ix: usize, tensor: Tensor) -> CarveResult<()> {
        let fact = self.model.model().input_fact(ix)?;
        ensure!(fact.matches(&tensor), "Input #{} expects {:?}, got {:?}", ix, fact, tensor);
        self.inputs[ix] = Some(tensor);
        Ok(())
    }

    /// Set an input by parameter name or by one of its tensor names.
    pub fn set_input_by_name(&mut self, name: &str, tensor: Tensor) -> CarveResult<()> {
        let model = self.model.model();
        let ix = model
            .parameters
            .iter()
            .position(|&p| {
                model.node(p).name == name
                    || model.outlet_names(OutletId::new(p, 0)).iter().any(|n| n == name)
            })
            .with_context(|| format!("No input named {name:?}"))?;
        self.set_input(ix, tensor)
    }

    pub fn infer(&mut self) -> CarveResult<Inference> {
        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(ix, t)| t.clone().with_context(|| format!("Input #{ix} is not set")))
            .collect::<CarveResult<TVec<_>>>()?;
        self.model.infer(inputs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::binary::BinaryKind;
    use crate::ops::matmul::MatMul;

    fn model(dt: DatumType) -> Graph {
        let mut model = Graph::default();
        let x = model
            .add_parameter("x", TypedFact::dt_shape(dt, ShapeFact::from_dims([Dim::Any, Dim::Val(2)])))
            .unwrap();
        let w = Tensor::from_shape(&[2, 2], &[1f32, 2., 3., 4.]).unwrap();
        let w = model.add_const("w", w.cast_to_dt(dt).unwrap().into_owned()).unwrap();
        let mm = model.wire_node("mm", MatMul::default(), &[x, w]).unwrap();
        let relu = model.wire_node("relu", UnaryKind::Relu.into_op(), &mm).unwrap();
        model.add_result("y", relu[0]).unwrap();
        model
    }

    #[test]
    fn batch_is_set_on_n_axis() {
        let compiled = compile(model(DatumType::F32), &CompileConfig::default().with_batch(Some(16))).unwrap();
        assert_eq!(compiled.input_facts().unwrap()[0].shape, ShapeFact::from([16, 2]));
        assert_eq!(compiled.output_facts().unwrap()[0].shape, ShapeFact::from([16, 2]));
        let inputs = compiled.zero_inputs().unwrap();
        let out = compiled.infer(inputs).unwrap();
        assert_eq!(*out.outputs[0], Tensor::zero::<f32>(&[16, 2]));
        assert!(out.profile.is_none());
    }

    #[test]
    fn dynamic_inputs_are_refused() {
        assert!(compile(model(DatumType::F32), &CompileConfig::default()).is_err());
    }

    #[test]
    fn layout_must_match_rank() {
        let config = CompileConfig::default().with_layout(Some("NCH")).with_batch(Some(2));
        assert!(compile(model(DatumType::F32), &config).is_err());
        let config = CompileConfig::default().with_layout(Some("CN")).with_batch(Some(2));
        assert!(compile(model(DatumType::F32), &config).is_err());
    }

    #[test]
    fn f16_model_runs_in_f32() {
        let config = CompileConfig::default().with_batch(Some(1)).with_profiling(true);
        let compiled = compile(model(DatumType::F16), &config).unwrap();
        assert_eq!(compiled.input_facts().unwrap()[0].datum_type, DatumType::F32);
        let mut request = compiled.create_infer_request();
        request.set_input_by_name("x", tensor2(&[[1f32, 1.]])).unwrap();
        let out = request.infer().unwrap();
        assert_eq!(*out.outputs[0], tensor2(&[[4f32, 6.]]));
        let profile = out.profile.unwrap();
        assert_eq!(profile.iter().map(|p| &*p.node_type).collect::<Vec<_>>(), vec!["Const", "MatMul", "Relu"]);
    }

    #[test]
    fn requests_need_every_input() {
        let mut model = Graph::default();
        let a = model.add_parameter("a", TypedFact::shape::<i32>([1, 2])).unwrap();
        let b = model.add_parameter("b", TypedFact::shape::<i32>([1, 2])).unwrap();
        let add = model.wire_node("add", BinaryKind::Add.into_op(), &[a, b]).unwrap();
        model.add_result("sum", add[0]).unwrap();
        let compiled = compile(model, &CompileConfig::default()).unwrap();
        assert_eq!(compiled.input_names(), vec!["a", "b"]);
        let mut request = compiled.create_infer_request();
        request.set_input(0, tensor2(&[[1i32, 2]])).unwrap();
        assert!(request.infer().is_err());
        assert!(request.set_input(1, tensor2(&[[1f32, 2.]])).is_err());
        request.set_input(1, tensor2(&[[3i32, 4]])).unwrap();
        assert_eq!(*request.infer().unwrap().outputs[0], tensor2(&[[4i32, 6]]));
    }

    #[test]
    fn modes() {
        assert_eq!("latency".parse::<PerformanceMode>().unwrap(), PerformanceMode::Latency);
        assert!("fast".parse::<PerformanceMode>().is_err());
        let compiled = compile(
            model(DatumType::F32),
            &CompileConfig::default()
                .with_batch(Some(1))
                .with_num_streams(3)
                .with_performance_mode(PerformanceMode::Latency),
        )
        .unwrap();
        assert_eq!(compiled.optimal_number_of_infer_requests(), 1);
    }
}

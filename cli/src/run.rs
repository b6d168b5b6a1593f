use carve_core::internal::*;
use carve_core::runtime::Inference;
use carve_core::splice::Splicer;

use crate::params::Parameters;

fn print_counts(step: &str, splicer: &Splicer) -> CarveResult<()> {
    let (nodes, parameters, results) = splicer.counts()?;
    println!("{step}: model nodes {nodes}, parameters {parameters}, results {results}");
    Ok(())
}

/// Splice, prune and validate `model` in place.
pub fn extract(model: &mut Graph, params: &Parameters) -> CarveResult<Boundary> {
    let boundary = {
        let mut splicer = Splicer::new(model, &params.splice)?;
        print_counts("loaded", &splicer)?;
        splicer.splice_inputs(&params.inputs)?;
        print_counts("inputs spliced", &splicer)?;
        splicer.splice_outputs(&params.outputs)?;
        print_counts("outputs spliced", &splicer)?;
        let boundary = splicer.prune()?;
        print_counts("pruned", &splicer)?;
        boundary
    };
    model.validate().context("Validating the extracted model")?;
    Ok(boundary)
}

/// Compile, then infer on zero inputs with one request per optimal
/// request, and at least two. All runs must agree.
pub fn smoke_test(model: Graph, config: &CompileConfig) -> CarveResult<Vec<Inference>> {
    let compiled = compile(model, config)?;
    let input_names = compiled.input_names();
    for (name, fact) in input_names.iter().zip(compiled.input_facts()?) {
        println!("input {name}: {fact:?}");
    }
    let requests = compiled.optimal_number_of_infer_requests();
    println!("Optimal number of infer requests: {requests}.");
    println!("Feeding model with zero inputs.");
    let inputs = compiled.zero_inputs()?;
    let mut runs = vec![];
    for _ in 0..requests.max(2) {
        let mut request = compiled.create_infer_request();
        for (name, input) in input_names.iter().zip(inputs.iter()) {
            request.set_input_by_name(name, input.clone())?;
        }
        runs.push(request.infer()?);
    }
    let names = compiled.output_names();
    let first = &runs[0];
    for (ix, run) in runs.iter().enumerate().skip(1) {
        for ((name, a), b) in names.iter().zip(first.outputs.iter()).zip(run.outputs.iter()) {
            a.close_enough(b, false)
                .with_context(|| format!("Output {name} differs between runs 1 and {}", ix + 1))?;
        }
    }
    for (name, output) in names.iter().zip(first.outputs.iter()) {
        println!("output {name}: {:?}", output.shape());
    }
    if let Some(profile) = &first.profile {
        for p in profile {
            debug!("{:>12?} {} ({})", p.duration, p.node_name, p.node_type);
        }
        let total: std::time::Duration = profile.iter().map(|p| p.duration).sum();
        println!("Profiled {} operations, {:?} total", profile.len(), total);
    }
    Ok(runs)
}

pub fn handle(params: &Parameters) -> CarveResult<()> {
    let ir = carve_ir::ir();
    let mut model = ir.model_for_path(&params.model)?;
    let boundary = extract(&mut model, params)?;
    println!("inputs: {}", boundary.inputs.join(", "));
    println!("outputs: {}", boundary.outputs.join(", "));
    let (xml, bin) = ir.write_to_files(&model, &params.prefix)?;
    println!("Saved subgraph IR to {} and {}.", xml.display(), bin.display());
    if params.skip_run {
        return Ok(());
    }
    println!("Running saved model.");
    let saved = ir.model_for_path(&xml)?;
    ensure!(saved.same_as(&model), "Model reloaded from {} differs from the extracted one", xml.display());
    smoke_test(saved, &params.compile)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use carve_core::ops::binary::BinaryKind;
    use temp_dir::TempDir;

    fn model() -> CarveResult<Graph> {
        let mut model = Graph::default();
        let fact = TypedFact::dt_shape(DatumType::F32, ShapeFact::from_dims([Dim::Any, Dim::Val(3)]));
        let x = model.add_parameter("x", fact)?;
        let one = model.add_const("one", tensor1(&[1f32, 1., 1.]))?;
        let add = model.wire_node("add", BinaryKind::Add.into_op(), &[x, one])?;
        let relu = model.wire_node("relu", UnaryKind::Relu.into_op(), &add)?;
        let exp = model.wire_node("exp", UnaryKind::Exp.into_op(), &relu)?;
        model.add_result("y", exp[0])?;
        Ok(model)
    }

    fn params(dir: &TempDir) -> Parameters {
        Parameters {
            model: dir.child("model.xml"),
            inputs: vec!["add:0".into()],
            outputs: vec!["relu:0".into()],
            splice: SpliceOptions::default(),
            prefix: dir.child("simple_model"),
            compile: CompileConfig::default().with_batch(Some(16)).with_profiling(true),
            skip_run: false,
        }
    }

    #[test]
    fn full_pipeline() -> CarveResult<()> {
        let dir = TempDir::new()?;
        let params = params(&dir);
        carve_ir::ir().write_to_files(&model()?, dir.child("model"))?;
        handle(&params)?;
        let saved = carve_ir::ir().model_for_path(dir.child("simple_model.xml"))?;
        let names: Vec<&str> = saved.nodes().iter().map(|n| &*n.name).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"add:0") && names.contains(&"relu") && names.contains(&"relu:0"));
        Ok(())
    }

    #[test]
    fn smoke_test_runs_batched() -> CarveResult<()> {
        let dir = TempDir::new()?;
        let params = params(&dir);
        let mut model = model()?;
        extract(&mut model, &params)?;
        let runs = smoke_test(model, &params.compile)?;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].outputs[0].shape(), &[16, 3]);
        assert!(runs[0].profile.is_some());
        Ok(())
    }

    #[test]
    fn one_run_per_stream_in_throughput_mode() -> CarveResult<()> {
        let dir = TempDir::new()?;
        let params = params(&dir);
        let mut model = model()?;
        extract(&mut model, &params)?;
        let throughput = params.compile.clone().with_num_streams(3);
        assert_eq!(smoke_test(model.clone(), &throughput)?.len(), 3);
        let latency = throughput.with_performance_mode(PerformanceMode::Latency);
        assert_eq!(smoke_test(model, &latency)?.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_operation_fails() -> CarveResult<()> {
        let dir = TempDir::new()?;
        let mut params = params(&dir);
        params.outputs = vec!["nope:0".into()];
        let mut model = model()?;
        let err = extract(&mut model, &params).unwrap_err();
        assert!(format!("{err:?}").contains("nope"));
        Ok(())
    }
}

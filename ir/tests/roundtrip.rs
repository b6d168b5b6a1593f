use carve_core::internal::*;
use carve_core::ops::array::{Concat, Reshape, Split};
use carve_core::ops::binary::BinaryKind;
use carve_core::ops::cast::Cast;
use carve_core::ops::matmul::MatMul;
use carve_ir::ir;
use temp_dir::TempDir;

// x -> concat(h) -> matmul -> add -> split -> sigmoid * tanh -> state
//                                                           \-> reshape -> reshaped
fn model() -> CarveResult<Graph> {
    let mut model = Graph { name: "gru".to_string(), ..Graph::default() };
    let batch = ShapeFact::from_dims([Dim::Any, Dim::Val(4)]);
    let x = model.add_parameter("x", TypedFact::dt_shape(DatumType::F32, batch.clone()))?;
    model.add_outlet_name(x, "x");
    let h = model.add_parameter("h", TypedFact::dt_shape(DatumType::F16, batch))?;
    let h = model.wire_node("h/convert", Cast::new(DatumType::F32), &[h])?;
    let cat = model.wire_node("gru/concat", Concat::new(-1), &[x, h[0]])?;
    let w: Vec<f32> = (0..64).map(|i| ((i * 5) % 11) as f32 / 10.0 - 0.5).collect();
    let w = model.add_const("gru/w", Tensor::from_shape(&[8, 8], &w)?)?;
    let mm = model.wire_node("gru/matmul", MatMul::default(), &[cat[0], w])?;
    let b = model.add_const("gru/b", tensor1(&[0.25f32; 8]))?;
    let add = model.wire_node("gru/add", BinaryKind::Add.into_op(), &[mm[0], b])?;
    model.add_outlet_name(add[0], "gru/add:0");
    let axis = model.add_const("gru/axis", tensor0(1i64))?;
    let split = model.wire_node("gru/split", Split::new(2), &[add[0], axis])?;
    let gate = model.wire_node("gru/sigmoid", UnaryKind::Sigmoid.into_op(), &split[0..1])?;
    let cand = model.wire_node("gru/tanh", UnaryKind::Tanh.into_op(), &split[1..2])?;
    let mul = model.wire_node("gru/mul", BinaryKind::Multiply.into_op(), &[gate[0], cand[0]])?;
    model.add_outlet_name(mul[0], "state, with a comma");
    let shape = model.add_const("gru/shape", tensor1(&[0i64, 2, 2]))?;
    let reshape = model.wire_node("gru/reshape", Reshape::new(true), &[mul[0], shape])?;
    model.add_result("state", mul[0])?;
    model.add_result("reshaped", reshape[0])?;
    model.validate()?;
    Ok(model)
}

fn interface(model: &Graph) -> CarveResult<Vec<(String, Vec<String>, TypedFact)>> {
    let mut items = vec![];
    for (ix, &p) in model.parameters.iter().enumerate() {
        let outlet = OutletId::new(p, 0);
        items.push((model.node(p).name.clone(), model.outlet_names(outlet).to_vec(), model.input_fact(ix)?.without_value()));
    }
    for (ix, &r) in model.results.iter().enumerate() {
        let outlet = model.node(r).inputs[0];
        items.push((model.node(r).name.clone(), model.outlet_names(outlet).to_vec(), model.output_fact(ix)?.without_value()));
    }
    Ok(items)
}

#[test]
fn round_trip_keeps_interface() -> CarveResult<()> {
    let model = model()?;
    let dir = TempDir::new()?;
    let (xml, bin) = ir().write_to_files(&model, dir.child("gru"))?;
    assert!(xml.ends_with("gru.xml"));
    assert!(bin.ends_with("gru.bin"));
    let reloaded = ir().model_for_path(&xml)?;
    assert_eq!(reloaded.name, "gru");
    assert_eq!(reloaded.nodes().len(), model.nodes().len());
    assert_eq!(interface(&reloaded)?, interface(&model)?);
    assert!(reloaded.same_as(&model));
    let mul = reloaded.node_id_by_name("gru/mul")?;
    assert_eq!(reloaded.outlet_names(OutletId::new(mul, 0)), &["state, with a comma"]);
    Ok(())
}

#[test]
fn round_trip_keeps_values() -> CarveResult<()> {
    let model = model()?;
    let mut xml = vec![];
    let mut bin = vec![];
    ir().write(&model, &mut xml, &mut bin)?;
    let reloaded = ir().model_for_read(&mut &*xml, &mut &*bin)?;
    let x = Tensor::from_shape(&[3, 4], &[0.1f32, -0.2, 0.3, 0.4, 1., 2., -3., 0., 0.5, 0.5, 0.5, 0.5])?;
    let h = Tensor::from_shape(&[3, 4], &[f16::from_f32(0.5); 12])?;
    let expected = SimplePlan::new(&model)?.run(tvec!(x.clone(), h.clone()))?;
    let found = SimplePlan::new(&reloaded)?.run(tvec!(x, h))?;
    assert_eq!(expected.len(), 2);
    for (e, f) in expected.iter().zip(found.iter()) {
        e.close_enough(f, false)?;
    }
    assert_eq!(found[1].shape(), &[3, 2, 2]);
    Ok(())
}

#[test]
fn extracted_model_survives_serialization() -> CarveResult<()> {
    let mut model = model()?;
    let boundary = extract_subgraph(&mut model, &["gru/add:0"], &["gru/mul:0"], &SpliceOptions::default())?;
    assert_eq!(boundary.inputs, vec!["gru/add:0"]);
    let dir = TempDir::new()?;
    let prefix = dir.child("simple_model");
    let (xml, _) = ir().write_to_files(&model, &prefix)?;
    // a second write overwrites the files
    let (again, _) = ir().write_to_files(&model, &prefix)?;
    assert_eq!(xml, again);
    let reloaded = ir().model_for_path(xml)?;
    assert_eq!(interface(&reloaded)?, interface(&model)?);
    let names: Vec<&str> = reloaded.nodes().iter().map(|n| &*n.name).collect();
    for gone in ["x", "h", "h/convert", "gru/concat", "gru/matmul", "gru/reshape", "state"] {
        assert!(!names.contains(&gone), "{gone}");
    }

    let compiled = compile(reloaded, &CompileConfig::default().with_batch(Some(16)))?;
    let inputs = compiled.zero_inputs()?;
    assert_eq!(inputs[0].shape(), &[16, 8]);
    let first = compiled.infer(inputs.clone())?;
    let second = compiled.infer(inputs)?;
    assert_eq!(first.outputs, second.outputs);
    // sigmoid(0) * tanh(0)
    assert!(first.outputs[0].to_vec::<f32>()?.iter().all(|v| *v == 0.0));
    Ok(())
}

//! IR document to graph.
use crate::internal::*;
use crate::layer::Layer;
use crate::registry::Registry;
use crate::xml::Element;
use carve_core::ops::io::{Output, Parameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Edge {
    from_layer: usize,
    from_port: usize,
    to_layer: usize,
    to_port: usize,
}

impl Edge {
    fn from_element(e: &Element) -> CarveResult<Edge> {
        let attr = |name: &str| -> CarveResult<usize> {
            e.required_attr(name)?.parse().with_context(|| format!("Invalid edge attribute {name}"))
        };
        Ok(Edge {
            from_layer: attr("from-layer")?,
            from_port: attr("from-port")?,
            to_layer: attr("to-layer")?,
            to_port: attr("to-port")?,
        })
    }
}

pub fn read_model(net: &Element, weights: &[u8], registry: &Registry) -> CarveResult<Graph> {
    ensure!(net.name == "net", "Expected a <net> document, found <{}>", net.name);
    match net.attr("version") {
        Some("10") | Some("11") => (),
        Some(v) => warn!("IR version {} is not supported, loading anyway", v),
        None => warn!("IR document has no version"),
    }
    let layers = net
        .required_child("layers")?
        .children_named("layer")
        .map(Layer::from_element)
        .collect::<CarveResult<Vec<Layer>>>()?;
    let edges = net
        .child("edges")
        .map(|e| e.children_named("edge").map(Edge::from_element).collect::<CarveResult<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    let mut model = Graph { name: net.attr("name").unwrap_or_default().to_string(), ..Graph::default() };
    let mut node_for_layer: HashMap<usize, usize> = HashMap::new();
    for layer in &layers {
        ensure!(!node_for_layer.contains_key(&layer.id), "Duplicate layer id {}", layer.id);
        let op = registry.op_for_layer(layer, weights)?;
        let fallback = op.output_facts(&[]).ok().and_then(|f| f.first().map(|f| f.datum_type));
        let facts = layer
            .outputs
            .iter()
            .map(|p| p.fact(fallback))
            .collect::<CarveResult<TVec<_>>>()
            .with_context(|| format!("Declared outputs of layer {:?}", layer.name))?;
        let id = model.add_node(&*layer.name, op, facts)?;
        for (slot, port) in layer.outputs.iter().enumerate() {
            for name in &port.names {
                model.add_outlet_name(OutletId::new(id, slot), name);
            }
        }
        node_for_layer.insert(layer.id, id);
    }

    let layer_by_id: HashMap<usize, &Layer> = layers.iter().map(|l| (l.id, l)).collect();
    let mut wires = edges
        .iter()
        .map(|edge| {
            let from = layer_by_id
                .get(&edge.from_layer)
                .with_context(|| format!("Edge {edge:?} starts at an unknown layer"))?;
            let to = layer_by_id
                .get(&edge.to_layer)
                .with_context(|| format!("Edge {edge:?} ends at an unknown layer"))?;
            let outlet = OutletId::new(node_for_layer[&from.id], from.output_slot(edge.from_port)?);
            let inlet = InletId::new(node_for_layer[&to.id], to.input_slot(edge.to_port)?);
            Ok((inlet, outlet))
        })
        .collect::<CarveResult<Vec<(InletId, OutletId)>>>()?;
    wires.sort();
    for pair in wires.windows(2) {
        ensure!(pair[0].0 != pair[1].0, "Input {:?} is connected twice", pair[0].0);
    }
    for (inlet, outlet) in wires {
        model.add_edge(outlet, inlet)?;
    }
    for layer in &layers {
        let node = model.node(node_for_layer[&layer.id]);
        ensure!(
            node.inputs.len() == layer.inputs.len(),
            "Layer {:?} declares {} inputs, {} are connected",
            layer.name,
            layer.inputs.len(),
            node.inputs.len()
        );
    }

    for layer in &layers {
        let id = node_for_layer[&layer.id];
        let node = model.node(id);
        if node.op_is::<Parameter>() {
            model.parameters.push(id);
        } else if node.op_is::<Output>() {
            model.results.push(id);
        }
    }

    model.check_edges()?;
    model.check_interface()?;
    let declared: Vec<TVec<TypedFact>> =
        model.nodes().iter().map(|n| n.outputs.iter().map(|o| o.fact.clone()).collect()).collect();
    model.infer_facts()?;
    for (node, declared) in model.nodes().iter().zip(declared) {
        for (slot, (outlet, declared)) in node.outputs.iter().zip(declared).enumerate() {
            ensure!(
                outlet.fact.compatible_with(&declared),
                "Node {} output {} is declared as {:?}, inferred as {:?}",
                node,
                slot,
                declared,
                outlet.fact
            );
        }
    }
    debug!("Loaded model {:?}: {} nodes", model.name, model.nodes().len());
    Ok(model)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::xml::parse_document;

    const MODEL: &str = r#"<?xml version="1.0"?>
<net name="tiny" version="11">
    <layers>
        <layer id="0" name="x" type="Parameter" version="opset1">
            <data shape="?,2" element_type="f32"/>
            <output><port id="0" precision="FP32" names="x"><dim>-1</dim><dim>2</dim></port></output>
        </layer>
        <layer id="1" name="two" type="Const" version="opset1">
            <data element_type="f32" shape="2" offset="0" size="8"/>
            <output><port id="0" precision="FP32"><dim>2</dim></port></output>
        </layer>
        <layer id="2" name="mul" type="Multiply" version="opset1">
            <data auto_broadcast="numpy"/>
            <input>
                <port id="0" precision="FP32"><dim>-1</dim><dim>2</dim></port>
                <port id="1" precision="FP32"><dim>2</dim></port>
            </input>
            <output><port id="2" precision="FP32" names="mul:0,y"><dim>-1</dim><dim>2</dim></port></output>
        </layer>
        <layer id="3" name="out" type="Result" version="opset1">
            <input><port id="0" precision="FP32"><dim>-1</dim><dim>2</dim></port></input>
        </layer>
    </layers>
    <edges>
        <edge from-layer="2" from-port="2" to-layer="3" to-port="0"/>
        <edge from-layer="1" from-port="0" to-layer="2" to-port="1"/>
        <edge from-layer="0" from-port="0" to-layer="2" to-port="0"/>
    </edges>
</net>
"#;

    fn weights() -> Vec<u8> {
        [2f32, 3.].iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn load(doc: &str) -> CarveResult<Graph> {
        read_model(&parse_document(doc)?, &weights(), &crate::registry::opset())
    }

    #[test]
    fn tiny_model() {
        let model = load(MODEL).unwrap();
        assert_eq!(model.name, "tiny");
        assert_eq!(model.nodes().len(), 4);
        assert_eq!(model.parameters, vec![0]);
        assert_eq!(model.results, vec![3]);
        let mul = model.node_id_by_name("mul").unwrap();
        assert_eq!(model.node(mul).inputs, vec![OutletId::new(0, 0), OutletId::new(1, 0)]);
        assert_eq!(model.outlet_names(OutletId::new(mul, 0)), &["mul:0", "y"]);
        let plan = SimplePlan::new(&model).unwrap();
        let out = plan.run(tvec!(tensor2(&[[1f32, 1.]]))).unwrap();
        assert_eq!(*out[0], tensor2(&[[2f32, 3.]]));
    }

    #[test]
    fn missing_edge_is_reported() {
        let doc = MODEL.replace(r#"<edge from-layer="1" from-port="0" to-layer="2" to-port="1"/>"#, "");
        let err = load(&doc).unwrap_err();
        assert!(format!("{err:?}").contains("declares 2 inputs"));
    }

    #[test]
    fn bad_port_is_reported() {
        let doc = MODEL.replace(r#"from-layer="2" from-port="2""#, r#"from-layer="2" from-port="7""#);
        let err = load(&doc).unwrap_err();
        assert!(format!("{err:?}").contains("no output port 7"));
    }

    #[test]
    fn declared_shape_must_agree() {
        let doc = MODEL.replace(
            r#"names="mul:0,y"><dim>-1</dim><dim>2</dim>"#,
            r#"names="mul:0,y"><dim>-1</dim><dim>3</dim>"#,
        );
        let err = load(&doc).unwrap_err();
        assert!(format!("{err:?}").contains("declared as"));
    }

    #[test]
    fn unknown_layer_type() {
        let doc = MODEL.replace(r#"type="Multiply""#, r#"type="Einsum""#);
        let err = load(&doc).unwrap_err();
        assert!(format!("{err:?}").contains("Einsum"));
    }
}

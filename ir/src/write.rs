//! Graph to IR document and weights.
use crate::internal::*;
use crate::layer::Port;
use crate::weights;
use crate::xml::Element;
use carve_core::ops::dummy::Dummy;
use carve_core::ops::konst::Const;

fn port(model: &Graph, id: usize, outlet: OutletId) -> CarveResult<Port> {
    let fact = model.outlet_fact(outlet)?;
    Ok(Port {
        id,
        precision: Some(fact.datum_type),
        shape: fact.shape.clone(),
        names: model.outlet_names(outlet).to_vec(),
    })
}

/// Serialize `model`, appending constant payloads to `weights`.
///
/// Layer ids are node ids, output port ids follow the input port ids.
pub fn write_model(model: &Graph, weights: &mut Vec<u8>) -> CarveResult<Element> {
    let mut layers = Element::new("layers");
    let mut edges = Element::new("edges");
    for node in model.nodes() {
        ensure!(!node.op_is::<Dummy>(), "Obliterated node {} left in the model", node);
        let mut layer = Element::new("layer")
            .with_attr("id", node.id)
            .with_attr("name", &node.name)
            .with_attr("type", node.op().name())
            .with_attr("version", node.op().version());
        let mut data = Element::new("data");
        data.attributes = node.op().attributes();
        if let Some(konst) = node.op_as::<Const>() {
            let offset = weights.len();
            let size = weights::write_tensor(weights, &konst.0)
                .with_context(|| format!("Writing weights of {node}"))?;
            data = data.with_attr("offset", offset).with_attr("size", size);
        }
        if !data.attributes.is_empty() {
            layer = layer.with_child(data);
        }
        if !node.inputs.is_empty() {
            let mut input = Element::new("input");
            for (ix, outlet) in node.inputs.iter().enumerate() {
                let mut p = port(model, ix, *outlet)?;
                p.names.clear();
                input = input.with_child(p.to_element());
                let source = model.node(outlet.node);
                edges = edges.with_child(
                    Element::new("edge")
                        .with_attr("from-layer", outlet.node)
                        .with_attr("from-port", source.inputs.len() + outlet.slot)
                        .with_attr("to-layer", node.id)
                        .with_attr("to-port", ix),
                );
            }
            layer = layer.with_child(input);
        }
        if !node.outputs.is_empty() {
            let mut output = Element::new("output");
            for slot in 0..node.outputs.len() {
                let p = port(model, node.inputs.len() + slot, OutletId::new(node.id, slot))?;
                output = output.with_child(p.to_element());
            }
            layer = layer.with_child(output);
        }
        layers = layers.with_child(layer);
    }
    let name = if model.name.is_empty() { "model" } else { &*model.name };
    Ok(Element::new("net")
        .with_attr("name", name)
        .with_attr("version", 11)
        .with_child(layers)
        .with_child(edges))
}

use crate::internal::*;
use crate::layer::Layer;
use crate::weights;
use carve_core::ops::array::{Concat, Reshape, Split};
use carve_core::ops::binary::BinaryKind;
use carve_core::ops::cast::Cast;
use carve_core::ops::io::{Output, Parameter};
use carve_core::ops::konst::Const;
use carve_core::ops::matmul::MatMul;

/// Builds an op from a layer declaration and the model weights.
pub type FromIr = fn(&Layer, &[u8]) -> CarveResult<Box<dyn Op>>;

/// Layer type to op mapping.
#[derive(Clone)]
pub struct Registry {
    pub id: String,
    pub from_ir: HashMap<String, FromIr>,
}

impl Registry {
    pub fn new(id: impl Into<String>) -> Registry {
        Registry { id: id.into(), from_ir: HashMap::new() }
    }

    pub fn register(&mut self, kind: impl Into<String>, from_ir: FromIr) {
        self.from_ir.insert(kind.into(), from_ir);
    }

    pub fn with(mut self, kind: impl Into<String>, from_ir: FromIr) -> Registry {
        self.register(kind, from_ir);
        self
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.from_ir.contains_key(kind)
    }

    pub fn op_for_layer(&self, layer: &Layer, weights: &[u8]) -> CarveResult<Box<dyn Op>> {
        let from_ir = self
            .from_ir
            .get(&layer.kind)
            .with_context(|| format!("Unsupported layer type {} (layer {:?})", layer.kind, layer.name))?;
        from_ir(layer, weights)
            .with_context(|| format!("Loading layer {:?} ({})", layer.name, layer.kind))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut kinds: Vec<&str> = self.from_ir.keys().map(|k| &**k).collect();
        kinds.sort();
        write!(f, "Registry({}: {})", self.id, kinds.join(", "))
    }
}

/// The operation set carve knows.
pub fn opset() -> Registry {
    let mut reg = Registry::new("opset")
        .with("Parameter", parameter)
        .with("Const", konst)
        .with("Result", result)
        .with("MatMul", matmul)
        .with("Concat", concat)
        .with("Split", split)
        .with("Reshape", reshape)
        .with("Convert", convert);
    for kind in BinaryKind::ALL {
        reg.register(kind.name(), binary);
    }
    for kind in UnaryKind::ALL {
        reg.register(kind.name(), unary);
    }
    reg
}

fn parameter(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    let dt: DatumType = layer.parse_attr("element_type")?;
    let shape = ShapeFact::parse_ir(layer.required_attr("shape")?)?;
    Ok(Box::new(Parameter::new(TypedFact::dt_shape(dt, shape))))
}

fn konst(layer: &Layer, weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    let dt: DatumType = layer.parse_attr("element_type")?;
    let shape = ShapeFact::parse_ir(layer.required_attr("shape")?)?
        .as_concrete()
        .context("Constant shapes must be concrete")?;
    let offset: usize = layer.parse_attr("offset")?;
    let size: usize = layer.parse_attr("size")?;
    let bytes = offset
        .checked_add(size)
        .and_then(|end| weights.get(offset..end))
        .with_context(|| {
            format!(
                "Weights range of {} bytes at offset {} out of bounds ({} bytes)",
                size,
                offset,
                weights.len()
            )
        })?;
    let tensor = weights::read_tensor(dt, &shape, bytes)?;
    Ok(Box::new(Const::new(tensor.into_arc_tensor())))
}

fn result(_layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    Ok(Box::new(Output))
}

fn binary(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    let kind = BinaryKind::from_name(&layer.kind).with_context(|| format!("{} is not binary", layer.kind))?;
    if let Some(mode) = layer.attr("auto_broadcast") {
        ensure!(
            mode == "numpy" || mode == "none",
            "Unsupported auto_broadcast mode {:?}",
            mode
        );
    }
    Ok(kind.into_op())
}

fn unary(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    let kind = UnaryKind::from_name(&layer.kind).with_context(|| format!("{} is not unary", layer.kind))?;
    Ok(kind.into_op())
}

fn matmul(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    let transpose_a = layer.bool_attr("transpose_a", false)?;
    let transpose_b = layer.bool_attr("transpose_b", false)?;
    Ok(Box::new(MatMul::new(transpose_a, transpose_b)))
}

fn concat(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    Ok(Box::new(Concat::new(layer.parse_attr("axis")?)))
}

fn split(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    Ok(Box::new(Split::new(layer.parse_attr("num_splits")?)))
}

fn reshape(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    Ok(Box::new(Reshape::new(layer.bool_attr("special_zero", false)?)))
}

fn convert(layer: &Layer, _weights: &[u8]) -> CarveResult<Box<dyn Op>> {
    Ok(Box::new(Cast::new(layer.parse_attr("destination_type")?)))
}

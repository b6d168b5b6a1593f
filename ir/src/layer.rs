//! Layer declarations, as found in the `<layers>` section of an IR document.
use crate::internal::*;
use crate::xml::Element;
use std::str::FromStr;

/// A declared port: its id in the layer, its declared type, shape and
/// tensor names.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: usize,
    pub precision: Option<DatumType>,
    pub shape: ShapeFact,
    pub names: Vec<String>,
}

impl Port {
    fn from_element(e: &Element) -> CarveResult<Port> {
        let id = e.required_attr("id")?.parse().context("Invalid port id")?;
        let precision = e.attr("precision").map(|p| p.parse()).transpose()?;
        let shape = e.children_named("dim").map(|d| d.text.parse::<Dim>()).collect::<CarveResult<_>>()?;
        let names = e.attr("names").map(split_names).unwrap_or_default();
        Ok(Port { id, precision, shape, names })
    }

    /// The declared fact. A port without precision is typed after `fallback`.
    pub fn fact(&self, fallback: Option<DatumType>) -> CarveResult<TypedFact> {
        let dt = self
            .precision
            .or(fallback)
            .with_context(|| format!("Port {} has no precision", self.id))?;
        Ok(TypedFact::dt_shape(dt, self.shape.clone()))
    }

    pub fn to_element(&self) -> Element {
        let mut port = Element::new("port").with_attr("id", self.id);
        if let Some(dt) = self.precision {
            port = port.with_attr("precision", dt.ir_precision());
        }
        if !self.names.is_empty() {
            port = port.with_attr("names", join_names(&self.names));
        }
        for d in self.shape.iter() {
            let text = match d {
                Dim::Val(v) => v.to_string(),
                Dim::Any => "-1".to_string(),
            };
            port = port.with_child(Element::new("dim").with_text(text));
        }
        port
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: usize,
    pub name: String,
    pub kind: String,
    pub version: Option<String>,
    pub data: Vec<(String, String)>,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl Layer {
    pub fn from_element(e: &Element) -> CarveResult<Layer> {
        let id = e.required_attr("id")?.parse().context("Invalid layer id")?;
        let name = e.required_attr("name")?.to_string();
        let kind = e.required_attr("type")?.to_string();
        let version = e.attr("version").map(|v| v.to_string());
        let data = e.child("data").map(|d| d.attributes.clone()).unwrap_or_default();
        let ports = |section: &str| -> CarveResult<Vec<Port>> {
            e.child(section)
                .map(|s| s.children_named("port").map(Port::from_element).collect())
                .unwrap_or(Ok(vec![]))
        };
        let inputs = ports("input").with_context(|| format!("Parsing input ports of layer {name:?}"))?;
        let outputs = ports("output").with_context(|| format!("Parsing output ports of layer {name:?}"))?;
        Ok(Layer { id, name, kind, version, data, inputs, outputs })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.data.iter().find(|(k, _)| k == name).map(|(_, v)| &**v)
    }

    pub fn required_attr(&self, name: &str) -> CarveResult<&str> {
        self.attr(name)
            .with_context(|| format!("Layer {:?} ({}) has no attribute {}", self.name, self.kind, name))
    }

    pub fn parse_attr<T>(&self, name: &str) -> CarveResult<T>
    where
        T: FromStr,
        T::Err: Into<CarveError>,
    {
        let value = self.required_attr(name)?;
        value
            .trim()
            .parse::<T>()
            .map_err(|e| -> CarveError { e.into() })
            .with_context(|| format!("Invalid value {value:?} for attribute {name}"))
    }

    pub fn bool_attr(&self, name: &str, default: bool) -> CarveResult<bool> {
        self.attr(name).map(|v| carve_core::ops::parse_bool(name, v)).unwrap_or(Ok(default))
    }

    /// Slot of the input port `id`.
    pub fn input_slot(&self, id: usize) -> CarveResult<usize> {
        self.inputs
            .iter()
            .position(|p| p.id == id)
            .with_context(|| format!("Layer {:?} has no input port {}", self.name, id))
    }

    /// Slot of the output port `id`.
    pub fn output_slot(&self, id: usize) -> CarveResult<usize> {
        self.outputs
            .iter()
            .position(|p| p.id == id)
            .with_context(|| format!("Layer {:?} has no output port {}", self.name, id))
    }
}

/// Split a `names` attribute on unescaped commas.
pub fn split_names(s: &str) -> Vec<String> {
    let mut names = vec![];
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next)
                }
            }
            ',' => names.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    names.push(current);
    names.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect()
}

pub fn join_names(names: &[String]) -> String {
    names.iter().map(|n| n.replace('\\', "\\\\").replace(',', "\\,")).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn names_with_commas() {
        assert_eq!(split_names("a,b"), vec!["a", "b"]);
        assert_eq!(split_names(r"a\,b, c"), vec!["a,b", "c"]);
        assert!(split_names("").is_empty());
        let names = vec!["x,y".to_string(), r"back\slash".to_string(), "z".to_string()];
        assert_eq!(split_names(&join_names(&names)), names);
    }

    #[test]
    fn layer_declaration() {
        let doc = r#"
            <layer id="3" name="gru/split" type="Split" version="opset1">
                <data num_splits="2"/>
                <input><port id="0" precision="FP32"><dim>-1</dim><dim>8</dim></port></input>
                <output>
                    <port id="2" precision="FP32" names="a,b"><dim>-1</dim><dim>4</dim></port>
                    <port id="3" precision="FP32"><dim>-1</dim><dim>4</dim></port>
                </output>
            </layer>"#;
        let layer = Layer::from_element(&parse_document(doc).unwrap()).unwrap();
        assert_eq!(layer.id, 3);
        assert_eq!(layer.kind, "Split");
        assert_eq!(layer.parse_attr::<usize>("num_splits").unwrap(), 2);
        assert!(layer.parse_attr::<usize>("axis").is_err());
        assert_eq!(layer.output_slot(3).unwrap(), 1);
        assert!(layer.output_slot(0).is_err());
        assert_eq!(layer.outputs[0].names, vec!["a", "b"]);
        let fact = layer.inputs[0].fact(None).unwrap();
        assert_eq!(fact, TypedFact::dt_shape(DatumType::F32, ShapeFact::from_dims([Dim::Any, Dim::Val(8)])));
    }
}

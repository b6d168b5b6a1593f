use crate::internal::*;
use crate::registry::{Registry, opset};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// OpenVINO-style IR framework: a `.xml` topology and a `.bin` weights
/// file side by side.
#[derive(Clone, Debug)]
pub struct Ir {
    pub registry: Registry,
}

impl Default for Ir {
    fn default() -> Ir {
        Ir { registry: opset() }
    }
}

impl Ir {
    /// Load `path` and the `.bin` file next to it. A missing weights file
    /// is only an error if a constant needs it.
    pub fn model_for_path(&self, path: impl AsRef<Path>) -> CarveResult<Graph> {
        let path = path.as_ref();
        let xml = fs_err::read_to_string(path)?;
        let bin = path.with_extension("bin");
        let weights = if bin.exists() {
            fs_err::read(&bin)?
        } else {
            warn!("No weights file {:?}", bin);
            vec![]
        };
        self.model_for_str(&xml, &weights).with_context(|| format!("Loading model {path:?}"))
    }

    pub fn model_for_read(&self, xml: &mut dyn Read, weights: &mut dyn Read) -> CarveResult<Graph> {
        let mut doc = String::new();
        xml.read_to_string(&mut doc)?;
        let mut bytes = vec![];
        weights.read_to_end(&mut bytes)?;
        self.model_for_str(&doc, &bytes)
    }

    pub fn model_for_str(&self, xml: &str, weights: &[u8]) -> CarveResult<Graph> {
        let net = crate::xml::parse_document(xml)?;
        crate::read::read_model(&net, weights, &self.registry)
    }

    pub fn write(&self, model: &Graph, xml: &mut impl Write, weights: &mut impl Write) -> CarveResult<()> {
        let mut bytes = vec![];
        let net = crate::write::write_model(model, &mut bytes)?;
        writeln!(xml, "<?xml version=\"1.0\"?>")?;
        net.write(xml, 0)?;
        weights.write_all(&bytes)?;
        Ok(())
    }

    /// Write `<prefix>.xml` and `<prefix>.bin`, overwriting existing files.
    pub fn write_to_files(&self, model: &Graph, prefix: impl AsRef<Path>) -> CarveResult<(PathBuf, PathBuf)> {
        let with_ext = |ext: &str| {
            let mut p = prefix.as_ref().as_os_str().to_owned();
            p.push(ext);
            PathBuf::from(p)
        };
        let (xml_path, bin_path) = (with_ext(".xml"), with_ext(".bin"));
        let mut xml = std::io::BufWriter::new(fs_err::File::create(&xml_path)?);
        let mut bin = std::io::BufWriter::new(fs_err::File::create(&bin_path)?);
        self.write(model, &mut xml, &mut bin)?;
        xml.flush()?;
        bin.flush()?;
        info!("Wrote {:?} and {:?}", xml_path, bin_path);
        Ok((xml_path, bin_path))
    }
}

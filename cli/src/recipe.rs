use carve_core::internal::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extraction targets stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Recipe {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub strategy: Option<String>,
}

impl Recipe {
    pub fn from_path(path: impl AsRef<Path>) -> CarveResult<Recipe> {
        let path = path.as_ref();
        let text = fs_err::read_to_string(path)?;
        Self::from_json(&text).with_context(|| format!("Reading recipe {path:?}"))
    }

    pub fn from_json(json: &str) -> CarveResult<Recipe> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn strategy(&self) -> CarveResult<Option<InputStrategy>> {
        self.strategy.as_deref().map(|s| s.parse()).transpose()
    }
}

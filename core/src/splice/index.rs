use crate::internal::*;

/// Operation lookup by friendly name.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    ids: HashMap<String, usize>,
}

impl NameIndex {
    /// Index every node of the graph, in evaluation order first.
    ///
    /// Two nodes sharing a name make the index ambiguous: this is an error.
    pub fn new(graph: &Graph) -> CarveResult<NameIndex> {
        let mut ids = HashMap::new();
        for id in graph.full_order()? {
            let name = &graph.node(id).name;
            if let Some(other) = ids.insert(name.clone(), id) {
                bail!("Operation name {:?} is used by nodes #{} and #{}", name, other, id);
            }
        }
        Ok(NameIndex { ids })
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> CarveResult<usize> {
        self.get(name).with_context(|| format!("Operation {name:?} not found in model"))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

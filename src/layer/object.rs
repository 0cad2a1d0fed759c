//! Objects merged across layers.

use std::sync::{Arc, OnceLock};

use super::compose::{compose, Entry, Stack};
use super::property::LayeredCompoundReader;
use crate::core::{CompoundPropertyReader, ObjectHeader, ObjectReader};
use crate::util::{Error, Result};

type Source = Arc<dyn ObjectReader>;

fn resolve(sources: &[(Source, usize)]) -> Result<Vec<Source>> {
    sources
        .iter()
        .map(|(parent, index)| parent.child(*index))
        .collect()
}

/// One object path merged across layers.
pub struct LayeredObjectReader {
    header: ObjectHeader,
    stack: Stack<Source>,
    children: Vec<Entry<Source, ObjectHeader>>,
    child_cache: Vec<OnceLock<Arc<LayeredObjectReader>>>,
    properties: OnceLock<Arc<LayeredCompoundReader>>,
}

impl LayeredObjectReader {
    pub(super) fn new(header: ObjectHeader, stack: Stack<Source>) -> Result<Self> {
        let children = compose(
            &stack,
            |o| o.num_children(),
            |o, i| Ok(o.child_header(i)?.clone()),
        )?;
        let child_cache = children.iter().map(|_| OnceLock::new()).collect();
        Ok(Self {
            header,
            stack,
            children,
            child_cache,
            properties: OnceLock::new(),
        })
    }

    /// Layers contributing at this path, highest priority first.
    pub fn num_layers(&self) -> usize {
        self.stack.primary.len() + self.stack.fallback.len()
    }

    fn child_reader(&self, index: usize) -> Result<Arc<LayeredObjectReader>> {
        let cell = self.child_cache.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.children.len(),
        })?;
        if let Some(child) = cell.get() {
            return Ok(child.clone());
        }
        let entry = &self.children[index];
        let stack = Stack {
            primary: resolve(&entry.primary)?,
            fallback: resolve(&entry.fallback)?,
        };
        let child = Arc::new(LayeredObjectReader::new(entry.header.clone(), stack)?);
        Ok(cell.get_or_init(|| child).clone())
    }
}

impl ObjectReader for LayeredObjectReader {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn num_children(&self) -> usize {
        self.children.len()
    }

    fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.children
            .get(index)
            .map(|e| &e.header)
            .ok_or(Error::ChildOutOfBounds {
                index,
                count: self.children.len(),
            })
    }

    fn child(&self, index: usize) -> Result<Arc<dyn ObjectReader>> {
        Ok(self.child_reader(index)?)
    }

    /// Properties come from the primary layers only.
    fn properties(&self) -> Result<Arc<dyn CompoundPropertyReader>> {
        if let Some(props) = self.properties.get() {
            return Ok(props.clone());
        }
        let compounds = self
            .stack
            .primary
            .iter()
            .map(|o| o.properties())
            .collect::<Result<Vec<_>>>()?;
        let header = compounds[0].header().clone();
        let props = Arc::new(LayeredCompoundReader::new(header, Stack::new(compounds))?);
        Ok(self.properties.get_or_init(|| props).clone())
    }
}

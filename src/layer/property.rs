//! Compound properties merged across layers.

use std::sync::{Arc, OnceLock};

use super::compose::{compose, Entry, Stack};
use crate::core::{CompoundPropertyReader, PropertyHeader, PropertyReader};
use crate::util::{Error, Result};

type Source = Arc<dyn CompoundPropertyReader>;

fn resolve(sources: &[(Source, usize)]) -> Result<Vec<Source>> {
    sources
        .iter()
        .map(|(parent, index)| parent.property(*index)?.into_compound())
        .collect()
}

/// One compound property merged across layers.
pub struct LayeredCompoundReader {
    header: PropertyHeader,
    entries: Vec<Entry<Source, PropertyHeader>>,
    cache: Vec<OnceLock<PropertyReader>>,
}

impl LayeredCompoundReader {
    pub(super) fn new(header: PropertyHeader, stack: Stack<Source>) -> Result<Self> {
        let entries = compose(
            &stack,
            |c| c.num_properties(),
            |c, i| Ok(c.property_header(i)?.clone()),
        )?;
        let cache = entries.iter().map(|_| OnceLock::new()).collect();
        Ok(Self {
            header,
            entries,
            cache,
        })
    }

    fn open_property(&self, index: usize) -> Result<PropertyReader> {
        let entry = &self.entries[index];
        let (first, first_index) = &entry.primary[0];
        if !entry.header.is_compound() {
            return first.property(*first_index);
        }
        let stack = Stack {
            primary: resolve(&entry.primary)?,
            fallback: resolve(&entry.fallback)?,
        };
        Ok(PropertyReader::Compound(Arc::new(LayeredCompoundReader::new(
            entry.header.clone(),
            stack,
        )?)))
    }
}

impl CompoundPropertyReader for LayeredCompoundReader {
    fn header(&self) -> &PropertyHeader {
        &self.header
    }

    fn num_properties(&self) -> usize {
        self.entries.len()
    }

    fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.entries
            .get(index)
            .map(|e| &e.header)
            .ok_or(Error::ChildOutOfBounds {
                index,
                count: self.entries.len(),
            })
    }

    fn property(&self, index: usize) -> Result<PropertyReader> {
        let cell = self.cache.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.entries.len(),
        })?;
        if let Some(property) = cell.get() {
            return Ok(property.clone());
        }
        let property = self.open_property(index)?;
        Ok(cell.get_or_init(|| property).clone())
    }
}

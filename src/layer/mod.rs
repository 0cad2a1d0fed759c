//! Archive layering: several archives read as one tree.
//!
//! Layers are given highest priority first. Objects and compound properties
//! with the same name are merged; a scalar or array property always comes
//! whole from the first layer that defines it.
//!
//! Two metadata flags steer the merge at a path:
//! - `prune`: the flagging layer alone supplies the path and everything
//!   below it; lower layers are dropped
//! - `replace`: the flagging layer alone decides which children and
//!   properties exist at the path, but each of those children still merges
//!   with same-named children of lower layers

mod compose;
mod object;
mod property;

use std::sync::Arc;

use crate::core::{ArchiveReader, MetaData, ObjectReader, TimeSampling};
use crate::util::{Error, Result};

use compose::Stack;
pub use object::LayeredObjectReader;
pub use property::LayeredCompoundReader;

pub const PRUNE_KEY: &str = "prune";
pub const REPLACE_KEY: &str = "replace";

fn set_flag(md: &mut MetaData, key: &str, on: bool) {
    if on {
        md.set(key, "1");
    } else {
        md.remove(key);
    }
}

pub fn set_prune(md: &mut MetaData, prune: bool) {
    set_flag(md, PRUNE_KEY, prune);
}

pub fn set_replace(md: &mut MetaData, replace: bool) {
    set_flag(md, REPLACE_KEY, replace);
}

pub fn is_pruned(md: &MetaData) -> bool {
    md.get(PRUNE_KEY) == Some("1")
}

pub fn is_replaced(md: &MetaData) -> bool {
    md.get(REPLACE_KEY) == Some("1")
}

/// Composite view over an ordered list of archives.
///
/// Archive-level data (metadata, version, time samplings) is that of the
/// highest-priority layer. Properties keep the time sampling of the archive
/// they were read from.
pub struct LayeredArchiveReader {
    name: String,
    archives: Vec<Arc<dyn ArchiveReader>>,
    top: Arc<LayeredObjectReader>,
}

impl LayeredArchiveReader {
    pub fn new(archives: Vec<Arc<dyn ArchiveReader>>) -> Result<Self> {
        if archives.is_empty() {
            return Err(Error::other("layering needs at least one archive"));
        }
        let tops = archives
            .iter()
            .map(|a| a.top())
            .collect::<Result<Vec<Arc<dyn ObjectReader>>>>()?;
        let header = tops[0].header().clone();
        let top = Arc::new(LayeredObjectReader::new(header, Stack::new(tops))?);
        let name = archives
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(" + ");
        tracing::debug!(%name, layers = archives.len(), "opened layered archive");
        Ok(Self {
            name,
            archives,
            top,
        })
    }

    pub fn layers(&self) -> &[Arc<dyn ArchiveReader>] {
        &self.archives
    }

    fn primary(&self) -> &Arc<dyn ArchiveReader> {
        &self.archives[0]
    }
}

impl ArchiveReader for LayeredArchiveReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn archive_version(&self) -> i32 {
        self.primary().archive_version()
    }

    fn archive_metadata(&self) -> &MetaData {
        self.primary().archive_metadata()
    }

    fn num_time_samplings(&self) -> usize {
        self.primary().num_time_samplings()
    }

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>> {
        self.primary().time_sampling(index)
    }

    fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<u32> {
        self.primary().max_num_samples_for_time_sampling(index)
    }

    fn top(&self) -> Result<Arc<dyn ObjectReader>> {
        Ok(self.top.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut md = MetaData::new();
        assert!(!is_pruned(&md));
        set_prune(&mut md, true);
        set_replace(&mut md, true);
        assert!(is_pruned(&md) && is_replaced(&md));
        assert_eq!(md.get(PRUNE_KEY), Some("1"));
        set_prune(&mut md, false);
        assert!(!is_pruned(&md));
        assert!(!md.contains(PRUNE_KEY));
    }

    #[test]
    fn test_no_layers() {
        assert!(LayeredArchiveReader::new(Vec::new()).is_err());
    }
}

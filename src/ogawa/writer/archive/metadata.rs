//! Indexed metadata and the time sampling table.

use super::super::write_util::MetaRef;
use super::WriteState;
use crate::core::{MetaData, TimeSampling};
use crate::ogawa::layout::{MAX_INDEXED_METADATA, MAX_INDEXED_METADATA_LEN};
use crate::util::{Error, Result};

impl WriteState {
    /// Index of `md` in the indexed table, adding it while there is room;
    /// metadata that does not fit is stored inline.
    pub(super) fn meta_ref(&mut self, md: &MetaData) -> MetaRef {
        let text = md.serialize();
        if text.is_empty() {
            return MetaRef::Indexed(0);
        }
        if let Some(&index) = self.metadata_lookup.get(&text) {
            return MetaRef::Indexed(index);
        }
        if self.indexed_metadata.len() >= MAX_INDEXED_METADATA || text.len() > MAX_INDEXED_METADATA_LEN
        {
            return MetaRef::Inline(text);
        }
        self.indexed_metadata.push(text.clone());
        let index = self.indexed_metadata.len() as u8;
        self.metadata_lookup.insert(text, index);
        MetaRef::Indexed(index)
    }

    pub(crate) fn add_time_sampling(&mut self, sampling: TimeSampling) -> Result<u32> {
        if !self.is_open() {
            return Err(Error::frozen("archive"));
        }
        if let Some(index) = self
            .samplings
            .iter()
            .position(|(existing, _)| existing.is_equivalent(&sampling))
        {
            return Ok(index as u32);
        }
        self.samplings.push((sampling, 0));
        Ok((self.samplings.len() - 1) as u32)
    }

    pub(crate) fn check_time_sampling(&self, index: u32) -> Result<()> {
        if index as usize >= self.samplings.len() {
            return Err(Error::TimeSamplingOutOfBounds {
                index: index as usize,
                count: self.samplings.len(),
            });
        }
        Ok(())
    }

    pub(super) fn note_max_samples(&mut self, index: u32, num_samples: u32) {
        if let Some((_, max)) = self.samplings.get_mut(index as usize) {
            *max = (*max).max(num_samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::OgawaArchiveWriter;
    use super::*;
    use crate::ogawa::writer::WriteOptions;

    #[test]
    fn test_meta_ref_table_limits() {
        let writer = OgawaArchiveWriter::in_memory(WriteOptions::default()).unwrap();
        let mut state = writer.shared.lock();

        assert_eq!(state.meta_ref(&MetaData::new()), MetaRef::Indexed(0));
        let a = MetaData::new().with("schema", "A_v1");
        assert_eq!(state.meta_ref(&a), MetaRef::Indexed(1));
        assert_eq!(state.meta_ref(&a), MetaRef::Indexed(1));

        let long = MetaData::new().with("k", "v".repeat(300));
        assert!(matches!(state.meta_ref(&long), MetaRef::Inline(_)));

        for i in 0..MAX_INDEXED_METADATA {
            state.meta_ref(&MetaData::new().with("n", i.to_string()));
        }
        assert_eq!(state.indexed_metadata.len(), MAX_INDEXED_METADATA);
        let overflow = MetaData::new().with("n", "overflow");
        assert!(matches!(state.meta_ref(&overflow), MetaRef::Inline(_)));
    }

    #[test]
    fn test_time_samplings_are_shared() {
        let writer = OgawaArchiveWriter::in_memory(WriteOptions::default()).unwrap();
        assert_eq!(writer.add_time_sampling(TimeSampling::identity()).unwrap(), 0);
        let a = writer.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0)).unwrap();
        let b = writer.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0)).unwrap();
        assert_eq!((a, b), (1, 1));
        assert_eq!(writer.num_time_samplings(), 2);
    }
}

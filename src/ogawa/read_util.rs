//! Decoding of the object-layer tables stored in data blobs: time
//! samplings, indexed metadata, object headers and property headers.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use super::layout::{info, INLINE_METADATA, MAX_INDEXED_METADATA, OBJECT_HASH_SIZE};
use super::reader::IData;
use crate::core::{MetaData, ObjectHeader, PropertyHeader, PropertyType, TimeSampling};
use crate::util::{DataType, Error, PlainOldDataType, Result};

/// Bounds-checked little-endian cursor over a table blob.
struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    table: &'static str,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8], table: &'static str) -> Self {
        Self { buf, pos: 0, table }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::invalid(format!("{} truncated at byte {}", self.table, self.pos))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Integer stored in 1, 2 or 4 bytes per the header size hint.
    fn hinted(&mut self, hint: u32) -> Result<u32> {
        match hint {
            0 => self.u8().map(u32::from),
            1 => self.u16().map(u32::from),
            2 => self.u32(),
            _ => Err(Error::invalid(format!("{}: size hint {hint}", self.table))),
        }
    }

    fn string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::invalid(format!("{}: name is not UTF-8", self.table)))
    }

    fn meta_data(&mut self, len: usize) -> Result<MetaData> {
        let bytes = self.take(len)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidMetadata(format!("{} holds non UTF-8 metadata", self.table)))?;
        Ok(MetaData::parse(text))
    }
}

/// One entry of the archive time sampling table.
#[derive(Clone, Debug)]
pub struct SamplingRecord {
    pub sampling: Arc<TimeSampling>,
    /// Largest sample count written against this sampling.
    pub max_samples: u32,
}

/// Decode the time sampling table of root slot 4.
pub fn read_time_samplings(data: &IData) -> Result<Vec<SamplingRecord>> {
    let buf = data.read_all()?;
    let mut dec = Decoder::new(&buf, "time sampling table");
    let mut records = Vec::new();

    while !dec.is_done() {
        let max_samples = dec.u32()?;
        let time_per_cycle = dec.f64()?;
        let count = dec.u32()? as usize;
        if count == 0 {
            return Err(Error::invalid("time sampling with no stored times"));
        }
        let times = (0..count).map(|_| dec.f64()).collect::<Result<Vec<_>>>()?;
        records.push(SamplingRecord {
            sampling: Arc::new(TimeSampling::from_stored(time_per_cycle, times)),
            max_samples,
        });
    }

    if records.is_empty() {
        records.push(SamplingRecord {
            sampling: Arc::new(TimeSampling::identity()),
            max_samples: 0,
        });
    }
    Ok(records)
}

/// Decode the indexed metadata table of root slot 5. Entry 0 is the
/// implicit empty metadata.
pub fn read_indexed_metadata(data: &IData) -> Result<Vec<MetaData>> {
    let buf = data.read_all()?;
    let mut dec = Decoder::new(&buf, "indexed metadata");
    let mut table = vec![MetaData::new()];

    while !dec.is_done() {
        let len = dec.u8()? as usize;
        table.push(dec.meta_data(len)?);
        if table.len() > MAX_INDEXED_METADATA + 1 {
            return Err(Error::invalid("indexed metadata table too long"));
        }
    }
    Ok(table)
}

fn lookup_meta_data(index: u8, indexed: &[MetaData]) -> Result<MetaData> {
    indexed
        .get(index as usize)
        .cloned()
        .ok_or_else(|| Error::invalid(format!("metadata index {index} out of range")))
}

/// Decode the child headers blob of an object group.
///
/// The trailing digest pair is skipped; a blob holding only the digests
/// describes an object with no children.
pub fn read_object_headers(
    data: &IData,
    parent_path: &str,
    indexed: &[MetaData],
) -> Result<Vec<ObjectHeader>> {
    if data.size() <= OBJECT_HASH_SIZE as u64 {
        return Ok(Vec::new());
    }
    let buf = data.read_all()?;
    let body = &buf[..buf.len() - OBJECT_HASH_SIZE];
    let mut dec = Decoder::new(body, "object headers");
    let mut headers = Vec::new();

    while !dec.is_done() {
        let name_len = dec.u32()? as usize;
        if name_len == 0 {
            return Err(Error::invalid("object header with an empty name"));
        }
        let name = dec.string(name_len)?;
        let meta_data = match dec.u8()? {
            INLINE_METADATA => {
                let len = dec.u32()? as usize;
                dec.meta_data(len)?
            }
            index => lookup_meta_data(index, indexed)?,
        };
        let full_name = ObjectHeader::child_path(parent_path, &name);
        headers.push(ObjectHeader::new(name, full_name, meta_data));
    }
    Ok(headers)
}

/// Property header plus the sample bookkeeping stored next to it.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyRecord {
    pub header: PropertyHeader,
    pub num_samples: u32,
    /// First sample index that differs from sample 0; 0 when constant.
    pub first_changed: u32,
    /// Last sample index that differs from its predecessor.
    pub last_changed: u32,
    /// Every array sample has the same number of points.
    pub homogenous: bool,
}

impl PropertyRecord {
    pub fn is_constant(&self) -> bool {
        self.first_changed == 0 && self.last_changed == 0
    }

    /// Number of data slots the property group holds.
    pub fn num_stored(&self) -> usize {
        if self.num_samples == 0 {
            0
        } else if self.is_constant() {
            1
        } else {
            (self.last_changed - self.first_changed + 2) as usize
        }
    }

    /// Stored slot of sample `index`. Samples before the first change share
    /// slot 0 and samples after the last change share the final slot.
    pub fn slot_for(&self, index: usize) -> usize {
        if self.is_constant() {
            return 0;
        }
        let first = self.first_changed as usize;
        let last = self.last_changed as usize;
        if index < first {
            0
        } else if index > last {
            last - first + 1
        } else {
            index - first + 1
        }
    }
}

/// Decode the property headers blob that ends a compound group.
pub fn read_property_headers(data: &IData, indexed: &[MetaData]) -> Result<Vec<PropertyRecord>> {
    let buf = data.read_all()?;
    let mut dec = Decoder::new(&buf, "property headers");
    let mut records = Vec::new();

    while !dec.is_done() {
        let bits = dec.u32()?;
        let property_type = PropertyType::from_code(bits & info::PROPERTY_TYPE_MASK);
        let hint = (bits & info::SIZE_HINT_MASK) >> info::SIZE_HINT_SHIFT;

        let mut data_type = DataType::UNKNOWN;
        let mut time_sampling_index = 0;
        let mut num_samples = 0;
        let (mut first_changed, mut last_changed) = (0, 0);
        let mut homogenous = false;

        if property_type != PropertyType::Compound {
            let pod = PlainOldDataType::from_u8(((bits & info::POD_MASK) >> info::POD_SHIFT) as u8);
            if !pod.is_known() {
                return Err(Error::invalid(format!("property header pod code in {bits:#x}")));
            }
            let extent = ((bits & info::EXTENT_MASK) >> info::EXTENT_SHIFT) as u8;
            data_type = DataType::new(pod, extent);
            homogenous = bits & info::HOMOGENOUS != 0;

            num_samples = dec.hinted(hint)?;
            if bits & info::EXPLICIT_CHANGES != 0 {
                first_changed = dec.hinted(hint)?;
                last_changed = dec.hinted(hint)?;
            } else if bits & info::CONSTANT == 0 {
                first_changed = 1;
                last_changed = num_samples.saturating_sub(1);
            }
            let bad_range = first_changed > last_changed
                || (first_changed == 0 && last_changed != 0)
                || (num_samples > 0 && last_changed >= num_samples);
            if bad_range {
                return Err(Error::invalid(format!(
                    "changed range {first_changed}..={last_changed} for {num_samples} samples"
                )));
            }
            if bits & info::HAS_TIME_SAMPLING != 0 {
                time_sampling_index = dec.hinted(hint)?;
            }
        }

        let name_len = dec.hinted(hint)? as usize;
        if name_len == 0 {
            return Err(Error::invalid("property header with an empty name"));
        }
        let name = dec.string(name_len)?;

        let meta_index = ((bits & info::METADATA_MASK) >> info::METADATA_SHIFT) as u8;
        let meta_data = if meta_index == INLINE_METADATA {
            let len = dec.hinted(hint)? as usize;
            dec.meta_data(len)?
        } else {
            lookup_meta_data(meta_index, indexed)?
        };

        records.push(PropertyRecord {
            header: PropertyHeader {
                name,
                property_type,
                data_type,
                time_sampling_index,
                meta_data,
            },
            num_samples,
            first_changed,
            last_changed,
            homogenous,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(num_samples: u32, first: u32, last: u32) -> PropertyRecord {
        PropertyRecord {
            header: PropertyHeader::scalar("x", DataType::INT32),
            num_samples,
            first_changed: first,
            last_changed: last,
            homogenous: true,
        }
    }

    #[test]
    fn test_slot_mapping() {
        // 0 0 0 1 2 2 2: samples 3 and 4 changed
        let r = record(7, 3, 4);
        let slots: Vec<_> = (0..7).map(|i| r.slot_for(i)).collect();
        assert_eq!(slots, vec![0, 0, 0, 1, 2, 2, 2]);
        assert_eq!(r.num_stored(), 3);

        let every = record(4, 1, 3);
        assert_eq!((0..4).map(|i| every.slot_for(i)).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(every.num_stored(), 4);

        let constant = record(10, 0, 0);
        assert!(constant.is_constant());
        assert_eq!(constant.slot_for(9), 0);
        assert_eq!(constant.num_stored(), 1);
        assert_eq!(record(0, 0, 0).num_stored(), 0);
    }

    #[test]
    fn test_decoder_bounds() {
        let mut dec = Decoder::new(&[1, 0, 0], "test");
        assert_eq!(dec.hinted(1).unwrap(), 1);
        assert!(matches!(dec.u32(), Err(Error::InvalidStructure(_))));
        assert!(dec.hinted(3).is_err());
    }
}

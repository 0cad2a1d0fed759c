//! Encoders for the object-layer tables. Each mirrors a decoder in
//! `ogawa::read_util`.

use crate::core::{PropertyHeader, PropertyType, TimeSampling};
use crate::ogawa::layout::{info, size_hint_for, INLINE_METADATA};

/// Integer in 1, 2 or 4 bytes per the header size hint.
pub(crate) fn write_with_hint(buf: &mut Vec<u8>, value: u32, hint: u32) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

/// Where a header's metadata lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum MetaRef {
    Indexed(u8),
    Inline(String),
}

impl MetaRef {
    fn index(&self) -> u8 {
        match self {
            Self::Indexed(index) => *index,
            Self::Inline(_) => INLINE_METADATA,
        }
    }

    fn inline_len(&self) -> u32 {
        match self {
            Self::Indexed(_) => 0,
            Self::Inline(text) => text.len() as u32,
        }
    }
}

/// Time sampling table: per entry the max sample count, time per cycle,
/// stored time count and the stored times.
pub(crate) fn encode_time_samplings<'a>(
    entries: impl IntoIterator<Item = (&'a TimeSampling, u32)>,
) -> Vec<u8> {
    let mut buf = Vec::new();
    for (sampling, max_samples) in entries {
        let times = sampling.stored_times();
        buf.extend_from_slice(&max_samples.to_le_bytes());
        buf.extend_from_slice(&sampling.time_per_cycle().to_le_bytes());
        buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
        for t in times {
            buf.extend_from_slice(&t.to_le_bytes());
        }
    }
    buf
}

/// Indexed metadata table, without the implicit empty entry 0.
pub(crate) fn encode_indexed_metadata<'a>(entries: impl IntoIterator<Item = &'a str>) -> Vec<u8> {
    let mut buf = Vec::new();
    for text in entries {
        buf.push(text.len() as u8);
        buf.extend_from_slice(text.as_bytes());
    }
    buf
}

/// Append one child object header.
pub(crate) fn encode_object_header(buf: &mut Vec<u8>, name: &str, meta: &MetaRef) {
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.push(meta.index());
    if let MetaRef::Inline(text) = meta {
        buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
        buf.extend_from_slice(text.as_bytes());
    }
}

/// Sample bookkeeping written next to a scalar or array header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SampleSpan {
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
    pub homogenous: bool,
}

impl SampleSpan {
    fn is_constant(&self) -> bool {
        self.first_changed == 0 && self.last_changed == 0
    }

    /// The default range `1..=n-1` is implied and not stored.
    fn is_explicit(&self) -> bool {
        !self.is_constant()
            && !(self.first_changed == 1 && self.last_changed + 1 == self.num_samples)
    }
}

/// Append one property header. `span` is ignored for compounds.
pub(crate) fn encode_property_header(
    buf: &mut Vec<u8>,
    header: &PropertyHeader,
    span: &SampleSpan,
    meta: &MetaRef,
) {
    let sampled = header.property_type != PropertyType::Compound;
    let ts_index = header.time_sampling_index;

    let mut widest = (header.name.len() as u32).max(meta.inline_len());
    if sampled {
        widest = widest
            .max(span.num_samples)
            .max(span.first_changed)
            .max(span.last_changed)
            .max(ts_index);
    }
    let hint = size_hint_for(widest);

    let mut bits = header.property_type.code() | (hint << info::SIZE_HINT_SHIFT);
    if sampled {
        bits |= (header.data_type.pod as u32) << info::POD_SHIFT;
        bits |= (header.data_type.extent as u32) << info::EXTENT_SHIFT;
        if ts_index != 0 {
            bits |= info::HAS_TIME_SAMPLING;
        }
        if span.is_constant() {
            bits |= info::CONSTANT;
        } else if span.is_explicit() {
            bits |= info::EXPLICIT_CHANGES;
        }
        if span.homogenous {
            bits |= info::HOMOGENOUS;
        }
    }
    bits |= (meta.index() as u32) << info::METADATA_SHIFT;
    buf.extend_from_slice(&bits.to_le_bytes());

    if sampled {
        write_with_hint(buf, span.num_samples, hint);
        if span.is_explicit() {
            write_with_hint(buf, span.first_changed, hint);
            write_with_hint(buf, span.last_changed, hint);
        }
        if ts_index != 0 {
            write_with_hint(buf, ts_index, hint);
        }
    }

    write_with_hint(buf, header.name.len() as u32, hint);
    buf.extend_from_slice(header.name.as_bytes());
    if let MetaRef::Inline(text) = meta {
        write_with_hint(buf, text.len() as u32, hint);
        buf.extend_from_slice(text.as_bytes());
    }
}

/// Null-terminated UTF-8 elements packed back to back.
pub(crate) fn encode_strings<S: AsRef<str>>(strings: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        out.extend_from_slice(s.as_ref().as_bytes());
        out.push(0);
    }
    out
}

/// Null-terminated UTF-32 elements packed back to back.
pub(crate) fn encode_wide_strings<S: AsRef<str>>(strings: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in strings {
        for c in s.as_ref().chars() {
            out.extend_from_slice(&(c as u32).to_le_bytes());
        }
        out.extend_from_slice(&[0; 4]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetaData;
    use crate::ogawa::read_util::read_property_headers;
    use crate::ogawa::reader::IArchive;
    use crate::ogawa::writer::{OArchive, OGroup};
    use crate::util::DataType;

    fn decode(blob: &[u8], indexed: &[MetaData]) -> Vec<crate::ogawa::read_util::PropertyRecord> {
        let mut archive = OArchive::in_memory().unwrap();
        let mut root = OGroup::new();
        root.add_data(archive.stream(), blob).unwrap();
        let bytes = archive.finish(root).unwrap().into_bytes().unwrap();
        let archive = IArchive::from_bytes("headers", bytes).unwrap();
        read_property_headers(&archive.root().data(0).unwrap(), indexed).unwrap()
    }

    #[test]
    fn test_property_header_roundtrip() {
        let indexed = vec![MetaData::new(), MetaData::new().with("interpretation", "point")];
        let mut buf = Vec::new();

        let p = PropertyHeader::array("P", DataType::VEC3F)
            .with_time_sampling(300)
            .with_meta_data(indexed[1].clone());
        let span = SampleSpan {
            num_samples: 7,
            first_changed: 3,
            last_changed: 4,
            homogenous: true,
        };
        encode_property_header(&mut buf, &p, &span, &MetaRef::Indexed(1));

        let long_meta = MetaData::new().with("note", "x".repeat(300));
        let c = PropertyHeader::compound(".geom").with_meta_data(long_meta.clone());
        encode_property_header(&mut buf, &c, &SampleSpan::default(), &MetaRef::Inline(long_meta.serialize()));

        let s = PropertyHeader::scalar("visible", DataType::INT32);
        let constant = SampleSpan {
            num_samples: 5,
            homogenous: true,
            ..SampleSpan::default()
        };
        encode_property_header(&mut buf, &s, &constant, &MetaRef::Indexed(0));

        let records = decode(&buf, &indexed);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].header, p);
        assert_eq!((records[0].first_changed, records[0].last_changed), (3, 4));
        assert_eq!(records[0].num_samples, 7);

        assert_eq!(records[1].header, c);

        assert!(records[2].is_constant());
        assert_eq!(records[2].num_samples, 5);
        assert_eq!(records[2].header.time_sampling_index, 0);
    }

    #[test]
    fn test_default_span_is_implied() {
        let span = SampleSpan {
            num_samples: 4,
            first_changed: 1,
            last_changed: 3,
            homogenous: false,
        };
        assert!(!span.is_explicit());
        let mut buf = Vec::new();
        let header = PropertyHeader::scalar("t", DataType::FLOAT64);
        encode_property_header(&mut buf, &header, &span, &MetaRef::Indexed(0));
        // info, sample count, name length, name
        assert_eq!(buf.len(), 4 + 1 + 1 + 1);
    }

    #[test]
    fn test_strings() {
        assert_eq!(encode_strings(&["ab", ""]), b"ab\0\0");
        assert_eq!(encode_wide_strings(&["a"]), vec![0x61, 0, 0, 0, 0, 0, 0, 0]);
    }
}

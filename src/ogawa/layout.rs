//! Object-layer layout on top of the container: root slots, header
//! bitfields and table limits shared by the reader and the writer.

/// Format version stored in root slot 0.
pub const ARCHIVE_FORMAT_VERSION: i32 = 0;

/// Library version written to root slot 1 (1.8.10).
pub const LIBRARY_VERSION: i32 = 10810;

/// Oldest library version accepted on read.
pub const MIN_LIBRARY_VERSION: i32 = 9999;

/// Root group slots.
pub mod root {
    pub const FORMAT_VERSION: usize = 0;
    pub const LIBRARY_VERSION: usize = 1;
    pub const TOP_OBJECT: usize = 2;
    pub const ARCHIVE_METADATA: usize = 3;
    pub const TIME_SAMPLINGS: usize = 4;
    pub const INDEXED_METADATA: usize = 5;
    pub const COUNT: usize = 6;
}

/// Content key in front of every sample payload.
pub const SAMPLE_KEY_SIZE: usize = 16;

/// Digest pair trailing the child headers of an object.
pub const OBJECT_HASH_SIZE: usize = 32;

/// Metadata index meaning "stored inline after the name".
pub const INLINE_METADATA: u8 = 0xff;

/// Entries in the indexed metadata table, excluding implicit entry 0.
pub const MAX_INDEXED_METADATA: usize = 254;

/// Longest serialized metadata that may be indexed.
pub const MAX_INDEXED_METADATA_LEN: usize = 255;

/// Property header info bitfield.
pub mod info {
    pub const PROPERTY_TYPE_MASK: u32 = 0x0000_0003;
    pub const SIZE_HINT_MASK: u32 = 0x0000_000c;
    pub const SIZE_HINT_SHIFT: u32 = 2;
    pub const POD_MASK: u32 = 0x0000_00f0;
    pub const POD_SHIFT: u32 = 4;
    pub const HAS_TIME_SAMPLING: u32 = 0x0000_0100;
    pub const EXPLICIT_CHANGES: u32 = 0x0000_0200;
    pub const HOMOGENOUS: u32 = 0x0000_0400;
    pub const CONSTANT: u32 = 0x0000_0800;
    pub const EXTENT_MASK: u32 = 0x000f_f000;
    pub const EXTENT_SHIFT: u32 = 12;
    pub const METADATA_MASK: u32 = 0x0ff0_0000;
    pub const METADATA_SHIFT: u32 = 20;
}

/// Width code for the variable-size integers of one property header.
#[inline]
pub const fn size_hint_for(max_value: u32) -> u32 {
    if max_value < 256 {
        0
    } else if max_value < 65536 {
        1
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_hint() {
        assert_eq!(size_hint_for(0), 0);
        assert_eq!(size_hint_for(255), 0);
        assert_eq!(size_hint_for(256), 1);
        assert_eq!(size_hint_for(65535), 1);
        assert_eq!(size_hint_for(65536), 2);
    }

    #[test]
    fn test_fields_do_not_overlap() {
        let fields = [
            info::PROPERTY_TYPE_MASK,
            info::SIZE_HINT_MASK,
            info::POD_MASK,
            info::HAS_TIME_SAMPLING,
            info::EXPLICIT_CHANGES,
            info::HOMOGENOUS,
            info::CONSTANT,
            info::EXTENT_MASK,
            info::METADATA_MASK,
        ];
        for (i, a) in fields.iter().enumerate() {
            for b in &fields[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }
}

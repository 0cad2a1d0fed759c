//! Container layout constants and child reference encoding.

/// Magic bytes at the start of every container.
pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header.
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the big-endian version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root group position in the header.
pub const ROOT_POS_OFFSET: usize = 8;

/// Container version written and accepted.
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag once the writer has finalized the file.
pub const FROZEN_FLAG: u8 = 0xFF;

/// Frozen flag while the file is still being written.
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// MSB of a child reference: set for data, clear for group.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;

/// Remaining 63 bits of a child reference.
pub const OFFSET_MASK: u64 = !TYPE_FLAG_MASK;

/// Reference to a group with no children.
pub const EMPTY_GROUP: u64 = 0;

/// Reference to a zero-length data blob.
pub const EMPTY_DATA: u64 = TYPE_FLAG_MASK;

/// Reference to a slot that was reserved but never filled.
///
/// Clear MSB with all offset bits set: no group can start there because
/// files are bounded below 2^63 bytes.
pub const INVALID_REF: u64 = OFFSET_MASK;

#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Strip the type flag.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}

/// Decoded child reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildKind {
    /// Reserved slot never set.
    Absent,
    EmptyGroup,
    EmptyData,
    /// Group at the given file position.
    Group(u64),
    /// Data blob at the given file position.
    Data(u64),
}

impl ChildKind {
    /// Decode a raw 8-byte reference.
    pub const fn decode(raw: u64) -> Self {
        match raw {
            INVALID_REF => Self::Absent,
            EMPTY_GROUP => Self::EmptyGroup,
            EMPTY_DATA => Self::EmptyData,
            r if is_data_offset(r) => Self::Data(extract_offset(r)),
            r => Self::Group(r),
        }
    }

    /// Encode back into a raw 8-byte reference.
    pub const fn encode(self) -> u64 {
        match self {
            Self::Absent => INVALID_REF,
            Self::EmptyGroup => EMPTY_GROUP,
            Self::EmptyData => EMPTY_DATA,
            Self::Group(pos) => make_group_offset(pos),
            Self::Data(pos) => make_data_offset(pos),
        }
    }

    #[inline]
    pub const fn is_group(self) -> bool {
        matches!(self, Self::Group(_) | Self::EmptyGroup)
    }

    #[inline]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Data(_) | Self::EmptyData)
    }

    /// Short label for diagnostics.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::EmptyGroup => "empty group",
            Self::EmptyData => "empty data",
            Self::Group(_) => "group",
            Self::Data(_) => "data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let group = make_group_offset(0x1234);
        assert!(is_group_offset(group));
        assert_eq!(group, 0x1234);

        let data = make_data_offset(0x5678);
        assert!(is_data_offset(data));
        assert_eq!(data, 0x8000_0000_0000_5678);
        assert_eq!(extract_offset(data), 0x5678);
    }

    #[test]
    fn test_sentinels_are_distinct() {
        assert_eq!(ChildKind::decode(0), ChildKind::EmptyGroup);
        assert_eq!(ChildKind::decode(0x8000_0000_0000_0000), ChildKind::EmptyData);
        assert_eq!(ChildKind::decode(0x7FFF_FFFF_FFFF_FFFF), ChildKind::Absent);
        assert_eq!(ChildKind::decode(16), ChildKind::Group(16));
        assert_eq!(ChildKind::decode(make_data_offset(16)), ChildKind::Data(16));
    }

    #[test]
    fn test_kind_roundtrip() {
        let kinds = [
            ChildKind::Absent,
            ChildKind::EmptyGroup,
            ChildKind::EmptyData,
            ChildKind::Group(40),
            ChildKind::Data(1 << 40),
        ];
        for kind in kinds {
            assert_eq!(ChildKind::decode(kind.encode()), kind);
        }
    }
}

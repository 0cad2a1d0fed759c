//! DataType: element pod plus extent.

use super::PlainOldDataType;
use std::fmt;

/// How one element of a sample is stored.
///
/// A point is `Float32` with extent 3, a 4x4 matrix `Float64` with extent 16.
/// The extent is stored in an 8-bit header field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType {
    pub pod: PlainOldDataType,
    pub extent: u8,
}

impl DataType {
    #[inline]
    pub const fn new(pod: PlainOldDataType, extent: u8) -> Self {
        Self { pod, extent }
    }

    /// Extent-one type.
    #[inline]
    pub const fn scalar(pod: PlainOldDataType) -> Self {
        Self { pod, extent: 1 }
    }

    /// Bytes per element, 0 for strings.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        self.pod.num_bytes() * self.extent as usize
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.pod.is_known() && self.extent > 0
    }

    pub const UNKNOWN: Self = Self::new(PlainOldDataType::Unknown, 0);

    pub const BOOL: Self = Self::scalar(PlainOldDataType::Boolean);
    pub const UINT8: Self = Self::scalar(PlainOldDataType::Uint8);
    pub const INT16: Self = Self::scalar(PlainOldDataType::Int16);
    pub const UINT32: Self = Self::scalar(PlainOldDataType::Uint32);
    pub const INT32: Self = Self::scalar(PlainOldDataType::Int32);
    pub const UINT64: Self = Self::scalar(PlainOldDataType::Uint64);
    pub const INT64: Self = Self::scalar(PlainOldDataType::Int64);
    pub const FLOAT16: Self = Self::scalar(PlainOldDataType::Float16);
    pub const FLOAT32: Self = Self::scalar(PlainOldDataType::Float32);
    pub const FLOAT64: Self = Self::scalar(PlainOldDataType::Float64);
    pub const STRING: Self = Self::scalar(PlainOldDataType::String);
    pub const WSTRING: Self = Self::scalar(PlainOldDataType::Wstring);

    pub const VEC2F: Self = Self::new(PlainOldDataType::Float32, 2);
    pub const VEC3F: Self = Self::new(PlainOldDataType::Float32, 3);
    pub const VEC3D: Self = Self::new(PlainOldDataType::Float64, 3);
    pub const BOX3D: Self = Self::new(PlainOldDataType::Float64, 6);
    pub const MAT44D: Self = Self::new(PlainOldDataType::Float64, 16);
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extent == 1 {
            f.write_str(self.pod.name())
        } else {
            write!(f, "{}[{}]", self.pod.name(), self.extent)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::BOOL.num_bytes(), 1);
        assert_eq!(DataType::VEC3F.num_bytes(), 12);
        assert_eq!(DataType::MAT44D.num_bytes(), 128);
        assert_eq!(DataType::STRING.num_bytes(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::FLOAT32.to_string(), "float32_t");
        assert_eq!(DataType::VEC3D.to_string(), "float64_t[3]");
    }

    #[test]
    fn test_validity() {
        assert!(DataType::VEC3F.is_valid());
        assert!(!DataType::UNKNOWN.is_valid());
        assert!(!DataType::new(PlainOldDataType::Float32, 0).is_valid());
    }
}

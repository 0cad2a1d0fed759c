//! Plain old data element types stored in property samples.

use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt;

/// Element type of a property sample.
///
/// The discriminants are the on-disk codes stored in the 4-bit pod field of
/// property headers, so they must never be renumbered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlainOldDataType {
    Boolean = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    /// Null-terminated UTF-8 strings
    String = 12,
    /// Null-terminated UTF-32 strings (4-byte code points)
    Wstring = 13,
    #[default]
    Unknown = 127,
}

const ALL_PODS: [PlainOldDataType; 14] = [
    PlainOldDataType::Boolean,
    PlainOldDataType::Uint8,
    PlainOldDataType::Int8,
    PlainOldDataType::Uint16,
    PlainOldDataType::Int16,
    PlainOldDataType::Uint32,
    PlainOldDataType::Int32,
    PlainOldDataType::Uint64,
    PlainOldDataType::Int64,
    PlainOldDataType::Float16,
    PlainOldDataType::Float32,
    PlainOldDataType::Float64,
    PlainOldDataType::String,
    PlainOldDataType::Wstring,
];

impl PlainOldDataType {
    /// Size of one element in bytes.
    ///
    /// Strings have no fixed size and report 0.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Boolean | Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
            Self::String | Self::Wstring | Self::Unknown => 0,
        }
    }

    /// Name as written into metadata and shown by tools.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool_t",
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
            Self::String => "string",
            Self::Wstring => "wstring",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Inverse of [`name`](Self::name).
    pub fn from_name(name: &str) -> Self {
        ALL_PODS
            .iter()
            .copied()
            .find(|pod| pod.name() == name)
            .unwrap_or(Self::Unknown)
    }

    /// Decode the on-disk pod code.
    pub const fn from_u8(v: u8) -> Self {
        if (v as usize) < ALL_PODS.len() {
            ALL_PODS[v as usize]
        } else {
            Self::Unknown
        }
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Wstring)
    }

    #[inline]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for PlainOldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust element types that map one-to-one onto a fixed-size pod.
///
/// Used by typed sample accessors to check the stored type before any
/// bytes are reinterpreted.
pub trait PodElement: Pod + Zeroable + Copy + Default {
    const POD_TYPE: PlainOldDataType;
}

macro_rules! impl_pod_element {
    ($($ty:ty => $pod:ident),* $(,)?) => {
        $(impl PodElement for $ty {
            const POD_TYPE: PlainOldDataType = PlainOldDataType::$pod;
        })*
    };
}

impl_pod_element! {
    u8 => Uint8,
    i8 => Int8,
    u16 => Uint16,
    i16 => Int16,
    u32 => Uint32,
    i32 => Int32,
    u64 => Uint64,
    i64 => Int64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float64,
}

/// One-byte boolean, matching the stored `bool_t` layout.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl PodElement for Bool {
    const POD_TYPE: PlainOldDataType = PlainOldDataType::Boolean;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_sizes() {
        assert_eq!(PlainOldDataType::Boolean.num_bytes(), 1);
        assert_eq!(PlainOldDataType::Float16.num_bytes(), 2);
        assert_eq!(PlainOldDataType::Int32.num_bytes(), 4);
        assert_eq!(PlainOldDataType::Float64.num_bytes(), 8);
        assert_eq!(PlainOldDataType::String.num_bytes(), 0);
    }

    #[test]
    fn test_codes_and_names() {
        for code in 0..14u8 {
            let pod = PlainOldDataType::from_u8(code);
            assert_eq!(pod as u8, code);
            assert_eq!(PlainOldDataType::from_name(pod.name()), pod);
        }
        assert_eq!(PlainOldDataType::from_u8(14), PlainOldDataType::Unknown);
        assert_eq!(PlainOldDataType::from_name("vec3"), PlainOldDataType::Unknown);
    }

    #[test]
    fn test_bool() {
        assert!(Bool::new(true).get());
        assert!(!Bool::FALSE.get());
        assert_eq!(std::mem::size_of::<Bool>(), 1);
        assert_eq!(<Bool as PodElement>::POD_TYPE, PlainOldDataType::Boolean);
    }
}

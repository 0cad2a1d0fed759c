//! Object and property headers.

use super::MetaData;
use crate::util::DataType;

/// Name, path and metadata of an object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectHeader {
    /// Name among siblings.
    pub name: String,
    /// Absolute path, `/` for the top object.
    pub full_name: String,
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>, meta_data: MetaData) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data,
        }
    }

    /// Header of the unnamed top object.
    pub fn top() -> Self {
        Self::new("ABC", "/", MetaData::new())
    }

    /// Path of a child named `name` under `parent_path`.
    pub fn child_path(parent_path: &str, name: &str) -> String {
        if parent_path == "/" {
            format!("/{name}")
        } else {
            format!("{parent_path}/{name}")
        }
    }
}

/// Kind of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Compound,
    Scalar,
    Array,
}

impl PropertyType {
    /// Two-bit code stored in property headers.
    pub const fn code(self) -> u32 {
        match self {
            Self::Compound => 0,
            Self::Scalar => 1,
            Self::Array => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Scalar => "scalar",
            Self::Array => "array",
        }
    }

    /// Code 3 is the scalar-like form of an array and decodes as array.
    pub const fn from_code(code: u32) -> Self {
        match code & 0x3 {
            0 => Self::Compound,
            1 => Self::Scalar,
            _ => Self::Array,
        }
    }
}

/// Name, kind, type, sampling and metadata of a property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyHeader {
    pub name: String,
    pub property_type: PropertyType,
    /// Unknown for compounds.
    pub data_type: DataType,
    /// Index into the archive time sampling table; 0 for compounds.
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
}

impl PropertyHeader {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PropertyType::Scalar, data_type)
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PropertyType::Array, data_type)
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Compound, DataType::UNKNOWN)
    }

    fn new(name: impl Into<String>, property_type: PropertyType, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type,
            data_type,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }

    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path() {
        assert_eq!(ObjectHeader::child_path("/", "geo"), "/geo");
        assert_eq!(ObjectHeader::child_path("/geo", "shape"), "/geo/shape");
    }

    #[test]
    fn test_type_codes() {
        for ty in [PropertyType::Compound, PropertyType::Scalar, PropertyType::Array] {
            assert_eq!(PropertyType::from_code(ty.code()), ty);
        }
        assert_eq!(PropertyType::from_code(3), PropertyType::Array);
    }
}

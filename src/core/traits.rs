//! Reader contract shared by every backend and by the layered view.
//!
//! Readers are handed out as `Arc<dyn ...>`. Each one keeps the archive
//! state it was created from alive, so an object or property may outlive the
//! handle it was reached through.

use std::sync::Arc;

use super::cache::{split_strings, split_wide_strings, SampleDigest, Slab};
use super::header::{ObjectHeader, PropertyHeader, PropertyType};
use super::metadata::MetaData;
use super::sample::SampleSelector;
use super::time_sampling::{Chrono, TimeSampling, NON_TIME};
use crate::util::{DataType, Dimensions, Error, PlainOldDataType, PodElement, Result};

/// An opened archive.
pub trait ArchiveReader: Send + Sync {
    fn name(&self) -> &str;

    /// Library version recorded by the writer.
    fn archive_version(&self) -> i32;

    fn archive_metadata(&self) -> &MetaData;

    fn num_time_samplings(&self) -> usize;

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>>;

    /// Largest sample count written against time sampling `index`.
    fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<u32>;

    /// The unnamed object at `/`.
    fn top(&self) -> Result<Arc<dyn ObjectReader>>;
}

/// An object in the hierarchy.
pub trait ObjectReader: Send + Sync {
    fn header(&self) -> &ObjectHeader;

    fn num_children(&self) -> usize;

    fn child_header(&self, index: usize) -> Result<&ObjectHeader>;

    fn child(&self, index: usize) -> Result<Arc<dyn ObjectReader>>;

    fn properties(&self) -> Result<Arc<dyn CompoundPropertyReader>>;

    fn name(&self) -> &str {
        &self.header().name
    }

    fn full_name(&self) -> &str {
        &self.header().full_name
    }

    fn meta_data(&self) -> &MetaData {
        &self.header().meta_data
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        (0..self.num_children()).find(|&i| {
            self.child_header(i)
                .map(|h| h.name == name)
                .unwrap_or(false)
        })
    }

    fn child_by_name(&self, name: &str) -> Result<Arc<dyn ObjectReader>> {
        let index = self.child_index(name).ok_or_else(|| {
            Error::ObjectNotFound(ObjectHeader::child_path(self.full_name(), name))
        })?;
        self.child(index)
    }
}

/// A property reader of any kind.
#[derive(Clone)]
pub enum PropertyReader {
    Scalar(Arc<dyn ScalarPropertyReader>),
    Array(Arc<dyn ArrayPropertyReader>),
    Compound(Arc<dyn CompoundPropertyReader>),
}

impl PropertyReader {
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
            Self::Compound(p) => p.header(),
        }
    }

    pub fn property_type(&self) -> PropertyType {
        self.header().property_type
    }

    pub fn into_scalar(self) -> Result<Arc<dyn ScalarPropertyReader>> {
        match self {
            Self::Scalar(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Scalar, &other)),
        }
    }

    pub fn into_array(self) -> Result<Arc<dyn ArrayPropertyReader>> {
        match self {
            Self::Array(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Array, &other)),
        }
    }

    pub fn into_compound(self) -> Result<Arc<dyn CompoundPropertyReader>> {
        match self {
            Self::Compound(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Compound, &other)),
        }
    }
}

fn kind_mismatch(expected: PropertyType, actual: &PropertyReader) -> Error {
    Error::mismatch(
        format!("{expected:?} property"),
        format!("{:?} property {}", actual.property_type(), actual.header().name),
    )
}

/// A named, ordered set of child properties.
pub trait CompoundPropertyReader: Send + Sync {
    fn header(&self) -> &PropertyHeader;

    fn num_properties(&self) -> usize;

    fn property_header(&self, index: usize) -> Result<&PropertyHeader>;

    fn property(&self, index: usize) -> Result<PropertyReader>;

    fn property_index(&self, name: &str) -> Option<usize> {
        (0..self.num_properties()).find(|&i| {
            self.property_header(i)
                .map(|h| h.name == name)
                .unwrap_or(false)
        })
    }

    fn property_header_by_name(&self, name: &str) -> Result<&PropertyHeader> {
        let index = self
            .property_index(name)
            .ok_or_else(|| Error::PropertyNotFound(name.to_string()))?;
        self.property_header(index)
    }

    fn property_by_name(&self, name: &str) -> Result<PropertyReader> {
        let index = self
            .property_index(name)
            .ok_or_else(|| Error::PropertyNotFound(name.to_string()))?;
        self.property(index)
    }

    fn scalar(&self, name: &str) -> Result<Arc<dyn ScalarPropertyReader>> {
        self.property_by_name(name)?.into_scalar()
    }

    fn array(&self, name: &str) -> Result<Arc<dyn ArrayPropertyReader>> {
        self.property_by_name(name)?.into_array()
    }

    fn compound(&self, name: &str) -> Result<Arc<dyn CompoundPropertyReader>> {
        self.property_by_name(name)?.into_compound()
    }
}

/// Shared behavior of scalar and array properties.
pub trait SampledPropertyReader: Send + Sync {
    fn header(&self) -> &PropertyHeader;

    fn num_samples(&self) -> usize;

    /// Every sample is the same stored value.
    fn is_constant(&self) -> bool;

    fn time_sampling(&self) -> &Arc<TimeSampling>;

    fn data_type(&self) -> DataType {
        self.header().data_type
    }

    /// Time of sample `index`, [`NON_TIME`] for constant properties.
    fn sample_time(&self, index: usize) -> Result<Chrono> {
        let count = self.num_samples();
        if index >= count {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        if self.is_constant() {
            return Ok(NON_TIME);
        }
        Ok(self.time_sampling().sample_time(index))
    }

    /// Resolve a selector against this property's samples.
    fn select(&self, selector: SampleSelector) -> Result<usize> {
        selector.resolve(self.time_sampling(), self.num_samples())
    }
}

/// Property with one fixed-size value per sample.
pub trait ScalarPropertyReader: SampledPropertyReader {
    /// Copy exactly `data_type().num_bytes()` bytes into `buf`.
    fn read_sample(&self, index: usize, buf: &mut [u8]) -> Result<()>;

    /// Stored bytes of sample `index`; the only way to read string scalars.
    fn read_sample_vec(&self, index: usize) -> Result<Vec<u8>>;

    fn sample_key(&self, index: usize) -> Result<SampleDigest>;
}

/// Property with a variable-length typed array per sample.
pub trait ArrayPropertyReader: SampledPropertyReader {
    /// Shared decoded buffer of sample `index`.
    fn sample(&self, index: usize) -> Result<Slab>;

    fn sample_dimensions(&self, index: usize) -> Result<Dimensions>;

    fn sample_key(&self, index: usize) -> Result<SampleDigest>;
}

impl dyn ScalarPropertyReader {
    /// Extent-one value of type `T`.
    pub fn get<T: PodElement>(&self, selector: impl Into<SampleSelector>) -> Result<T> {
        let values = self.get_elements::<T>(selector)?;
        match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::mismatch(
                DataType::scalar(T::POD_TYPE),
                self.data_type(),
            )),
        }
    }

    /// All `extent` elements of one sample.
    pub fn get_elements<T: PodElement>(&self, selector: impl Into<SampleSelector>) -> Result<Vec<T>> {
        let data_type = self.data_type();
        if data_type.pod != T::POD_TYPE {
            return Err(Error::mismatch(T::POD_TYPE, data_type));
        }
        let index = self.select(selector.into())?;
        let mut values = vec![T::default(); data_type.extent as usize];
        self.read_sample(index, bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }

    /// String value of a `string` or `wstring` scalar with extent one.
    pub fn get_string(&self, selector: impl Into<SampleSelector>) -> Result<String> {
        let index = self.select(selector.into())?;
        let bytes = self.read_sample_vec(index)?;
        let strings = match self.data_type().pod {
            PlainOldDataType::String => split_strings(&bytes)?,
            PlainOldDataType::Wstring => split_wide_strings(&bytes)?,
            pod => return Err(Error::mismatch("string", pod)),
        };
        Ok(strings.into_iter().next().unwrap_or_default())
    }
}

impl dyn ArrayPropertyReader {
    /// Copy of one sample as `T` elements.
    pub fn get_vec<T: PodElement>(&self, selector: impl Into<SampleSelector>) -> Result<Vec<T>> {
        let data_type = self.data_type();
        if data_type.pod != T::POD_TYPE {
            return Err(Error::mismatch(T::POD_TYPE, data_type));
        }
        let index = self.select(selector.into())?;
        self.sample(index)?.to_vec::<T>()
    }

    pub fn get_strings(&self, selector: impl Into<SampleSelector>) -> Result<Vec<String>> {
        let index = self.select(selector.into())?;
        self.sample(index)?.to_strings()
    }
}

//! High-level archive API.
//!
//! This module provides the main entry points for reading and writing:
//! - [`IArchive`] / [`OArchive`] - Archive (file) access, plain or layered
//! - [`IObject`] / [`OObject`] - Hierarchical scene objects
//! - [`ICompoundProperty`] / [`OCompoundProperty`] - Property containers
//! - [`IScalarProperty`] / [`OScalarProperty`] - Single-value properties
//! - [`IArrayProperty`] / [`OArrayProperty`] - Array properties
//! - [`schema`] - Typed views over schema compounds
//!
//! Wrappers own an `Arc` of the reader they wrap, so any of them can outlive
//! the archive handle they were reached through.
//!
//! ## Example
//!
//! ```ignore
//! use alembic_core::abc::IArchive;
//!
//! let archive = IArchive::open("animation.abc")?;
//! println!("Root has {} children", archive.getTop()?.getNumChildren());
//! ```

#![allow(non_snake_case)]

pub mod schema;

use std::path::Path;
use std::sync::Arc;

use crate::core::{
    ArchiveReader, ArrayPropertyReader, Chrono, CompoundPropertyReader, MetaData, ObjectHeader,
    ObjectReader, PropertyHeader, PropertyReader, SampleDigest, SampledPropertyReader,
    SampleSelector, ScalarPropertyReader, Slab, TimeSampling,
};
use crate::layer::LayeredArchiveReader;
use crate::ogawa::writer::{APPLICATION_KEY, DESCRIPTION_KEY};
use crate::ogawa::{OgawaArchiveReader, ReadOptions};
use crate::util::{DataType, Dimensions, Error, PodElement, Result};

pub use crate::ogawa::writer::{
    OArrayProperty, OCompoundProperty, OObject, OScalarProperty, OgawaArchiveWriter as OArchive,
    WriteOptions,
};

// ============================================================================
// Archives
// ============================================================================

/// Input archive: one file, or several layered into one tree.
#[derive(Clone)]
pub struct IArchive {
    reader: Arc<dyn ArchiveReader>,
}

impl IArchive {
    /// Open an archive with the default read options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &ReadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<Self> {
        let reader = OgawaArchiveReader::open_with(path, options)?;
        Ok(Self::from_reader(Arc::new(reader)))
    }

    /// Open several files as one layered tree, highest priority first.
    pub fn open_layered<P: AsRef<Path>>(paths: &[P], options: &ReadOptions) -> Result<Self> {
        let archives = paths
            .iter()
            .map(|p| {
                OgawaArchiveReader::open_with(p, options)
                    .map(|r| Arc::new(r) as Arc<dyn ArchiveReader>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::layered(archives)
    }

    /// Layer already opened archives, highest priority first.
    pub fn layered(archives: Vec<Arc<dyn ArchiveReader>>) -> Result<Self> {
        Ok(Self::from_reader(Arc::new(LayeredArchiveReader::new(archives)?)))
    }

    /// Wrap any reader backend.
    pub fn from_reader(reader: Arc<dyn ArchiveReader>) -> Self {
        Self { reader }
    }

    /// The wrapped reader, e.g. for layering it under another archive.
    pub fn reader(&self) -> &Arc<dyn ArchiveReader> {
        &self.reader
    }

    pub fn getName(&self) -> &str {
        self.reader.name()
    }

    /// Library version the archive was written with, as `AABBCC`.
    pub fn getArchiveVersion(&self) -> i32 {
        self.reader.archive_version()
    }

    pub fn getNumTimeSamplings(&self) -> usize {
        self.reader.num_time_samplings()
    }

    pub fn getTimeSampling(&self, index: usize) -> Result<Arc<TimeSampling>> {
        self.reader.time_sampling(index)
    }

    pub fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<u32> {
        self.reader.max_num_samples_for_time_sampling(index)
    }

    pub fn archive_metadata(&self) -> &MetaData {
        self.reader.archive_metadata()
    }

    /// Application that wrote the archive, if recorded.
    pub fn app_name(&self) -> Option<&str> {
        self.archive_metadata().get(APPLICATION_KEY)
    }

    pub fn user_description(&self) -> Option<&str> {
        self.archive_metadata().get(DESCRIPTION_KEY)
    }

    /// The unnamed root object.
    pub fn getTop(&self) -> Result<IObject> {
        Ok(IObject::new(self.reader.top()?))
    }

    /// Find an object by full path such as `/parent/child`; `/` is the top.
    pub fn find_object(&self, path: &str) -> Result<IObject> {
        let mut object = self.getTop()?;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            object = object.getChildByName(part)?;
        }
        Ok(object)
    }

    pub fn has_object(&self, path: &str) -> bool {
        self.find_object(path).is_ok()
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Input object in the scene hierarchy.
#[derive(Clone)]
pub struct IObject {
    reader: Arc<dyn ObjectReader>,
}

impl IObject {
    pub fn new(reader: Arc<dyn ObjectReader>) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &Arc<dyn ObjectReader> {
        &self.reader
    }

    pub fn getHeader(&self) -> &ObjectHeader {
        self.reader.header()
    }

    pub fn getName(&self) -> &str {
        self.reader.name()
    }

    pub fn getFullName(&self) -> &str {
        self.reader.full_name()
    }

    pub fn getMetaData(&self) -> &MetaData {
        self.reader.meta_data()
    }

    /// The top object sits at path "/". Its header name is "ABC".
    pub fn isRoot(&self) -> bool {
        self.getFullName() == "/"
    }

    pub fn getNumChildren(&self) -> usize {
        self.reader.num_children()
    }

    pub fn getChildHeader(&self, index: usize) -> Result<&ObjectHeader> {
        self.reader.child_header(index)
    }

    pub fn getChild(&self, index: usize) -> Result<IObject> {
        self.reader.child(index).map(IObject::new)
    }

    pub fn getChildByName(&self, name: &str) -> Result<IObject> {
        self.reader.child_by_name(name).map(IObject::new)
    }

    /// Iterate over all children, surfacing read errors per child.
    pub fn getChildren(&self) -> impl Iterator<Item = Result<IObject>> + '_ {
        (0..self.getNumChildren()).map(|i| self.getChild(i))
    }

    pub fn getProperties(&self) -> Result<ICompoundProperty> {
        self.reader.properties().map(ICompoundProperty::new)
    }

    /// Check the object's `schema` metadata.
    pub fn matchesSchema(&self, title: &str) -> bool {
        self.getMetaData().schema() == Some(title)
    }
}

// ============================================================================
// Properties
// ============================================================================

/// Input compound property (container for other properties).
#[derive(Clone)]
pub struct ICompoundProperty {
    reader: Arc<dyn CompoundPropertyReader>,
}

impl ICompoundProperty {
    pub fn new(reader: Arc<dyn CompoundPropertyReader>) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &Arc<dyn CompoundPropertyReader> {
        &self.reader
    }

    pub fn getHeader(&self) -> &PropertyHeader {
        self.reader.header()
    }

    pub fn getName(&self) -> &str {
        &self.getHeader().name
    }

    pub fn getMetaData(&self) -> &MetaData {
        &self.getHeader().meta_data
    }

    pub fn getNumProperties(&self) -> usize {
        self.reader.num_properties()
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.reader.property_index(name).is_some()
    }

    pub fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.reader.property_header(index)
    }

    pub fn property_names(&self) -> Vec<String> {
        (0..self.getNumProperties())
            .filter_map(|i| self.reader.property_header(i).ok())
            .map(|h| h.name.clone())
            .collect()
    }

    pub fn property(&self, index: usize) -> Result<PropertyReader> {
        self.reader.property(index)
    }

    pub fn scalar(&self, name: &str) -> Result<IScalarProperty> {
        self.reader.scalar(name).map(IScalarProperty)
    }

    pub fn array(&self, name: &str) -> Result<IArrayProperty> {
        self.reader.array(name).map(IArrayProperty)
    }

    pub fn compound(&self, name: &str) -> Result<ICompoundProperty> {
        self.reader.compound(name).map(ICompoundProperty::new)
    }
}

macro_rules! sampled_accessors {
    () => {
        pub fn getHeader(&self) -> &PropertyHeader {
            self.0.header()
        }

        pub fn getName(&self) -> &str {
            &self.getHeader().name
        }

        pub fn getDataType(&self) -> DataType {
            self.0.data_type()
        }

        pub fn getNumSamples(&self) -> usize {
            self.0.num_samples()
        }

        pub fn is_constant(&self) -> bool {
            self.0.is_constant()
        }

        pub fn getTimeSampling(&self) -> &Arc<TimeSampling> {
            self.0.time_sampling()
        }

        pub fn time_sampling_index(&self) -> u32 {
            self.getHeader().time_sampling_index
        }

        /// Time of a sample; the non-time sentinel for constant properties.
        pub fn sample_time(&self, index: usize) -> Result<Chrono> {
            self.0.sample_time(index)
        }

        /// Resolve an index or time lookup to a sample index.
        pub fn select(&self, sel: impl Into<SampleSelector>) -> Result<usize> {
            self.0.select(sel.into())
        }
    };
}

/// Input scalar property.
#[derive(Clone)]
pub struct IScalarProperty(Arc<dyn ScalarPropertyReader>);

impl IScalarProperty {
    sampled_accessors!();

    pub fn reader(&self) -> &Arc<dyn ScalarPropertyReader> {
        &self.0
    }

    /// Copy the raw sample into `out`, which must be exactly the sample size.
    pub fn read_sample(&self, sel: impl Into<SampleSelector>, out: &mut [u8]) -> Result<()> {
        let index = self.select(sel)?;
        self.0.read_sample(index, out)
    }

    pub fn get<T: PodElement>(&self, sel: impl Into<SampleSelector>) -> Result<T> {
        self.0.get(sel)
    }

    pub fn get_elements<T: PodElement>(&self, sel: impl Into<SampleSelector>) -> Result<Vec<T>> {
        self.0.get_elements(sel)
    }

    pub fn get_string(&self, sel: impl Into<SampleSelector>) -> Result<String> {
        self.0.get_string(sel)
    }

    pub fn get_key(&self, sel: impl Into<SampleSelector>) -> Result<SampleDigest> {
        let index = self.select(sel)?;
        self.0.sample_key(index)
    }
}

/// Input array property.
#[derive(Clone)]
pub struct IArrayProperty(Arc<dyn ArrayPropertyReader>);

impl IArrayProperty {
    sampled_accessors!();

    pub fn reader(&self) -> &Arc<dyn ArrayPropertyReader> {
        &self.0
    }

    /// Shared decoded buffer of one sample.
    pub fn get_sample(&self, sel: impl Into<SampleSelector>) -> Result<Slab> {
        let index = self.select(sel)?;
        self.0.sample(index)
    }

    pub fn get_vec<T: PodElement>(&self, sel: impl Into<SampleSelector>) -> Result<Vec<T>> {
        self.0.get_vec(sel)
    }

    pub fn get_strings(&self, sel: impl Into<SampleSelector>) -> Result<Vec<String>> {
        self.0.get_strings(sel)
    }

    pub fn get_dimensions(&self, sel: impl Into<SampleSelector>) -> Result<Dimensions> {
        let index = self.select(sel)?;
        self.0.sample_dimensions(index)
    }

    pub fn get_key(&self, sel: impl Into<SampleSelector>) -> Result<SampleDigest> {
        let index = self.select(sel)?;
        self.0.sample_key(index)
    }
}

impl TryFrom<PropertyReader> for IScalarProperty {
    type Error = Error;

    fn try_from(reader: PropertyReader) -> Result<Self> {
        reader.into_scalar().map(IScalarProperty)
    }
}

impl TryFrom<PropertyReader> for IArrayProperty {
    type Error = Error;

    fn try_from(reader: PropertyReader) -> Result<Self> {
        reader.into_array().map(IArrayProperty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::ErrorKind;

    fn sample_archive() -> Result<IArchive> {
        let writer = OArchive::in_memory(WriteOptions::default().with_application("abc test"))?;
        let geo = writer.top().create_child("geo", MetaData::new())?;
        let shape = geo.create_child("shape", MetaData::new().with("schema", "Test_v1"))?;
        let props = shape.properties()?;
        props.create_scalar("n", DataType::UINT32, 0)?.set(7u32)?;
        props.create_array("idx", DataType::INT32, 0)?.set_vec(&[0i32, 1, 2])?;
        let bytes = writer.into_bytes()?;
        Ok(IArchive::from_reader(Arc::new(OgawaArchiveReader::from_bytes("mem", bytes)?)))
    }

    #[test]
    fn test_find_object() -> Result<()> {
        let archive = sample_archive()?;
        assert_eq!(archive.app_name(), Some("abc test"));
        assert!(archive.find_object("/")?.isRoot());
        let shape = archive.find_object("/geo/shape")?;
        assert_eq!(shape.getFullName(), "/geo/shape");
        assert!(shape.matchesSchema("Test_v1"));
        assert!(archive.has_object("geo/shape"));
        let missing = archive.find_object("/geo/nothing").err().map(|e| e.kind());
        assert_eq!(missing, Some(ErrorKind::NotFound));
        Ok(())
    }

    #[test]
    fn test_typed_properties() -> Result<()> {
        let archive = sample_archive()?;
        let props = archive.find_object("/geo/shape")?.getProperties()?;
        assert_eq!(props.property_names(), ["n", "idx"]);

        let n = props.scalar("n")?;
        assert_eq!(n.get::<u32>(0usize)?, 7);
        assert_eq!(n.get::<i32>(0usize).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(n.get::<u32>(1usize).unwrap_err().kind(), ErrorKind::OutOfRange);

        let idx = props.array("idx")?;
        assert_eq!(idx.get_vec::<i32>(0usize)?, vec![0, 1, 2]);
        assert_eq!(idx.get_dimensions(0usize)?, Dimensions::d1(3));
        assert!(props.array("n").is_err());
        assert_eq!(props.scalar("missing").err().map(|e| e.kind()), Some(ErrorKind::NotFound));
        Ok(())
    }
}

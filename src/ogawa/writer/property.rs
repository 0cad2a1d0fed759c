//! Property handles for writing.
//!
//! Samples are appended in index order. Each handle call streams the
//! payload straight to the archive; repeated values are stored once.

use super::archive::{NodeId, Shared};
use super::write_util::{encode_strings, encode_wide_strings};
use crate::core::{MetaData, PropertyHeader};
use crate::util::{DataType, Dimensions, Error, PlainOldDataType, PodElement, Result};

fn check_pod<T: PodElement>(data_type: DataType) -> Result<()> {
    if T::POD_TYPE != data_type.pod {
        return Err(Error::mismatch(data_type.pod, T::POD_TYPE));
    }
    Ok(())
}

fn encode_text<S: AsRef<str>>(data_type: DataType, values: &[S]) -> Result<Vec<u8>> {
    match data_type.pod {
        PlainOldDataType::String => Ok(encode_strings(values)),
        PlainOldDataType::Wstring => Ok(encode_wide_strings(values)),
        other => Err(Error::mismatch("string or wstring", other)),
    }
}

/// State shared by every property handle.
#[derive(Clone)]
struct Handle {
    shared: Shared,
    id: NodeId,
}

impl Handle {
    fn header(&self) -> PropertyHeader {
        self.shared.lock().property_header(self.id).clone()
    }

    fn set_meta_data(&self, meta_data: MetaData) -> Result<()> {
        self.shared.lock().set_property_meta_data(self.id, meta_data)
    }

    fn finalize(&self) -> Result<()> {
        let mut state = self.shared.lock();
        state.check_open()?;
        state.freeze_property(self.id).map(drop)
    }

    fn is_finalized(&self) -> bool {
        self.shared.lock().is_frozen(self.id)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property").field("id", &self.id).finish()
    }
}

macro_rules! handle_accessors {
    () => {
        pub fn header(&self) -> PropertyHeader {
            self.0.header()
        }

        pub fn name(&self) -> String {
            self.header().name
        }

        /// Replace the metadata; allowed until the property is finalized.
        pub fn set_meta_data(&self, meta_data: MetaData) -> Result<()> {
            self.0.set_meta_data(meta_data)
        }

        /// Write the property now. Later writes fail with [`Error::Frozen`].
        pub fn finalize(&self) -> Result<()> {
            self.0.finalize()
        }

        pub fn is_finalized(&self) -> bool {
            self.0.is_finalized()
        }
    };
}

/// Compound property: a named group of child properties.
#[derive(Clone, Debug)]
pub struct OCompoundProperty(Handle);

impl OCompoundProperty {
    pub(crate) fn new(shared: Shared, id: NodeId) -> Self {
        Self(Handle { shared, id })
    }

    handle_accessors!();

    fn create(&self, header: PropertyHeader) -> Result<NodeId> {
        self.0.shared.lock().create_property(self.0.id, header)
    }

    /// Add a scalar property sampled on time sampling `time_sampling`.
    pub fn create_scalar(
        &self,
        name: &str,
        data_type: DataType,
        time_sampling: u32,
    ) -> Result<OScalarProperty> {
        self.create_scalar_with(
            PropertyHeader::scalar(name, data_type).with_time_sampling(time_sampling),
        )
    }

    /// Add a scalar property from a full header, metadata included.
    pub fn create_scalar_with(&self, header: PropertyHeader) -> Result<OScalarProperty> {
        if !header.is_scalar() {
            return Err(Error::mismatch("scalar header", header.property_type.name()));
        }
        let id = self.create(header)?;
        Ok(OScalarProperty(Handle {
            shared: self.0.shared.clone(),
            id,
        }))
    }

    pub fn create_array(
        &self,
        name: &str,
        data_type: DataType,
        time_sampling: u32,
    ) -> Result<OArrayProperty> {
        self.create_array_with(
            PropertyHeader::array(name, data_type).with_time_sampling(time_sampling),
        )
    }

    pub fn create_array_with(&self, header: PropertyHeader) -> Result<OArrayProperty> {
        if !header.is_array() {
            return Err(Error::mismatch("array header", header.property_type.name()));
        }
        let id = self.create(header)?;
        Ok(OArrayProperty(Handle {
            shared: self.0.shared.clone(),
            id,
        }))
    }

    pub fn create_compound(&self, name: &str, meta_data: MetaData) -> Result<OCompoundProperty> {
        let id = self.create(PropertyHeader::compound(name).with_meta_data(meta_data))?;
        Ok(OCompoundProperty::new(self.0.shared.clone(), id))
    }
}

/// Scalar property: one fixed-size value (`extent` elements) per sample.
#[derive(Clone, Debug)]
pub struct OScalarProperty(Handle);

impl OScalarProperty {
    handle_accessors!();

    /// Append a raw sample of exactly `data_type.num_bytes()` bytes.
    pub fn set_sample(&self, bytes: &[u8]) -> Result<()> {
        self.0.shared.lock().write_sample(self.0.id, bytes, None)
    }

    /// Append one sample of `extent` typed elements.
    pub fn set_elements<T: PodElement>(&self, values: &[T]) -> Result<()> {
        check_pod::<T>(self.header().data_type)?;
        self.set_sample(bytemuck::cast_slice(values))
    }

    /// Append a single-element sample.
    pub fn set<T: PodElement>(&self, value: T) -> Result<()> {
        self.set_elements(std::slice::from_ref(&value))
    }

    /// Append a string sample; `values` holds `extent` strings.
    pub fn set_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let data_type = self.header().data_type;
        if values.len() != data_type.extent as usize {
            return Err(Error::BufferSize {
                expected: data_type.extent as usize,
                actual: values.len(),
            });
        }
        let bytes = encode_text(data_type, values)?;
        self.set_sample(&bytes)
    }

    pub fn set_string(&self, value: &str) -> Result<()> {
        self.set_strings(&[value])
    }

    /// Append a copy of the previous sample.
    pub fn set_from_previous(&self) -> Result<()> {
        self.0.shared.lock().repeat_sample(self.0.id)
    }

    pub fn num_samples(&self) -> usize {
        self.0.shared.lock().num_samples(self.0.id)
    }
}

/// Array property: a variable number of elements per sample.
#[derive(Clone, Debug)]
pub struct OArrayProperty(Handle);

impl OArrayProperty {
    handle_accessors!();

    /// Append a raw sample shaped by `dims`.
    pub fn set_sample(&self, bytes: &[u8], dims: Dimensions) -> Result<()> {
        self.0.shared.lock().write_sample(self.0.id, bytes, Some(dims))
    }

    /// Append a rank-1 sample. For types with an extent, `values` is the
    /// flattened element list and must divide evenly.
    pub fn set_vec<T: PodElement>(&self, values: &[T]) -> Result<()> {
        let data_type = self.header().data_type;
        check_pod::<T>(data_type)?;
        let extent = data_type.extent.max(1) as usize;
        if values.len() % extent != 0 {
            return Err(Error::BufferSize {
                expected: values.len().next_multiple_of(extent),
                actual: values.len(),
            });
        }
        self.set_sample(bytemuck::cast_slice(values), Dimensions::d1(values.len() / extent))
    }

    pub fn set_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let bytes = encode_text(self.header().data_type, values)?;
        self.set_sample(&bytes, Dimensions::d1(values.len()))
    }

    pub fn set_from_previous(&self) -> Result<()> {
        self.0.shared.lock().repeat_sample(self.0.id)
    }

    pub fn num_samples(&self) -> usize {
        self.0.shared.lock().num_samples(self.0.id)
    }
}

//! Object-model readers backed by the Ogawa container.
//!
//! Every reader holds an `Arc` of the shared archive state, so objects and
//! properties keep the file open for as long as any of them is alive.
//! Children and properties are materialized on first access and cached.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use byteorder::{ByteOrder, LittleEndian};

use super::format::ChildKind;
use super::layout::{root, ARCHIVE_FORMAT_VERSION, MIN_LIBRARY_VERSION, SAMPLE_KEY_SIZE};
use super::read_util::{
    read_indexed_metadata, read_object_headers, read_property_headers, read_time_samplings,
    PropertyRecord, SamplingRecord,
};
use super::reader::{IArchive, IData, IGroup, IStreams, ReadOptions};
use crate::core::{
    compute_digest, split_strings, ArchiveReader, ArrayPropertyReader, CompoundPropertyReader,
    MetaData, ObjectHeader, ObjectReader, PropertyHeader, PropertyReader, PropertyType,
    SampleDigest, SampledPropertyReader, ScalarPropertyReader, Slab, SlabCache, SlabKey,
    TimeSampling,
};
use crate::util::{Dimensions, Error, PlainOldDataType, Result};

/// State shared by every reader derived from one archive.
struct ArchiveState {
    archive: IArchive,
    indexed_metadata: Vec<MetaData>,
    samplings: Vec<SamplingRecord>,
    cache: SlabCache,
}

impl ArchiveState {
    fn sampling(&self, index: u32) -> Result<Arc<TimeSampling>> {
        self.samplings
            .get(index as usize)
            .map(|r| r.sampling.clone())
            .ok_or(Error::TimeSamplingOutOfBounds {
                index: index as usize,
                count: self.samplings.len(),
            })
    }
}

fn read_i32(data: &IData, what: &str) -> Result<i32> {
    if data.size() != 4 {
        return Err(Error::invalid(format!("{what} is {} bytes, expected 4", data.size())));
    }
    let mut buf = [0u8; 4];
    data.read_into(&mut buf)?;
    Ok(LittleEndian::read_i32(&buf))
}

/// An archive opened for reading.
pub struct OgawaArchiveReader {
    state: Arc<ArchiveState>,
    library_version: i32,
    meta_data: MetaData,
    top: Arc<OgawaObjectReader>,
}

impl OgawaArchiveReader {
    /// Open a file with default read options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        Self::from_archive(IArchive::open_with(path, options)?, SlabCache::new())
    }

    /// Read an archive held in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_archive(IArchive::from_bytes(name, bytes)?, SlabCache::new())
    }

    /// Build the object layer over an opened container. Cache keys are
    /// container offsets, so `cache` must only serve readers of this container.
    pub fn from_archive(archive: IArchive, cache: SlabCache) -> Result<Self> {
        let root_group = archive.root().clone();
        if root_group.num_children() < root::COUNT {
            return Err(Error::invalid(format!(
                "root group has {} children, expected {}",
                root_group.num_children(),
                root::COUNT
            )));
        }

        let format_version = read_i32(&root_group.data(root::FORMAT_VERSION)?, "format version")?;
        if !(0..=ARCHIVE_FORMAT_VERSION).contains(&format_version) {
            return Err(Error::invalid(format!("unsupported format version {format_version}")));
        }
        let library_version =
            read_i32(&root_group.data(root::LIBRARY_VERSION)?, "library version")?;
        if library_version < MIN_LIBRARY_VERSION {
            return Err(Error::invalid(format!("unsupported library version {library_version}")));
        }

        let meta_data = MetaData::parse(&root_group.data(root::ARCHIVE_METADATA)?.read_string()?);
        let samplings = read_time_samplings(&root_group.data(root::TIME_SAMPLINGS)?)?;
        let indexed_metadata = read_indexed_metadata(&root_group.data(root::INDEXED_METADATA)?)?;
        let top_group = root_group.group(root::TOP_OBJECT)?;

        tracing::debug!(
            name = archive.name(),
            library_version,
            time_samplings = samplings.len(),
            indexed_metadata = indexed_metadata.len() - 1,
            "opened archive"
        );

        let state = Arc::new(ArchiveState {
            archive,
            indexed_metadata,
            samplings,
            cache,
        });
        let mut top_header = ObjectHeader::top();
        top_header.meta_data = meta_data.clone();
        let top = Arc::new(OgawaObjectReader::new(state.clone(), top_header, top_group)?);

        Ok(Self {
            state,
            library_version,
            meta_data,
            top,
        })
    }

    pub fn streams(&self) -> &Arc<IStreams> {
        self.state.archive.streams()
    }

    /// Positional reads issued against the file so far.
    pub fn read_count(&self) -> u64 {
        self.streams().read_count()
    }

    pub fn cache(&self) -> &SlabCache {
        &self.state.cache
    }

    /// Indexed metadata table, entry 0 being the empty metadata.
    pub fn indexed_metadata(&self) -> &[MetaData] {
        &self.state.indexed_metadata
    }
}

impl ArchiveReader for OgawaArchiveReader {
    fn name(&self) -> &str {
        self.state.archive.name()
    }

    fn archive_version(&self) -> i32 {
        self.library_version
    }

    fn archive_metadata(&self) -> &MetaData {
        &self.meta_data
    }

    fn num_time_samplings(&self) -> usize {
        self.state.samplings.len()
    }

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>> {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        self.state.sampling(index)
    }

    fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<u32> {
        self.state.samplings.get(index).map(|r| r.max_samples)
    }

    fn top(&self) -> Result<Arc<dyn ObjectReader>> {
        Ok(self.top.clone())
    }
}

/// Object group: `[0]` properties, `[1..=n]` children, `[n + 1]` headers.
pub struct OgawaObjectReader {
    state: Arc<ArchiveState>,
    header: ObjectHeader,
    group: IGroup,
    children: Vec<ObjectHeader>,
    child_cache: Vec<OnceLock<Arc<OgawaObjectReader>>>,
    properties: OnceLock<Arc<OgawaCompoundReader>>,
}

impl OgawaObjectReader {
    fn new(state: Arc<ArchiveState>, header: ObjectHeader, group: IGroup) -> Result<Self> {
        let slots = group.num_children();
        let children = match slots {
            0 => Vec::new(),
            1 => return Err(Error::invalid(format!("object {} has one slot", header.full_name))),
            _ => read_object_headers(
                &group.data(slots - 1)?,
                &header.full_name,
                &state.indexed_metadata,
            )?,
        };
        if slots > 0 && children.len() != slots - 2 {
            return Err(Error::invalid(format!(
                "object {} lists {} headers for {} child groups",
                header.full_name,
                children.len(),
                slots - 2
            )));
        }
        let child_cache = children.iter().map(|_| OnceLock::new()).collect();
        Ok(Self {
            state,
            header,
            group,
            children,
            child_cache,
            properties: OnceLock::new(),
        })
    }

    fn child_reader(&self, index: usize) -> Result<Arc<OgawaObjectReader>> {
        let cell = self.child_cache.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.children.len(),
        })?;
        if let Some(child) = cell.get() {
            return Ok(child.clone());
        }
        let child = Arc::new(OgawaObjectReader::new(
            self.state.clone(),
            self.children[index].clone(),
            self.group.group(index + 1)?,
        )?);
        Ok(cell.get_or_init(|| child).clone())
    }
}

impl ObjectReader for OgawaObjectReader {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn num_children(&self) -> usize {
        self.children.len()
    }

    fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.children.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.children.len(),
        })
    }

    fn child(&self, index: usize) -> Result<Arc<dyn ObjectReader>> {
        Ok(self.child_reader(index)?)
    }

    fn properties(&self) -> Result<Arc<dyn CompoundPropertyReader>> {
        if let Some(props) = self.properties.get() {
            return Ok(props.clone());
        }
        let group = if self.group.num_children() == 0 {
            IGroup::empty(self.group.streams().clone())
        } else {
            self.group.group(0)?
        };
        let header = PropertyHeader::compound("").with_meta_data(self.header.meta_data.clone());
        let props = Arc::new(OgawaCompoundReader::new(self.state.clone(), header, group)?);
        Ok(self.properties.get_or_init(|| props).clone())
    }
}

/// Compound group: `[0..n)` property groups, `[n]` property headers.
pub struct OgawaCompoundReader {
    state: Arc<ArchiveState>,
    header: PropertyHeader,
    group: IGroup,
    records: Vec<PropertyRecord>,
    cache: Vec<OnceLock<PropertyReader>>,
}

impl OgawaCompoundReader {
    fn new(state: Arc<ArchiveState>, header: PropertyHeader, group: IGroup) -> Result<Self> {
        let slots = group.num_children();
        let records = if slots == 0 {
            Vec::new()
        } else {
            read_property_headers(&group.data(slots - 1)?, &state.indexed_metadata)?
        };
        if slots > 0 && records.len() != slots - 1 {
            return Err(Error::invalid(format!(
                "compound {:?} lists {} headers for {} property groups",
                header.name,
                records.len(),
                slots - 1
            )));
        }
        let cache = records.iter().map(|_| OnceLock::new()).collect();
        Ok(Self {
            state,
            header,
            group,
            records,
            cache,
        })
    }

    fn open_property(&self, index: usize) -> Result<PropertyReader> {
        let record = self.records[index].clone();
        let group = self.group.group(index)?;
        Ok(match record.header.property_type {
            PropertyType::Compound => PropertyReader::Compound(Arc::new(OgawaCompoundReader::new(
                self.state.clone(),
                record.header,
                group,
            )?)),
            PropertyType::Scalar => PropertyReader::Scalar(Arc::new(OgawaScalarReader::new(
                self.state.clone(),
                record,
                group,
            )?)),
            PropertyType::Array => PropertyReader::Array(Arc::new(OgawaArrayReader::new(
                self.state.clone(),
                record,
                group,
            )?)),
        })
    }
}

impl CompoundPropertyReader for OgawaCompoundReader {
    fn header(&self) -> &PropertyHeader {
        &self.header
    }

    fn num_properties(&self) -> usize {
        self.records.len()
    }

    fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.records
            .get(index)
            .map(|r| &r.header)
            .ok_or(Error::ChildOutOfBounds {
                index,
                count: self.records.len(),
            })
    }

    fn property(&self, index: usize) -> Result<PropertyReader> {
        let cell = self.cache.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.records.len(),
        })?;
        if let Some(property) = cell.get() {
            return Ok(property.clone());
        }
        let property = self.open_property(index)?;
        Ok(cell.get_or_init(|| property).clone())
    }
}

/// Sample bookkeeping common to scalar and array readers.
struct Samples {
    state: Arc<ArchiveState>,
    record: PropertyRecord,
    sampling: Arc<TimeSampling>,
    group: IGroup,
}

impl Samples {
    /// `slots_per_sample` is 1 for scalars and 2 for arrays (data, dims).
    fn new(
        state: Arc<ArchiveState>,
        record: PropertyRecord,
        group: IGroup,
        slots_per_sample: usize,
    ) -> Result<Self> {
        let needed = record.num_stored() * slots_per_sample;
        if group.num_children() < needed {
            return Err(Error::invalid(format!(
                "property {} stores {} slots, expected {needed}",
                record.header.name,
                group.num_children()
            )));
        }
        let sampling = state.sampling(record.header.time_sampling_index)?;
        Ok(Self {
            state,
            record,
            sampling,
            group,
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.record.num_samples as usize;
        if index >= count {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        Ok(())
    }

    /// Keyed blob holding sample `index`, at `slot * stride`.
    fn blob(&self, index: usize, stride: usize) -> Result<IData> {
        self.check_index(index)?;
        let data = self.group.data(self.record.slot_for(index) * stride)?;
        if data.size() != 0 && data.size() < SAMPLE_KEY_SIZE as u64 {
            return Err(Error::invalid(format!(
                "sample blob of {} is {} bytes",
                self.record.header.name,
                data.size()
            )));
        }
        Ok(data)
    }

    fn key(&self, index: usize, stride: usize) -> Result<SampleDigest> {
        let data = self.blob(index, stride)?;
        if data.is_empty() {
            return Ok(compute_digest(&[]));
        }
        let mut key = [0u8; SAMPLE_KEY_SIZE];
        data.read_at(0, &mut key)?;
        Ok(key)
    }
}

fn payload_len(data: &IData) -> usize {
    (data.size() as usize).saturating_sub(SAMPLE_KEY_SIZE)
}

fn read_payload(data: &IData) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; payload_len(data)];
    data.read_at(SAMPLE_KEY_SIZE as u64, &mut bytes)?;
    Ok(bytes)
}

/// Scalar property: one keyed data slot per stored sample.
pub struct OgawaScalarReader {
    samples: Samples,
}

impl OgawaScalarReader {
    fn new(state: Arc<ArchiveState>, record: PropertyRecord, group: IGroup) -> Result<Self> {
        Ok(Self {
            samples: Samples::new(state, record, group, 1)?,
        })
    }
}

impl SampledPropertyReader for OgawaScalarReader {
    fn header(&self) -> &PropertyHeader {
        &self.samples.record.header
    }

    fn num_samples(&self) -> usize {
        self.samples.record.num_samples as usize
    }

    fn is_constant(&self) -> bool {
        self.samples.record.is_constant()
    }

    fn time_sampling(&self) -> &Arc<TimeSampling> {
        &self.samples.sampling
    }
}

impl ScalarPropertyReader for OgawaScalarReader {
    fn read_sample(&self, index: usize, buf: &mut [u8]) -> Result<()> {
        let data_type = self.data_type();
        if data_type.pod.is_string() {
            return Err(Error::mismatch("fixed-size scalar", data_type));
        }
        let expected = data_type.num_bytes();
        if buf.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: buf.len(),
            });
        }
        let data = self.samples.blob(index, 1)?;
        if payload_len(&data) != expected {
            return Err(Error::invalid(format!(
                "scalar sample of {} holds {} bytes, expected {expected}",
                self.header().name,
                payload_len(&data)
            )));
        }
        data.read_at(SAMPLE_KEY_SIZE as u64, buf)
    }

    fn read_sample_vec(&self, index: usize) -> Result<Vec<u8>> {
        read_payload(&self.samples.blob(index, 1)?)
    }

    fn sample_key(&self, index: usize) -> Result<SampleDigest> {
        self.samples.key(index, 1)
    }
}

/// Array property: `(data, dims)` slot pairs per stored sample. Dims are
/// empty for rank-one numeric samples and derived from the payload size.
pub struct OgawaArrayReader {
    samples: Samples,
}

impl OgawaArrayReader {
    fn new(state: Arc<ArchiveState>, record: PropertyRecord, group: IGroup) -> Result<Self> {
        Ok(Self {
            samples: Samples::new(state, record, group, 2)?,
        })
    }

    fn dims_for(&self, slot: usize, payload: PayloadSize<'_>) -> Result<Dimensions> {
        let data_type = self.data_type();
        let stored = self.samples.group.data(slot * 2 + 1)?;
        if !stored.is_empty() {
            let dims = Dimensions::from_bytes(&stored.read_all()?);
            if !data_type.pod.is_string() {
                let expected = dims
                    .num_points()
                    .and_then(|n| n.checked_mul(data_type.num_bytes()));
                if expected != Some(payload.len()) {
                    return Err(Error::invalid(format!(
                        "dimensions {:?} of {} do not match its {} byte sample",
                        dims.sizes(),
                        self.header().name,
                        payload.len()
                    )));
                }
            }
            return Ok(dims);
        }
        match (data_type.pod, payload) {
            (PlainOldDataType::String, PayloadSize::Bytes(bytes)) => {
                Ok(Dimensions::d1(split_strings(bytes)?.len()))
            }
            (PlainOldDataType::Wstring, PayloadSize::Bytes(bytes)) => {
                Ok(Dimensions::d1(bytes.chunks_exact(4).filter(|c| c.iter().all(|&b| b == 0)).count()))
            }
            (pod, _) if pod.is_string() => Err(Error::invalid(format!(
                "string array {} has no stored dimensions",
                self.header().name
            ))),
            (_, payload) => {
                let len = payload.len();
                let element = data_type.num_bytes();
                if element == 0 || len % element != 0 {
                    return Err(Error::invalid(format!(
                        "array sample of {} holds {len} bytes, not a multiple of {element}",
                        self.header().name
                    )));
                }
                Ok(Dimensions::d1(len / element))
            }
        }
    }
}

#[derive(Clone, Copy)]
enum PayloadSize<'a> {
    Len(usize),
    Bytes(&'a [u8]),
}

impl PayloadSize<'_> {
    fn len(self) -> usize {
        match self {
            Self::Len(len) => len,
            Self::Bytes(bytes) => bytes.len(),
        }
    }
}

impl SampledPropertyReader for OgawaArrayReader {
    fn header(&self) -> &PropertyHeader {
        &self.samples.record.header
    }

    fn num_samples(&self) -> usize {
        self.samples.record.num_samples as usize
    }

    fn is_constant(&self) -> bool {
        self.samples.record.is_constant()
    }

    fn time_sampling(&self) -> &Arc<TimeSampling> {
        &self.samples.sampling
    }
}

impl ArrayPropertyReader for OgawaArrayReader {
    fn sample(&self, index: usize) -> Result<Slab> {
        self.samples.check_index(index)?;
        let slot = self.samples.record.slot_for(index);
        let data_pos = match self.samples.group.child_kind(slot * 2)? {
            ChildKind::Data(pos) => pos,
            ChildKind::EmptyData => 0,
            other => return Err(Error::mismatch("data", other.label())),
        };
        let key = SlabKey {
            data_pos,
            dims_ref: self.samples.group.child_kind(slot * 2 + 1)?.encode(),
            data_type: self.data_type(),
        };
        self.samples.state.cache.acquire(key, || {
            let bytes = read_payload(&self.samples.blob(index, 2)?)?;
            let dims = self.dims_for(slot, PayloadSize::Bytes(&bytes))?;
            Ok((bytes, dims))
        })
    }

    fn sample_dimensions(&self, index: usize) -> Result<Dimensions> {
        let data = self.samples.blob(index, 2)?;
        let slot = self.samples.record.slot_for(index);
        if self.data_type().pod.is_string() {
            return self.dims_for(slot, PayloadSize::Bytes(&read_payload(&data)?));
        }
        self.dims_for(slot, PayloadSize::Len(payload_len(&data)))
    }

    fn sample_key(&self, index: usize) -> Result<SampleDigest> {
        self.samples.key(index, 2)
    }
}

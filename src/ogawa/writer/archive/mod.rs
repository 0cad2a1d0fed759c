//! Object-model writer.
//!
//! All handles of one archive share a [`WriteState`] behind a mutex. The
//! tree is kept as an arena of nodes; sample payloads are streamed to the
//! file as they are set, and groups are frozen depth-first when a node is
//! finalized or the archive is closed.

mod data;
mod metadata;
mod objects;
mod properties;
mod types;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::constants::{
    library_version_string, WriteOptions, ALEMBIC_VERSION_KEY, APPLICATION_KEY, DESCRIPTION_KEY,
};
use super::group::{OArchive, OGroup};
use super::object::OObject;
use super::stream::OStream;
use super::write_util::{encode_indexed_metadata, encode_time_samplings};
use crate::core::{ContentKey, MetaData, ObjectHeader, PropertyHeader, TimeSampling};
use crate::ogawa::layout::{ARCHIVE_FORMAT_VERSION, LIBRARY_VERSION};
use crate::util::{Error, Result};

pub(crate) use types::NodeId;
use types::{CompoundNode, Names, Node, ObjectNode};

/// Node id of the top object.
pub(crate) const TOP_OBJECT: NodeId = 0;

pub(crate) type Shared = Arc<Mutex<WriteState>>;

/// Everything one archive writer owns.
pub(crate) struct WriteState {
    name: String,
    /// `None` once the archive is closed.
    container: Option<OArchive>,
    /// Finished bytes of an in-memory archive.
    output: Option<Vec<u8>>,
    options: WriteOptions,
    archive_metadata: MetaData,
    nodes: Vec<Node>,
    samplings: Vec<(TimeSampling, u32)>,
    indexed_metadata: Vec<String>,
    metadata_lookup: HashMap<String, u8>,
    samples_by_key: HashMap<ContentKey, u64>,
    dims_by_bytes: HashMap<Vec<u8>, u64>,
}

impl WriteState {
    fn new(name: String, container: OArchive, options: WriteOptions) -> Self {
        let top = ObjectNode {
            header: ObjectHeader::top(),
            properties: TOP_OBJECT + 1,
            children: Vec::new(),
            names: Names::default(),
            frozen: None,
        };
        let top_properties = CompoundNode {
            header: PropertyHeader::compound(""),
            children: Vec::new(),
            names: Names::default(),
            frozen: None,
            digest: [0; 16],
        };
        Self {
            name,
            container: Some(container),
            output: None,
            options,
            archive_metadata: MetaData::new(),
            nodes: vec![Node::Object(top), Node::Compound(top_properties)],
            samplings: vec![(TimeSampling::identity(), 0)],
            indexed_metadata: Vec::new(),
            metadata_lookup: HashMap::new(),
            samples_by_key: HashMap::new(),
            dims_by_bytes: HashMap::new(),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.container.is_some()
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::frozen("archive"))
        }
    }

    fn stream(&mut self) -> Result<&mut OStream> {
        self.container
            .as_mut()
            .map(OArchive::stream)
            .ok_or_else(|| Error::frozen("archive"))
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    /// Fail unless the archive is open and node `id` is not frozen.
    fn check_writable(&self, id: NodeId) -> Result<()> {
        if !self.is_open() {
            return Err(Error::frozen("archive"));
        }
        let node = self.node(id);
        if node.is_frozen() {
            return Err(Error::frozen(node.label()));
        }
        Ok(())
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub(crate) fn is_frozen(&self, id: NodeId) -> bool {
        self.node(id).is_frozen()
    }

    fn final_archive_metadata(&self) -> MetaData {
        let mut md = self.archive_metadata.clone();
        if !self.options.application_writer.is_empty() {
            md.set_unique(APPLICATION_KEY, self.options.application_writer.clone());
        }
        if !self.options.description.is_empty() {
            md.set_unique(DESCRIPTION_KEY, self.options.description.clone());
        }
        md.set(ALEMBIC_VERSION_KEY, library_version_string());
        md
    }

    /// Freeze the whole tree, write the root tables and patch the header.
    /// Closing twice is a no-op.
    pub(crate) fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let top = self.freeze_object(TOP_OBJECT)?;

        let archive_metadata = self.final_archive_metadata().serialize();
        let samplings = encode_time_samplings(self.samplings.iter().map(|(ts, max)| (ts, *max)));
        let indexed = encode_indexed_metadata(self.indexed_metadata.iter().map(String::as_str));

        let stream = self.stream()?;
        let mut root = OGroup::new();
        root.add_data(stream, &ARCHIVE_FORMAT_VERSION.to_le_bytes())?;
        root.add_data(stream, &LIBRARY_VERSION.to_le_bytes())?;
        root.add_group(top);
        root.add_data(stream, archive_metadata.as_bytes())?;
        root.add_data(stream, &samplings)?;
        root.add_data(stream, &indexed)?;

        let container = self
            .container
            .take()
            .ok_or_else(|| Error::frozen("archive"))?;
        let stream = container.finish(root)?;
        tracing::debug!(
            name = %self.name,
            size = stream.pos(),
            samples = self.samples_by_key.len(),
            "closed archive"
        );
        self.output = stream.into_bytes();
        Ok(())
    }
}

/// An archive opened for writing.
///
/// Dropping the writer without calling [`close`](Self::close) closes it
/// and logs the outcome.
pub struct OgawaArchiveWriter {
    shared: Shared,
}

impl OgawaArchiveWriter {
    /// Create or truncate a file.
    pub fn create(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let path = path.as_ref();
        let container = OArchive::create(path, options.buffer_capacity)?;
        tracing::debug!(path = %path.display(), dedup = options.dedup, "created archive");
        Ok(Self::with_container(path.display().to_string(), container, options))
    }

    /// Build the archive in memory; finish with [`into_bytes`](Self::into_bytes).
    pub fn in_memory(options: WriteOptions) -> Result<Self> {
        Ok(Self::with_container("<memory>".to_string(), OArchive::in_memory()?, options))
    }

    fn with_container(name: String, container: OArchive, options: WriteOptions) -> Self {
        Self {
            shared: Arc::new(Mutex::new(WriteState::new(name, container, options))),
        }
    }

    pub fn name(&self) -> String {
        self.shared.lock().name.clone()
    }

    /// The unnamed object at `/`.
    pub fn top(&self) -> OObject {
        OObject::new(self.shared.clone(), TOP_OBJECT)
    }

    /// Register a time sampling and return its index. Equivalent samplings
    /// share one index; index 0 is the identity sampling.
    pub fn add_time_sampling(&self, sampling: TimeSampling) -> Result<u32> {
        self.shared.lock().add_time_sampling(sampling)
    }

    pub fn num_time_samplings(&self) -> usize {
        self.shared.lock().samplings.len()
    }

    /// Extra archive-level metadata.
    pub fn set_archive_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut state = self.shared.lock();
        if !state.is_open() {
            return Err(Error::frozen("archive"));
        }
        state.archive_metadata.set(key, value);
        Ok(())
    }

    /// Distinct sample payloads written so far.
    pub fn num_stored_samples(&self) -> usize {
        self.shared.lock().samples_by_key.len()
    }

    /// Freeze everything and finish the file.
    pub fn close(self) -> Result<()> {
        let result = self.shared.lock().close();
        result
    }

    /// Close an in-memory archive and take its bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut state = self.shared.lock();
        state.close()?;
        state
            .output
            .take()
            .ok_or_else(|| Error::other(format!("{} is written to a file", state.name)))
    }
}

impl Drop for OgawaArchiveWriter {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if !state.is_open() {
            return;
        }
        tracing::warn!(name = %state.name, "archive dropped without close");
        if let Err(err) = state.close() {
            tracing::error!(name = %state.name, %err, "failed to close archive");
        }
    }
}

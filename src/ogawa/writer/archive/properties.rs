//! Property creation, property group freezing and header blobs.

use super::super::group::{FrozenGroup, OGroup};
use super::super::write_util::{encode_property_header, SampleSpan};
use super::types::{CompoundNode, Names, Node, NodeId, SampledNode};
use super::WriteState;
use crate::core::{compute_digest, MetaData, PropertyHeader, PropertyType, SampleDigest};
use crate::util::{Error, Result};

impl WriteState {
    fn compound_mut(&mut self, id: NodeId) -> Result<&mut CompoundNode> {
        match self.node_mut(id) {
            Node::Compound(c) => Ok(c),
            other => Err(Error::mismatch("compound property", other.label())),
        }
    }

    pub(super) fn compound_digest(&self, id: NodeId) -> Result<SampleDigest> {
        match self.node(id) {
            Node::Compound(c) => Ok(c.digest),
            other => Err(Error::mismatch("compound property", other.label())),
        }
    }

    pub(crate) fn property_header(&self, id: NodeId) -> &PropertyHeader {
        match self.node(id) {
            Node::Compound(c) => &c.header,
            Node::Sampled(s) => &s.header,
            Node::Object(_) => unreachable!("property handles never point at objects"),
        }
    }

    /// Add a property under compound `parent`.
    pub(crate) fn create_property(&mut self, parent: NodeId, header: PropertyHeader) -> Result<NodeId> {
        self.check_writable(parent)?;
        if header.property_type != PropertyType::Compound {
            if !header.data_type.is_valid() {
                return Err(Error::other(format!(
                    "property {} has unusable type {}",
                    header.name, header.data_type
                )));
            }
            self.check_time_sampling(header.time_sampling_index)?;
        }
        self.compound_mut(parent)?.names.claim(&header.name)?;

        let node = match header.property_type {
            PropertyType::Compound => Node::Compound(CompoundNode {
                header,
                children: Vec::new(),
                names: Names::default(),
                frozen: None,
                digest: [0; 16],
            }),
            _ => Node::Sampled(SampledNode::new(header)),
        };
        let id = self.push(node);
        self.compound_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Replace the metadata of a property that is not frozen yet.
    pub(crate) fn set_property_meta_data(&mut self, id: NodeId, meta_data: MetaData) -> Result<()> {
        self.check_writable(id)?;
        match self.node_mut(id) {
            Node::Compound(c) => c.header.meta_data = meta_data,
            Node::Sampled(s) => s.header.meta_data = meta_data,
            Node::Object(_) => return Err(Error::mismatch("property", "object")),
        }
        Ok(())
    }

    pub(crate) fn freeze_property(&mut self, id: NodeId) -> Result<FrozenGroup> {
        match self.node(id) {
            Node::Compound(_) => self.freeze_compound(id),
            Node::Sampled(_) => self.freeze_sampled(id),
            Node::Object(_) => Err(Error::mismatch("property", "object")),
        }
    }

    fn freeze_sampled(&mut self, id: NodeId) -> Result<FrozenGroup> {
        let Node::Sampled(node) = self.node_mut(id) else {
            return Err(Error::mismatch("scalar or array property", "compound"));
        };
        if let Some(frozen) = node.frozen {
            return Ok(frozen);
        }
        let slots = std::mem::take(&mut node.slots);
        let ts_index = node.header.time_sampling_index;
        let num_samples = node.span.num_samples;

        let frozen = slots.freeze(self.stream()?)?;
        self.note_max_samples(ts_index, num_samples);
        if let Node::Sampled(node) = self.node_mut(id) {
            node.frozen = Some(frozen);
        }
        Ok(frozen)
    }

    /// Freeze every child property, then write the header blob and the
    /// compound group. A compound with no properties is the empty group.
    pub(crate) fn freeze_compound(&mut self, id: NodeId) -> Result<FrozenGroup> {
        let compound = self.compound_mut(id)?;
        if let Some(frozen) = compound.frozen {
            return Ok(frozen);
        }
        let children = compound.children.clone();

        let mut groups = Vec::with_capacity(children.len());
        for &child in &children {
            groups.push(self.freeze_property(child)?);
        }

        let mut headers = Vec::new();
        for &child in &children {
            let (header, span) = match self.node(child) {
                Node::Sampled(s) => (s.header.clone(), s.span),
                Node::Compound(c) => (c.header.clone(), SampleSpan::default()),
                Node::Object(_) => return Err(Error::mismatch("property", "object")),
            };
            let meta = self.meta_ref(&header.meta_data);
            encode_property_header(&mut headers, &header, &span, &meta);
        }

        let stream = self.stream()?;
        let mut group = OGroup::new();
        if !children.is_empty() {
            for child in groups {
                group.add_group(child);
            }
            group.add_data(stream, &headers)?;
        }
        let frozen = group.freeze(stream)?;

        let compound = self.compound_mut(id)?;
        compound.frozen = Some(frozen);
        compound.digest = compute_digest(&headers);
        Ok(frozen)
    }
}

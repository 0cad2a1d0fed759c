//! Object creation and object group freezing.

use super::super::group::{FrozenGroup, OGroup};
use super::super::write_util::encode_object_header;
use super::types::{CompoundNode, Names, Node, NodeId, ObjectNode};
use super::WriteState;
use crate::core::{compute_digest, MetaData, ObjectHeader, PropertyHeader};
use crate::util::{Error, Result};

impl WriteState {
    fn object(&self, id: NodeId) -> Result<&ObjectNode> {
        match self.node(id) {
            Node::Object(o) => Ok(o),
            other => Err(Error::mismatch("object", other.label())),
        }
    }

    fn object_mut(&mut self, id: NodeId) -> Result<&mut ObjectNode> {
        match self.node_mut(id) {
            Node::Object(o) => Ok(o),
            other => Err(Error::mismatch("object", other.label())),
        }
    }

    pub(crate) fn object_header(&self, id: NodeId) -> Result<&ObjectHeader> {
        Ok(&self.object(id)?.header)
    }

    pub(crate) fn object_properties(&self, id: NodeId) -> Result<NodeId> {
        Ok(self.object(id)?.properties)
    }

    pub(crate) fn object_children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.object(id)?.children)
    }

    /// Add a child object under `parent`.
    pub(crate) fn create_object(&mut self, parent: NodeId, name: &str, meta_data: MetaData) -> Result<NodeId> {
        self.check_writable(parent)?;
        let parent_path = self.object(parent)?.header.full_name.clone();
        self.object_mut(parent)?.names.claim(name)?;

        let properties = self.push(Node::Compound(CompoundNode {
            header: PropertyHeader::compound("").with_meta_data(meta_data.clone()),
            children: Vec::new(),
            names: Names::default(),
            frozen: None,
            digest: [0; 16],
        }));
        let full_name = ObjectHeader::child_path(&parent_path, name);
        let id = self.push(Node::Object(ObjectNode {
            header: ObjectHeader::new(name, full_name, meta_data),
            properties,
            children: Vec::new(),
            names: Names::default(),
            frozen: None,
        }));
        self.object_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Freeze the children, then the properties, then the object itself.
    pub(crate) fn freeze_object(&mut self, id: NodeId) -> Result<FrozenGroup> {
        let object = self.object(id)?;
        if let Some(frozen) = object.frozen {
            return Ok(frozen);
        }
        let properties = object.properties;
        let children = object.children.clone();

        let mut child_groups = Vec::with_capacity(children.len());
        for &child in &children {
            child_groups.push(self.freeze_object(child)?);
        }
        let props = self.freeze_compound(properties)?;
        let props_digest = self.compound_digest(properties)?;

        let mut headers = Vec::new();
        for &child in &children {
            let meta_data = self.object(child)?.header.meta_data.clone();
            let meta = self.meta_ref(&meta_data);
            encode_object_header(&mut headers, &self.object(child)?.header.name, &meta);
        }
        let children_digest = compute_digest(&headers);
        headers.extend_from_slice(&props_digest);
        headers.extend_from_slice(&children_digest);

        let stream = self.stream()?;
        let mut group = OGroup::new();
        group.add_group(props);
        for child in child_groups {
            group.add_group(child);
        }
        group.add_data(stream, &headers)?;
        let frozen = group.freeze(stream)?;

        let object = self.object_mut(id)?;
        object.frozen = Some(frozen);
        tracing::trace!(path = %object.header.full_name, pos = frozen.pos(), "froze object");
        Ok(frozen)
    }
}

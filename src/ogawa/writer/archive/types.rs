//! Write-side tree nodes. Handles address nodes by index into the arena
//! kept in [`WriteState`](super::WriteState).

use std::collections::HashSet;

use super::super::group::{FrozenGroup, OGroup};
use super::super::write_util::SampleSpan;
use crate::core::{ContentKey, ObjectHeader, PropertyHeader, SampleDigest};
use crate::util::{Dimensions, Error, Result};

pub(crate) type NodeId = usize;

/// Sibling names already taken under one parent.
#[derive(Debug, Default)]
pub(super) struct Names(HashSet<String>);

impl Names {
    /// Reserve `name`, rejecting empty names, path separators and duplicates.
    pub(super) fn claim(&mut self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::other(format!("invalid name {name:?}")));
        }
        if !self.0.insert(name.to_string()) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(super) struct ObjectNode {
    pub(super) header: ObjectHeader,
    /// Compound node holding the object's properties.
    pub(super) properties: NodeId,
    pub(super) children: Vec<NodeId>,
    pub(super) names: Names,
    pub(super) frozen: Option<FrozenGroup>,
}

#[derive(Debug)]
pub(super) struct CompoundNode {
    pub(super) header: PropertyHeader,
    pub(super) children: Vec<NodeId>,
    pub(super) names: Names,
    pub(super) frozen: Option<FrozenGroup>,
    /// Digest of the property headers blob, set on freeze.
    pub(super) digest: SampleDigest,
}

/// Refs of the most recently stored sample.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct StoredSample {
    pub(super) key: ContentKey,
    pub(super) dims: Option<Dimensions>,
    pub(super) data_pos: u64,
    /// 0 when the dims slot is empty.
    pub(super) dims_pos: u64,
}

#[derive(Debug)]
pub(super) struct SampledNode {
    pub(super) header: PropertyHeader,
    pub(super) slots: OGroup,
    pub(super) span: SampleSpan,
    pub(super) previous: Option<StoredSample>,
    pub(super) frozen: Option<FrozenGroup>,
}

impl SampledNode {
    pub(super) fn new(header: PropertyHeader) -> Self {
        Self {
            header,
            slots: OGroup::new(),
            span: SampleSpan {
                homogenous: true,
                ..SampleSpan::default()
            },
            previous: None,
            frozen: None,
        }
    }

    pub(super) fn is_array(&self) -> bool {
        self.header.is_array()
    }

    fn push_refs(&mut self, sample: &StoredSample) {
        self.slots.add_data_ref(sample.data_pos);
        if self.is_array() {
            self.slots.add_data_ref(sample.dims_pos);
        }
    }

    /// Record sample `span.num_samples`. Repeats of the previous sample are
    /// not stored until a later change needs their slots.
    pub(super) fn record(&mut self, sample: StoredSample) {
        let index = self.span.num_samples;
        self.span.num_samples += 1;

        let Some(previous) = self.previous.take() else {
            self.push_refs(&sample);
            self.previous = Some(sample);
            return;
        };

        if previous.key == sample.key && previous.dims == sample.dims {
            self.previous = Some(previous);
            return;
        }

        if points(&previous.dims) != points(&sample.dims) {
            self.span.homogenous = false;
        }
        if self.span.first_changed == 0 {
            self.span.first_changed = index;
        } else {
            for _ in self.span.last_changed + 1..index {
                self.push_refs(&previous);
            }
        }
        self.span.last_changed = index;
        self.push_refs(&sample);
        self.previous = Some(sample);
    }
}

fn points(dims: &Option<Dimensions>) -> Option<usize> {
    dims.as_ref().map_or(Some(1), Dimensions::num_points)
}

#[derive(Debug)]
pub(super) enum Node {
    Object(ObjectNode),
    Compound(CompoundNode),
    Sampled(SampledNode),
}

impl Node {
    pub(super) fn label(&self) -> String {
        match self {
            Self::Object(o) => format!("object {}", o.header.full_name),
            Self::Compound(c) => format!("compound property {:?}", c.header.name),
            Self::Sampled(s) => format!("property {:?}", s.header.name),
        }
    }

    pub(super) fn is_frozen(&self) -> bool {
        match self {
            Self::Object(o) => o.frozen.is_some(),
            Self::Compound(c) => c.frozen.is_some(),
            Self::Sampled(s) => s.frozen.is_some(),
        }
    }
}

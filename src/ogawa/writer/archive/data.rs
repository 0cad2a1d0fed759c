//! Keyed sample blobs, dedup and per-property sample recording.

use super::types::{Node, NodeId, StoredSample};
use super::WriteState;
use crate::core::ContentKey;
use crate::util::{Dimensions, Error, Result};

impl WriteState {
    /// Append `payload` behind its 16-byte content key, or reuse an
    /// identical blob when dedup is on. Returns the blob position.
    fn write_keyed(&mut self, key: ContentKey, payload: &[u8]) -> Result<u64> {
        if self.options.dedup {
            if let Some(&pos) = self.samples_by_key.get(&key) {
                tracing::trace!(pos, size = key.size, "sample deduplicated");
                return Ok(pos);
            }
        }
        let pos = self.stream()?.write_blob(&[&key.digest, payload])?;
        if self.options.dedup {
            self.samples_by_key.insert(key, pos);
        }
        Ok(pos)
    }

    /// Dims blob for an array sample; 0 (empty slot) when the dims are
    /// implied by the payload size.
    fn write_dims(&mut self, dims: &Dimensions, is_string: bool) -> Result<u64> {
        if dims.rank() <= 1 && !is_string {
            return Ok(0);
        }
        let bytes = dims.to_bytes();
        if let Some(&pos) = self.dims_by_bytes.get(&bytes) {
            return Ok(pos);
        }
        let pos = self.stream()?.write_blob(&[&bytes])?;
        self.dims_by_bytes.insert(bytes, pos);
        Ok(pos)
    }

    /// Store the next sample of scalar or array property `id`. `dims` is
    /// `None` for scalars.
    pub(crate) fn write_sample(
        &mut self,
        id: NodeId,
        payload: &[u8],
        dims: Option<Dimensions>,
    ) -> Result<()> {
        self.check_writable(id)?;
        let Node::Sampled(node) = self.node(id) else {
            return Err(Error::mismatch("scalar or array property", self.node(id).label()));
        };
        let data_type = node.header.data_type;
        let is_string = data_type.pod.is_string();

        match (&dims, node.is_array()) {
            (None, false) if !is_string && payload.len() != data_type.num_bytes() => {
                return Err(Error::BufferSize {
                    expected: data_type.num_bytes(),
                    actual: payload.len(),
                });
            }
            (Some(dims), true) if !is_string => {
                let expected = dims
                    .num_points()
                    .and_then(|n| n.checked_mul(data_type.num_bytes()))
                    .ok_or(Error::BufferSize {
                        expected: usize::MAX,
                        actual: payload.len(),
                    })?;
                if payload.len() != expected {
                    return Err(Error::BufferSize {
                        expected,
                        actual: payload.len(),
                    });
                }
            }
            (None, true) | (Some(_), false) => {
                return Err(Error::other(format!(
                    "dimensions given for {} do not fit its kind",
                    node.header.name
                )));
            }
            _ => {}
        }

        let key = ContentKey::of(payload);
        let data_pos = self.write_keyed(key, payload)?;
        let dims_pos = match &dims {
            Some(dims) => self.write_dims(dims, is_string)?,
            None => 0,
        };
        let sample = StoredSample {
            key,
            dims,
            data_pos,
            dims_pos,
        };
        if let Node::Sampled(node) = self.node_mut(id) {
            node.record(sample);
        }
        Ok(())
    }

    /// Repeat the previous sample of property `id`.
    pub(crate) fn repeat_sample(&mut self, id: NodeId) -> Result<()> {
        self.check_writable(id)?;
        let Node::Sampled(node) = self.node_mut(id) else {
            return Err(Error::other("only scalar and array properties hold samples"));
        };
        let previous = node
            .previous
            .clone()
            .ok_or_else(|| Error::other(format!("{} has no sample to repeat", node.header.name)))?;
        node.record(previous);
        Ok(())
    }

    pub(crate) fn num_samples(&self, id: NodeId) -> usize {
        match self.node(id) {
            Node::Sampled(node) => node.span.num_samples as usize,
            _ => 0,
        }
    }
}

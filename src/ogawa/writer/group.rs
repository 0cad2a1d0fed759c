//! Group builder and the container-level archive writer.

use std::path::Path;

use super::stream::OStream;
use crate::ogawa::format::*;
use crate::util::{Error, Result};

/// A group that has been written; the only form a parent can reference.
///
/// Holding one proves the child table is already on disk, which is what
/// makes parent-after-child ordering impossible to violate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrozenGroup(u64);

impl FrozenGroup {
    /// Raw child reference for this group.
    #[inline]
    pub fn reference(self) -> u64 {
        self.0
    }

    /// File position, 0 for the empty group.
    #[inline]
    pub fn pos(self) -> u64 {
        extract_offset(self.0)
    }
}

/// Child table under construction.
///
/// Data blobs are appended to the stream as they are added; the table
/// itself is written once by [`freeze`](Self::freeze).
#[derive(Debug, Default)]
pub struct OGroup {
    slots: Vec<u64>,
}

impl OGroup {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, raw: u64) -> usize {
        self.slots.push(raw);
        self.slots.len() - 1
    }

    pub fn add_empty_group(&mut self) -> usize {
        self.push(EMPTY_GROUP)
    }

    pub fn add_empty_data(&mut self) -> usize {
        self.push(EMPTY_DATA)
    }

    /// Reserve a slot to be filled later with `set_data`/`set_group`.
    /// Left unfilled it reads back as absent.
    pub fn add_absent(&mut self) -> usize {
        self.push(INVALID_REF)
    }

    /// Write `bytes` as a new blob and reference it.
    pub fn add_data(&mut self, stream: &mut OStream, bytes: &[u8]) -> Result<usize> {
        let raw = write_data(stream, bytes)?;
        Ok(self.push(raw))
    }

    /// Reference a blob already on disk.
    pub fn add_data_ref(&mut self, pos: u64) -> usize {
        self.push(data_ref(pos))
    }

    pub fn add_group(&mut self, group: FrozenGroup) -> usize {
        self.push(group.reference())
    }

    /// Point slot `index` at a blob already on disk.
    pub fn set_data(&mut self, index: usize, pos: u64) -> Result<()> {
        self.set(index, data_ref(pos))
    }

    pub fn set_group(&mut self, index: usize, group: FrozenGroup) -> Result<()> {
        self.set(index, group.reference())
    }

    fn set(&mut self, index: usize, raw: u64) -> Result<()> {
        let count = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(Error::ChildOutOfBounds { index, count })?;
        *slot = raw;
        Ok(())
    }

    /// Write the child table. A group with no children is not written and
    /// is referenced with the empty-group sentinel.
    pub fn freeze(self, stream: &mut OStream) -> Result<FrozenGroup> {
        if self.slots.is_empty() {
            return Ok(FrozenGroup(EMPTY_GROUP));
        }
        Ok(FrozenGroup(self.write_table(stream)?))
    }

    fn write_table(&self, stream: &mut OStream) -> Result<u64> {
        let pos = stream.pos();
        stream.write_u64(self.slots.len() as u64)?;
        for &raw in &self.slots {
            stream.write_u64(raw)?;
        }
        tracing::trace!(pos, children = self.slots.len(), "froze group");
        Ok(pos)
    }
}

/// Append a blob and return its child reference; empty input is not
/// written and maps to the empty-data sentinel.
pub fn write_data(stream: &mut OStream, bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() {
        return Ok(EMPTY_DATA);
    }
    Ok(make_data_offset(stream.write_blob(&[bytes])?))
}

fn data_ref(pos: u64) -> u64 {
    if pos == 0 {
        EMPTY_DATA
    } else {
        make_data_offset(pos)
    }
}

/// Container writer: header, then groups and blobs, then the root.
pub struct OArchive {
    stream: OStream,
}

impl OArchive {
    /// Create a file and write a not-yet-frozen header.
    pub fn create(path: impl AsRef<Path>, buffer_capacity: usize) -> Result<Self> {
        Self::with_stream(OStream::create(path, buffer_capacity)?)
    }

    /// Build the container in memory.
    pub fn in_memory() -> Result<Self> {
        Self::with_stream(OStream::memory())
    }

    fn with_stream(mut stream: OStream) -> Result<Self> {
        stream.write_bytes(OGAWA_MAGIC)?;
        stream.write_u8(NOT_FROZEN_FLAG)?;
        stream.write_bytes(&CURRENT_VERSION.to_be_bytes())?;
        stream.write_u64(0)?;
        Ok(Self { stream })
    }

    pub fn stream(&mut self) -> &mut OStream {
        &mut self.stream
    }

    /// Write the root table, patch the header and flush.
    ///
    /// The root is always written, even with no children, so the header
    /// never points inside itself.
    pub fn finish(mut self, root: OGroup) -> Result<OStream> {
        let root_pos = root.write_table(&mut self.stream)?;
        self.stream.patch(ROOT_POS_OFFSET as u64, &root_pos.to_le_bytes())?;
        self.stream.patch(FROZEN_OFFSET as u64, &[FROZEN_FLAG])?;
        self.stream.flush()?;
        tracing::debug!(root_pos, size = self.stream.pos(), "container finalized");
        Ok(self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogawa::reader::IArchive;

    fn finish_in_memory(archive: OArchive, root: OGroup) -> Vec<u8> {
        archive.finish(root).unwrap().into_bytes().unwrap()
    }

    #[test]
    fn test_group_addressing() {
        let mut archive = OArchive::in_memory().unwrap();

        let mut inner = OGroup::new();
        inner.add_data(archive.stream(), b"inner").unwrap();
        let inner = inner.freeze(archive.stream()).unwrap();

        let mut root = OGroup::new();
        root.add_empty_group();
        root.add_empty_data();
        root.add_data(archive.stream(), b"hello").unwrap();
        root.add_group(inner);
        root.add_absent();
        root.add_data(archive.stream(), b"").unwrap();

        let bytes = finish_in_memory(archive, root);
        let reader = IArchive::from_bytes("mem", bytes).unwrap();
        let root = reader.root();

        assert_eq!(root.num_children(), 6);
        assert_eq!(root.child_kind(0).unwrap(), ChildKind::EmptyGroup);
        assert_eq!(root.child_kind(1).unwrap(), ChildKind::EmptyData);
        assert!(matches!(root.child_kind(2).unwrap(), ChildKind::Data(_)));
        assert!(matches!(root.child_kind(3).unwrap(), ChildKind::Group(_)));
        assert_eq!(root.child_kind(4).unwrap(), ChildKind::Absent);
        assert_eq!(root.child_kind(5).unwrap(), ChildKind::EmptyData);

        assert_eq!(root.data(2).unwrap().read_all().unwrap(), b"hello");
        let inner = root.group(3).unwrap();
        assert_eq!(inner.data(0).unwrap().read_all().unwrap(), b"inner");
        assert!(root.group(0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_root() {
        let archive = OArchive::in_memory().unwrap();
        let bytes = finish_in_memory(archive, OGroup::new());
        let reader = IArchive::from_bytes("mem", bytes).unwrap();
        assert_eq!(reader.root().num_children(), 0);
        assert_eq!(reader.root().pos(), HEADER_SIZE as u64);
    }

    #[test]
    fn test_reserved_slot() {
        let mut archive = OArchive::in_memory().unwrap();
        let mut root = OGroup::new();
        let slot = root.add_absent();
        let pos = archive.stream().write_blob(&[b"late"]).unwrap();
        root.set_data(slot, pos).unwrap();
        assert!(root.set_data(7, pos).is_err());

        let bytes = finish_in_memory(archive, root);
        let reader = IArchive::from_bytes("mem", bytes).unwrap();
        assert_eq!(reader.root().data(0).unwrap().read_all().unwrap(), b"late");
    }
}

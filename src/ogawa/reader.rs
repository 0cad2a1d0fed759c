//! Container reader: byte store, groups and data blobs.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::*;
use crate::util::{Error, Result};

/// How the byte store reaches the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// One shared read-only memory map.
    Mmap,
    /// N independent file handles; each reading thread is pinned to one.
    Streams(usize),
}

/// Options for opening a container.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub mode: ReadMode,
}

impl Default for ReadOptions {
    fn default() -> Self {
        let mode = if cfg!(feature = "mmap") {
            ReadMode::Mmap
        } else {
            ReadMode::Streams(4)
        };
        Self { mode }
    }
}

impl ReadOptions {
    pub fn mmap() -> Self {
        Self { mode: ReadMode::Mmap }
    }

    pub fn streams(count: usize) -> Self {
        Self { mode: ReadMode::Streams(count.max(1)) }
    }
}

static NEXT_THREAD_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT: usize = NEXT_THREAD_SLOT.fetch_add(1, Ordering::Relaxed);
}

/// Random-access byte store over an immutable container.
pub struct IStreams {
    inner: StreamsInner,
    name: String,
    version: u16,
    size: u64,
    reads: AtomicU64,
}

enum StreamsInner {
    Mmap(Mmap),
    Files(Vec<Mutex<File>>),
    Memory(Arc<[u8]>),
}

impl IStreams {
    /// Open a file and validate its header.
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let open = || {
            File::open(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FileNotFound(path.to_path_buf())
                } else {
                    Error::Io(e)
                }
            })
        };

        let file = open()?;
        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        let mut header = [0u8; HEADER_SIZE];
        let inner = match options.mode {
            ReadMode::Mmap => {
                // Safety: the map is read-only and never outlives this struct.
                let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
                header.copy_from_slice(&mmap[..HEADER_SIZE]);
                StreamsInner::Mmap(mmap)
            }
            ReadMode::Streams(count) => {
                let mut first = file;
                first.read_exact(&mut header)?;
                let mut files = Vec::with_capacity(count.max(1));
                files.push(Mutex::new(first));
                for _ in 1..count {
                    files.push(Mutex::new(open()?));
                }
                StreamsInner::Files(files)
            }
        };

        let version = Self::parse_header(&header)?;
        tracing::debug!(path = %path.display(), size, mode = ?options.mode, "opened container");
        Ok(Self {
            inner,
            name: path.to_string_lossy().into_owned(),
            version,
            size,
            reads: AtomicU64::new(0),
        })
    }

    /// Wrap an in-memory container image.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let size = bytes.len() as u64;
        if bytes.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(size));
        }
        let version = Self::parse_header(&bytes[..HEADER_SIZE])?;
        Ok(Self {
            inner: StreamsInner::Memory(bytes),
            name: name.into(),
            version,
            size,
            reads: AtomicU64::new(0),
        })
    }

    /// Validate magic, frozen flag and version; returns the version.
    fn parse_header(data: &[u8]) -> Result<u16> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }
        if &data[..OGAWA_MAGIC.len()] != OGAWA_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = u16::from_be_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        if data[FROZEN_OFFSET] != FROZEN_FLAG {
            return Err(Error::NotFrozen);
        }
        Ok(version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Total container size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of positional reads served so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of independent file handles, 1 for shared mappings.
    pub fn num_streams(&self) -> usize {
        match &self.inner {
            StreamsInner::Files(files) => files.len(),
            _ => 1,
        }
    }

    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    fn check_range(&self, pos: u64, len: usize) -> Result<usize> {
        match pos.checked_add(len as u64) {
            Some(end) if end <= self.size => Ok(pos as usize),
            Some(end) => Err(Error::UnexpectedEof(end)),
            None => Err(Error::UnexpectedEof(u64::MAX)),
        }
    }

    /// Fill `buf` from `pos`. Reading past the end is a corruption error.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let start = self.check_range(pos, buf.len())?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        match &self.inner {
            StreamsInner::Mmap(mmap) => buf.copy_from_slice(&mmap[start..start + buf.len()]),
            StreamsInner::Memory(bytes) => buf.copy_from_slice(&bytes[start..start + buf.len()]),
            StreamsInner::Files(files) => {
                let slot = THREAD_SLOT.with(|s| *s) % files.len();
                let mut file = files[slot].lock();
                file.seek(SeekFrom::Start(pos))?;
                file.read_exact(buf)?;
            }
        }
        Ok(())
    }

    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(pos, len)?;
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

/// An opened, read-only container.
pub struct IArchive {
    streams: Arc<IStreams>,
    root: IGroup,
}

impl IArchive {
    /// Open with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        Self::from_streams(IStreams::open(path, options)?)
    }

    /// Open a container held in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_streams(IStreams::from_bytes(name, bytes)?)
    }

    fn from_streams(streams: IStreams) -> Result<Self> {
        let streams = Arc::new(streams);
        let root_pos = streams.root_pos()?;
        if root_pos < HEADER_SIZE as u64 {
            return Err(Error::invalid(format!("root group position {root_pos} inside header")));
        }
        let root = IGroup::new(streams.clone(), root_pos)?;
        Ok(Self { streams, root })
    }

    #[inline]
    pub fn root(&self) -> &IGroup {
        &self.root
    }

    #[inline]
    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }

    pub fn name(&self) -> &str {
        self.streams.name()
    }

    pub fn version(&self) -> u16 {
        self.streams.version()
    }
}

/// A group: an ordered table of child references.
///
/// The table is decoded one slot at a time on first access and cached.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    slots: Arc<[OnceLock<ChildKind>]>,
}

impl IGroup {
    /// Read the child count at `pos` and check the table fits in the file.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let count = streams.read_u64(pos)?;
        let table_end = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(pos + 8))
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if table_end > streams.size() {
            return Err(Error::UnexpectedEof(table_end));
        }
        let slots = (0..count).map(|_| OnceLock::new()).collect();
        Ok(Self { streams, pos, slots })
    }

    /// A group with no children.
    pub fn empty(streams: Arc<IStreams>) -> Self {
        Self {
            streams,
            pos: 0,
            slots: Arc::from(Vec::new()),
        }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn num_children(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Decoded kind of child `index`.
    pub fn child_kind(&self, index: usize) -> Result<ChildKind> {
        let slot = self.slots.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.slots.len(),
        })?;
        if let Some(kind) = slot.get() {
            return Ok(*kind);
        }
        let raw = self.streams.read_u64(self.pos + 8 + index as u64 * 8)?;
        let kind = ChildKind::decode(raw);
        let _ = slot.set(kind);
        Ok(kind)
    }

    /// Child `index` as a group. Empty group references yield an empty group.
    pub fn group(&self, index: usize) -> Result<IGroup> {
        match self.child_kind(index)? {
            ChildKind::Group(pos) => IGroup::new(self.streams.clone(), pos),
            ChildKind::EmptyGroup => Ok(IGroup::empty(self.streams.clone())),
            other => Err(Error::mismatch("group", other.label())),
        }
    }

    /// Child `index` as a data blob. Empty data references yield an empty blob.
    pub fn data(&self, index: usize) -> Result<IData> {
        match self.child_kind(index)? {
            ChildKind::Data(pos) => IData::new(self.streams.clone(), pos),
            ChildKind::EmptyData => Ok(IData::empty(self.streams.clone())),
            other => Err(Error::mismatch("data", other.label())),
        }
    }

    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }
}

/// A length-prefixed data blob.
#[derive(Clone)]
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Read the length at `pos` and check the payload fits in the file.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = streams.read_u64(pos)?;
        let end = size
            .checked_add(pos + 8)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > streams.size() {
            return Err(Error::UnexpectedEof(end));
        }
        Ok(Self { streams, pos, size })
    }

    pub fn empty(streams: Arc<IStreams>) -> Self {
        Self { streams, pos: 0, size: 0 }
    }

    /// Position of the length prefix, 0 for the empty blob.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams.read_bytes(self.pos + 8, self.size as usize)
    }

    /// Fill `buf`, which must be exactly the blob size.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() as u64 != self.size {
            return Err(Error::BufferSize {
                expected: self.size as usize,
                actual: buf.len(),
            });
        }
        self.read_at(0, buf)
    }

    /// Fill `buf` from `offset` bytes into the payload.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if offset + buf.len() as u64 > self.size {
            return Err(Error::UnexpectedEof(self.pos + 8 + offset + buf.len() as u64));
        }
        self.streams.read_into(self.pos + 8 + offset, buf)
    }

    /// Payload as UTF-8, stopping at the first null.
    pub fn read_string(&self) -> Result<String> {
        let mut bytes = self.read_all()?;
        if let Some(end) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(end);
        }
        Ok(String::from_utf8(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(frozen: u8, version: u16, root: u64) -> Vec<u8> {
        let mut h = Vec::with_capacity(HEADER_SIZE);
        h.extend_from_slice(OGAWA_MAGIC);
        h.push(frozen);
        h.extend_from_slice(&version.to_be_bytes());
        h.extend_from_slice(&root.to_le_bytes());
        h
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(IStreams::parse_header(&header(FROZEN_FLAG, 1, 16)).unwrap(), 1);
    }

    #[test]
    fn test_invalid_header() {
        let result = IStreams::parse_header(&[0u8; 16]);
        assert!(matches!(result, Err(Error::InvalidMagic)));

        let result = IStreams::parse_header(&header(NOT_FROZEN_FLAG, 1, 16));
        assert!(matches!(result, Err(Error::NotFrozen)));

        let result = IStreams::parse_header(&header(FROZEN_FLAG, 2, 16));
        assert!(matches!(result, Err(Error::UnsupportedVersion(2))));
    }

    #[test]
    fn test_memory_archive() {
        // Root group at 16 with one empty-data child and one absent slot.
        let mut bytes = header(FROZEN_FLAG, 1, 16);
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&EMPTY_DATA.to_le_bytes());
        bytes.extend_from_slice(&INVALID_REF.to_le_bytes());

        let archive = IArchive::from_bytes("mem", bytes).unwrap();
        let root = archive.root();
        assert_eq!(root.num_children(), 2);
        assert_eq!(root.child_kind(0).unwrap(), ChildKind::EmptyData);
        assert_eq!(root.child_kind(1).unwrap(), ChildKind::Absent);
        assert!(root.data(0).unwrap().is_empty());
        assert!(root.group(1).is_err());
        assert!(matches!(
            root.child_kind(2),
            Err(Error::ChildOutOfBounds { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_truncated_group_table() {
        let mut bytes = header(FROZEN_FLAG, 1, 16);
        bytes.extend_from_slice(&1000u64.to_le_bytes());
        let result = IArchive::from_bytes("mem", bytes);
        assert!(matches!(result, Err(Error::UnexpectedEof(_))));
    }

    #[test]
    fn test_cached_slots_skip_reads() {
        let mut bytes = header(FROZEN_FLAG, 1, 16);
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&EMPTY_GROUP.to_le_bytes());
        let archive = IArchive::from_bytes("mem", bytes).unwrap();

        archive.root().child_kind(0).unwrap();
        let reads = archive.streams().read_count();
        archive.root().child_kind(0).unwrap();
        assert_eq!(archive.streams().read_count(), reads);
    }
}

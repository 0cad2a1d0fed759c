//! Shared decoded sample buffers.
//!
//! Array samples are decoded into [`Slab`]s. A [`SlabCache`] hands out the
//! live slab for a key if any holder still has one, so properties that point
//! at the same stored blob share one buffer. Entries leave the cache when
//! the last holder drops; there is no size bound and no time-based eviction.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::util::{DataType, Dimensions, Error, PlainOldDataType, PodElement, Result};

/// 16-byte content key stored in front of each sample blob.
pub type SampleDigest = [u8; 16];

/// Content key of a stored sample payload.
#[inline]
pub fn compute_digest(bytes: &[u8]) -> SampleDigest {
    murmur3::digest(bytes)
}

/// Write-side identity of a sample: digest plus payload length, so that a
/// digest collision between blobs of different sizes cannot alias them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub digest: SampleDigest,
    pub size: usize,
}

impl ContentKey {
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            digest: compute_digest(bytes),
            size: bytes.len(),
        }
    }
}

/// Identity of a decoded buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlabKey {
    /// Position of the sample blob.
    pub data_pos: u64,
    /// Raw child reference of the dimensions blob.
    pub dims_ref: u64,
    /// Type the bytes are decoded as.
    pub data_type: DataType,
}

struct SlabInner {
    key: SlabKey,
    bytes: Vec<u8>,
    dims: Dimensions,
    cache: Weak<SlabMap>,
}

type SlabMap = Mutex<HashMap<SlabKey, Weak<SlabInner>>>;

impl Drop for SlabInner {
    fn drop(&mut self) {
        let Some(map) = self.cache.upgrade() else {
            return;
        };
        let mut map = map.lock();
        // A concurrent acquire may already have replaced the dead entry.
        if map.get(&self.key).is_some_and(|w| w.strong_count() == 0) {
            map.remove(&self.key);
            tracing::trace!(pos = self.key.data_pos, "slab released");
        }
    }
}

/// Reference-counted, immutable decoded sample.
#[derive(Clone)]
pub struct Slab(Arc<SlabInner>);

impl Slab {
    /// Build a slab that is not tracked by any cache.
    pub fn detached(key: SlabKey, bytes: Vec<u8>, dims: Dimensions) -> Self {
        Self(Arc::new(SlabInner {
            key,
            bytes,
            dims,
            cache: Weak::new(),
        }))
    }

    /// True when both handles share one buffer.
    pub fn ptr_eq(a: &Slab, b: &Slab) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn key(&self) -> SlabKey {
        self.0.key
    }

    pub fn data_type(&self) -> DataType {
        self.0.key.data_type
    }

    pub fn dims(&self) -> &Dimensions {
        &self.0.dims
    }

    /// Number of elements; 0 for a shape too large to address.
    pub fn len(&self) -> usize {
        self.0.dims.num_points().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    /// Number of live handles to this buffer.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Copy out as `T`; the pod of `T` must match the stored pod.
    pub fn to_vec<T: PodElement>(&self) -> Result<Vec<T>> {
        let pod = self.data_type().pod;
        if pod != T::POD_TYPE {
            return Err(Error::mismatch(T::POD_TYPE, pod));
        }
        let whole = self.0.bytes.len() / std::mem::size_of::<T>() * std::mem::size_of::<T>();
        Ok(bytemuck::pod_collect_to_vec(&self.0.bytes[..whole]))
    }

    /// Decode string elements.
    pub fn to_strings(&self) -> Result<Vec<String>> {
        match self.data_type().pod {
            PlainOldDataType::String => split_strings(&self.0.bytes),
            PlainOldDataType::Wstring => split_wide_strings(&self.0.bytes),
            pod => Err(Error::mismatch("string", pod)),
        }
    }
}

impl fmt::Debug for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("key", &self.0.key)
            .field("dims", &self.0.dims)
            .field("bytes", &self.0.bytes.len())
            .finish()
    }
}

/// Null-terminated UTF-8 strings packed back to back.
pub(crate) fn split_strings(bytes: &[u8]) -> Result<Vec<String>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let body = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    body.split(|&b| b == 0)
        .map(|s| Ok(String::from_utf8(s.to_vec())?))
        .collect()
}

/// Null-terminated UTF-32 strings packed back to back.
pub(crate) fn split_wide_strings(bytes: &[u8]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut current = String::new();
    for unit in bytes.chunks_exact(4) {
        let code = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
        if code == 0 {
            out.push(std::mem::take(&mut current));
        } else {
            let c = char::from_u32(code)
                .ok_or_else(|| Error::invalid(format!("invalid code point {code:#x}")))?;
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    Ok(out)
}

/// Sharing cache of decoded slabs, keyed by [`SlabKey`].
#[derive(Clone, Default)]
pub struct SlabCache {
    map: Arc<SlabMap>,
}

impl SlabCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live slab for `key`, or run `decode` and register the
    /// result. `decode` runs without the cache lock held.
    pub fn acquire<F>(&self, key: SlabKey, decode: F) -> Result<Slab>
    where
        F: FnOnce() -> Result<(Vec<u8>, Dimensions)>,
    {
        if let Some(slab) = self.lookup(&key) {
            tracing::trace!(pos = key.data_pos, "slab hit");
            return Ok(slab);
        }

        let (bytes, dims) = decode()?;
        let mut map = self.map.lock();
        // Another reader may have decoded the same blob meanwhile.
        if let Some(inner) = map.get(&key).and_then(Weak::upgrade) {
            return Ok(Slab(inner));
        }
        let inner = Arc::new(SlabInner {
            key,
            bytes,
            dims,
            cache: Arc::downgrade(&self.map),
        });
        map.insert(key, Arc::downgrade(&inner));
        tracing::trace!(pos = key.data_pos, "slab decoded");
        Ok(Slab(inner))
    }

    /// Live slab for `key`, without decoding.
    pub fn lookup(&self, key: &SlabKey) -> Option<Slab> {
        self.map.lock().get(key).and_then(Weak::upgrade).map(Slab)
    }

    /// Give up one handle.
    pub fn release(&self, slab: Slab) {
        drop(slab);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn key(pos: u64) -> SlabKey {
        SlabKey {
            data_pos: pos,
            dims_ref: 0,
            data_type: DataType::INT32,
        }
    }

    fn ints(values: &[i32]) -> Result<(Vec<u8>, Dimensions)> {
        Ok((bytemuck::cast_slice(values).to_vec(), Dimensions::d1(values.len())))
    }

    #[test]
    fn test_shared_until_last_release() {
        let cache = SlabCache::new();
        let decodes = Cell::new(0);
        let decode = || {
            decodes.set(decodes.get() + 1);
            ints(&[1, 2, 3])
        };

        let a = cache.acquire(key(64), decode).unwrap();
        let b = cache.acquire(key(64), decode).unwrap();
        assert!(Slab::ptr_eq(&a, &b));
        assert_eq!(decodes.get(), 1);
        assert_eq!(a.holders(), 2);

        cache.release(a);
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
        assert_eq!(cache.len(), 1);

        cache.release(b);
        assert!(cache.is_empty());

        let c = cache.acquire(key(64), decode).unwrap();
        assert_eq!(decodes.get(), 2);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_keys_are_distinct() {
        let cache = SlabCache::new();
        let a = cache.acquire(key(64), || ints(&[1])).unwrap();
        let b = cache.acquire(key(128), || ints(&[1])).unwrap();
        assert!(!Slab::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_decode_error_is_not_cached() {
        let cache = SlabCache::new();
        let result = cache.acquire(key(1), || Err(Error::UnexpectedEof(10)));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_typed_access() {
        let slab = Slab::detached(key(0), bytemuck::cast_slice(&[7i32]).to_vec(), Dimensions::d1(1));
        assert!(matches!(slab.to_vec::<f32>(), Err(Error::TypeMismatch { .. })));
        assert!(slab.to_strings().is_err());
    }

    #[test]
    fn test_strings() {
        assert_eq!(split_strings(b"ab\0\0c\0").unwrap(), vec!["ab", "", "c"]);
        assert!(split_strings(b"").unwrap().is_empty());

        let wide: Vec<u8> = [0x68u32, 0x69, 0, 0x263A, 0]
            .iter()
            .flat_map(|c| c.to_le_bytes())
            .collect();
        assert_eq!(split_wide_strings(&wide).unwrap(), vec!["hi", "\u{263A}"]);
    }
}

//! Shape of an array sample.

use smallvec::SmallVec;

/// Extent of each axis of an array sample.
///
/// Most samples are rank 1; rank 0 is a single element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    dims: SmallVec<[u64; 4]>,
}

impl Dimensions {
    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    /// Rank-1 shape of `len` elements.
    pub fn d1(len: usize) -> Self {
        Self { dims: smallvec::smallvec![len as u64] }
    }

    pub fn from_slice(sizes: &[u64]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn sizes(&self) -> &[u64] {
        &self.dims
    }

    /// Element count, the product of all axes; `None` when it does not fit
    /// in `usize`.
    pub fn num_points(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Stored form: one little-endian u64 per axis.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.dims.iter().flat_map(|d| d.to_le_bytes()).collect()
    }

    /// Parse the stored form. Trailing bytes that do not form a whole axis
    /// are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let dims = bytes
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                u64::from_le_bytes(b)
            })
            .collect();
        Self { dims }
    }
}

impl From<usize> for Dimensions {
    fn from(len: usize) -> Self {
        Self::d1(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_points() {
        assert_eq!(Dimensions::scalar().num_points(), Some(1));
        assert_eq!(Dimensions::d1(7).num_points(), Some(7));
        assert_eq!(Dimensions::from_slice(&[2, 3, 4]).num_points(), Some(24));
        assert_eq!(Dimensions::d1(0).num_points(), Some(0));
    }

    #[test]
    fn test_num_points_overflow() {
        assert_eq!(Dimensions::from_slice(&[u64::MAX, 2]).num_points(), None);
        assert_eq!(Dimensions::from_slice(&[u64::MAX, 0]).num_points(), Some(0));
    }

    #[test]
    fn test_stored_form() {
        let dims = Dimensions::from_slice(&[4, 5]);
        let bytes = dims.to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(Dimensions::from_bytes(&bytes), dims);
    }
}

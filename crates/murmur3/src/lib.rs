//! MurmurHash3 x64_128 with seed 0.
//!
//! Used for the 16-byte content keys stored in front of every sample blob.
//! Blocks are read little-endian, so keys are identical on every target when
//! the caller hashes the stored (little-endian) byte form.

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

#[inline]
fn mix_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

#[inline]
fn mix_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

#[inline]
fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

/// Little-endian load of up to 8 bytes.
#[inline]
fn load(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i))
}

/// Hash `data`, returning `(h1, h2)`.
pub fn hash128(data: &[u8]) -> (u64, u64) {
    let mut h1: u64 = 0;
    let mut h2: u64 = 0;

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        h1 ^= mix_k1(load(&block[..8]));
        h1 = h1
            .rotate_left(27)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        h2 ^= mix_k2(load(&block[8..]));
        h2 = h2
            .rotate_left(31)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }

    let tail = blocks.remainder();
    if tail.len() > 8 {
        h2 ^= mix_k2(load(&tail[8..]));
    }
    if !tail.is_empty() {
        h1 ^= mix_k1(load(&tail[..tail.len().min(8)]));
    }

    let len = data.len() as u64;
    h1 ^= len;
    h2 ^= len;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    h1 = fmix64(h1);
    h2 = fmix64(h2);
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);
    (h1, h2)
}

/// Hash `data` into its 16-byte stored form (`h1` then `h2`, little-endian).
pub fn digest(data: &[u8]) -> [u8; 16] {
    let (h1, h2) = hash128(data);
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&h1.to_le_bytes());
    out[8..].copy_from_slice(&h2.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(hash128(&[]), (0, 0));
    }

    #[test]
    fn test_reference_vector() {
        let (h1, h2) = hash128(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(h1, 0xe34b_bc7b_bc07_1b6c);
        assert_eq!(h2, 0x7a43_3ca9_c49a_9347);
    }

    #[test]
    fn test_every_tail_length_differs() {
        let data: Vec<u8> = (0..48).collect();
        let keys: Vec<_> = (0..=data.len()).map(|n| digest(&data[..n])).collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_digest_layout() {
        let (h1, h2) = hash128(b"test");
        let bytes = digest(b"test");
        assert_eq!(bytes[..8], h1.to_le_bytes());
        assert_eq!(bytes[8..], h2.to_le_bytes());
    }
}

pub mod accounts;
pub mod blocks;
pub mod events;
pub mod highest_before;
pub mod llr;
pub mod states;

use galaxy_database::prelude::SEPARATOR;

/// A fixed width store key composed of big-endian parts, so that the
/// byte order of keys follows the numeric order of their parts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeKey<const N: usize>([u8; N]);

impl<const N: usize> BeKey<N> {
    pub(crate) fn from_parts(parts: &[&[u8]]) -> Self {
        let mut bytes = [0u8; N];
        let mut pos = 0;
        for part in parts {
            bytes[pos..pos + part.len()].copy_from_slice(part);
            pos += part.len();
        }
        debug_assert_eq!(pos, N);
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for BeKey<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<u32> for BeKey<4> {
    fn from(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl From<u64> for BeKey<8> {
    fn from(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}

/// `bucket | SEPARATOR | item` key, iterable by bucket
pub fn bucket_key(bucket: u32, item: u32) -> BeKey<9> {
    BeKey::from_parts(&[&bucket.to_be_bytes(), &[SEPARATOR], &item.to_be_bytes()])
}

/// `bucket | SEPARATOR | a | b` key, iterable by bucket
pub fn bucket_pair_key(bucket: u32, a: u32, b: u32) -> BeKey<13> {
    BeKey::from_parts(&[&bucket.to_be_bytes(), &[SEPARATOR], &a.to_be_bytes(), &b.to_be_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order() {
        assert!(BeKey::from(1u64) < BeKey::from(256u64));
        assert!(bucket_key(1, u32::MAX) < bucket_key(2, 0));
        assert!(bucket_pair_key(1, 2, 3) < bucket_pair_key(1, 3, 0));
        assert_eq!(bucket_key(1, 2).as_ref(), &[0, 0, 0, 1, SEPARATOR, 0, 0, 0, 2]);
    }
}

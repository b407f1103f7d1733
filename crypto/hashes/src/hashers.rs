use crate::Hash;
use blake2b_simd::State;

pub trait HasherBase {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self;
}

pub trait Hasher: HasherBase + Clone + Default {
    fn finalize(self) -> Hash;

    fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline(always)]
    fn hash<A: AsRef<[u8]>>(data: A) -> Hash {
        let mut hasher = Self::default();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Helpers for writing fixed width and length prefixed values
pub trait HasherExtensions {
    fn write_bool(&mut self, element: bool) -> &mut Self;
    fn write_u8(&mut self, element: u8) -> &mut Self;
    fn write_u32(&mut self, element: u32) -> &mut Self;
    fn write_u64(&mut self, element: u64) -> &mut Self;
    fn write_len(&mut self, len: usize) -> &mut Self;
    fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self;
}

impl<T: HasherBase> HasherExtensions for T {
    #[inline(always)]
    fn write_bool(&mut self, element: bool) -> &mut Self {
        self.update(if element { [1u8] } else { [0u8] })
    }

    #[inline(always)]
    fn write_u8(&mut self, element: u8) -> &mut Self {
        self.update(element.to_le_bytes())
    }

    #[inline(always)]
    fn write_u32(&mut self, element: u32) -> &mut Self {
        self.update(element.to_le_bytes())
    }

    #[inline(always)]
    fn write_u64(&mut self, element: u64) -> &mut Self {
        self.update(element.to_le_bytes())
    }

    #[inline(always)]
    fn write_len(&mut self, len: usize) -> &mut Self {
        self.write_u64(len as u64)
    }

    #[inline(always)]
    fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_len(bytes.len()).update(bytes)
    }
}

macro_rules! blake2b_hasher {
    ($(struct $name:ident => $domain_sep:literal),+ $(,)? ) => {$(
        #[derive(Clone)]
        pub struct $name(State);

        impl $name {
            #[inline(always)]
            pub fn new() -> Self {
                Self(blake2b_simd::Params::new().hash_length(32).key($domain_sep).to_state())
            }

            #[inline(always)]
            pub fn write<A: AsRef<[u8]>>(&mut self, data: A) {
                self.0.update(data.as_ref());
            }
        }

        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::new()
            }
        }

        impl HasherBase for $name {
            #[inline(always)]
            fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
                self.write(data);
                self
            }
        }

        impl Hasher for $name {
            #[inline(always)]
            fn finalize(self) -> Hash {
                Hash::from_slice(self.0.finalize().as_bytes())
            }
        }
    )*};
}

blake2b_hasher! {
    struct EventHash => b"EventHash",
    struct TransactionHash => b"TransactionHash",
    struct BlockHash => b"BlockHash",
    struct StateHash => b"StateHash",
    struct RecordHash => b"RecordHash",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separation() {
        let data = b"galaxy";
        assert_ne!(EventHash::hash(data), TransactionHash::hash(data));
        assert_eq!(EventHash::hash(data), EventHash::hash(data));

        let mut hasher = EventHash::new();
        hasher.write_u64(7).write_var_bytes(b"abc");
        let first = hasher.clone().finalize();
        hasher.reset();
        hasher.write_u64(7).write_var_bytes(b"abc");
        assert_eq!(first, hasher.finalize());
    }
}

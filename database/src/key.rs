use std::fmt::{Debug, Display};

/// Separates a bucket from the rest of the key when stores nest buckets under their prefix
pub const SEPARATOR: u8 = u8::MAX;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DbKey {
    path: Vec<u8>,
    prefix_len: usize,
}

impl DbKey {
    pub fn new<TKey>(prefix: &[u8], key: TKey) -> Self
    where
        TKey: AsRef<[u8]>,
    {
        Self { path: prefix.iter().chain(key.as_ref().iter()).copied().collect(), prefix_len: prefix.len() }
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }

    /// Appends `bucket` followed by a [`SEPARATOR`] to the prefix part of the key
    pub fn add_bucket<TBucket>(&mut self, bucket: TBucket)
    where
        TBucket: AsRef<[u8]>,
    {
        self.path.extend(bucket.as_ref());
        self.path.push(SEPARATOR);
        self.prefix_len = self.path.len();
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (prefix, key) = self.path.split_at(self.prefix_len);
        write!(f, "{:?}/{}", prefix, faster_hex::hex_string(key))
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

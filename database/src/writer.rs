use crate::prelude::FlushableDb;

/// Abstraction over DB writing
pub trait DbWriter {
    fn put<K, V>(&mut self, key: K, value: V)
    where
        K: AsRef<[u8]>,
        V: Into<Vec<u8>>;
    fn delete<K: AsRef<[u8]>>(&mut self, key: K);
}

/// Writes into the not yet flushed layer of a [`FlushableDb`]
pub struct DirectDbWriter<'a> {
    db: &'a FlushableDb,
}

impl<'a> DirectDbWriter<'a> {
    pub fn new(db: &'a FlushableDb) -> Self {
        Self { db }
    }
}

impl DbWriter for DirectDbWriter<'_> {
    fn put<K, V>(&mut self, key: K, value: V)
    where
        K: AsRef<[u8]>,
        V: Into<Vec<u8>>,
    {
        self.db.put(key.as_ref().to_vec(), value.into())
    }

    fn delete<K: AsRef<[u8]>>(&mut self, key: K) {
        self.db.delete(key.as_ref().to_vec())
    }
}

impl<T: DbWriter> DbWriter for &mut T {
    #[inline]
    fn put<K, V>(&mut self, key: K, value: V)
    where
        K: AsRef<[u8]>,
        V: Into<Vec<u8>>,
    {
        (*self).put(key, value)
    }

    #[inline]
    fn delete<K: AsRef<[u8]>>(&mut self, key: K) {
        (*self).delete(key)
    }
}

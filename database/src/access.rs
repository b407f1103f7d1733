use crate::{cache::CachePolicy, errors::StoreError, flushable::FlushableDb};

use super::prelude::{Cache, DbKey, DbWriter};
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

/// A concurrent DB store access with typed caching.
#[derive(Clone)]
pub struct CachedDbAccess<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    db: Arc<FlushableDb>,

    // Cache
    cache: Cache<TKey, TData, S>,

    // DB bucket/path
    prefix: Vec<u8>,
}

impl<TKey, TData, S> CachedDbAccess<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
    S: BuildHasher + Default,
{
    pub fn new(db: Arc<FlushableDb>, cache_policy: CachePolicy, prefix: Vec<u8>) -> Self {
        Self { db, cache: Cache::new(cache_policy), prefix }
    }

    pub fn read_from_cache(&self, key: TKey) -> Option<TData> {
        self.cache.get(&key)
    }

    pub fn has(&self, key: TKey) -> Result<bool, StoreError>
    where
        TKey: AsRef<[u8]>,
    {
        Ok(self.cache.contains_key(&key) || self.db.contains(DbKey::new(&self.prefix, key).as_ref())?)
    }

    pub fn read(&self, key: TKey) -> Result<TData, StoreError>
    where
        TKey: AsRef<[u8]>,
        TData: DeserializeOwned,
    {
        if let Some(data) = self.cache.get(&key) {
            Ok(data)
        } else {
            let db_key = DbKey::new(&self.prefix, key.clone());
            if let Some(bytes) = self.db.get(db_key.as_ref())? {
                let data: TData = bincode::deserialize(&bytes)?;
                self.cache.insert(key, data.clone());
                Ok(data)
            } else {
                Err(StoreError::KeyNotFound(db_key))
            }
        }
    }

    /// Iterates all entries of this store as `(key suffix, data)` pairs, ordered by key.
    /// When `bucket` is given only keys nested under it are returned
    pub fn iterator(&self, bucket: Option<&[u8]>) -> Result<Vec<(Box<[u8]>, TData)>, StoreError>
    where
        TData: DeserializeOwned,
    {
        let mut db_key = DbKey::prefix_only(&self.prefix);
        if let Some(bucket) = bucket {
            db_key.add_bucket(bucket);
        }
        self.db
            .prefix_entries(db_key.as_ref())?
            .into_iter()
            .map(|(key, bytes)| -> Result<_, StoreError> { Ok((key[db_key.prefix_len()..].into(), bincode::deserialize(&bytes)?)) })
            .collect()
    }

    pub fn write(&self, mut writer: impl DbWriter, key: TKey, data: TData) -> Result<(), StoreError>
    where
        TKey: AsRef<[u8]>,
        TData: Serialize,
    {
        let bin_data = bincode::serialize(&data)?;
        self.cache.insert(key.clone(), data);
        writer.put(DbKey::new(&self.prefix, key), bin_data);
        Ok(())
    }

    pub fn write_many(&self, mut writer: impl DbWriter, iter: &mut (impl Iterator<Item = (TKey, TData)> + Clone)) -> Result<(), StoreError>
    where
        TKey: AsRef<[u8]>,
        TData: Serialize,
    {
        let iter_clone = iter.clone();
        self.cache.insert_many(iter);
        for (key, data) in iter_clone {
            let bin_data = bincode::serialize(&data)?;
            writer.put(DbKey::new(&self.prefix, key), bin_data);
        }
        Ok(())
    }

    pub fn delete(&self, mut writer: impl DbWriter, key: TKey) -> Result<(), StoreError>
    where
        TKey: AsRef<[u8]>,
    {
        self.cache.remove(&key);
        writer.delete(DbKey::new(&self.prefix, key));
        Ok(())
    }

    /// Deletes all entries nested under `bucket`
    pub fn delete_bucket(&self, mut writer: impl DbWriter, bucket: &[u8]) -> Result<(), StoreError> {
        let mut db_key = DbKey::prefix_only(&self.prefix);
        db_key.add_bucket(bucket);
        for (key, _) in self.db.prefix_entries(db_key.as_ref())? {
            writer.delete(key);
        }
        // We must clear the cache in order to avoid invalidated entries
        self.cache.remove_all();
        Ok(())
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        create_temp_db,
        prelude::{ConnBuilder, DirectDbWriter, StoreConfig},
    };
    use galaxy_hashes::Hash;

    #[test]
    fn test_read_write_through_overlay() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let flushable = Arc::new(FlushableDb::new(db, StoreConfig::default()));
        let access = CachedDbAccess::<Hash, u64>::new(flushable.clone(), CachePolicy::Count(2), vec![1, 2]);

        access.write_many(DirectDbWriter::new(&flushable), &mut (0..16u64).map(|i| (Hash::from_u64_word(i), i))).unwrap();
        assert_eq!(16, access.iterator(None).unwrap().len());
        // Evicted entries are served from the not flushed layer
        assert_eq!(access.read(Hash::from_u64_word(3)).unwrap(), 3);

        flushable.flush().unwrap();
        assert_eq!(access.read(Hash::from_u64_word(7)).unwrap(), 7);
        access.delete(DirectDbWriter::new(&flushable), Hash::from_u64_word(7)).unwrap();
        assert!(!access.has(Hash::from_u64_word(7)).unwrap());
        assert_eq!(15, access.iterator(None).unwrap().len());
    }

    #[test]
    fn test_buckets() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let flushable = Arc::new(FlushableDb::new(db, StoreConfig::default()));
        let access = CachedDbAccess::<Vec<u8>, u32>::new(flushable.clone(), CachePolicy::Count(10), vec![3]);

        let key = |bucket: u8, i: u8| vec![bucket, crate::prelude::SEPARATOR, i];
        for i in 0..4 {
            access.write(DirectDbWriter::new(&flushable), key(1, i), i as u32).unwrap();
            access.write(DirectDbWriter::new(&flushable), key(2, i), 10 + i as u32).unwrap();
        }
        let bucket = access.iterator(Some(&[2])).unwrap();
        assert_eq!(bucket.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![10, 11, 12, 13]);
        assert_eq!(bucket[0].0.as_ref(), &[0]);

        access.delete_bucket(DirectDbWriter::new(&flushable), &[1]).unwrap();
        assert_eq!(access.iterator(None).unwrap().len(), 4);
        assert!(access.read(key(1, 0)).is_err());
    }
}

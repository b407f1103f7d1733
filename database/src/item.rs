use crate::{errors::StoreError, flushable::FlushableDb};

use super::prelude::{DbKey, DbWriter};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// A cached DB item with concurrency support
#[derive(Clone)]
pub struct CachedDbItem<T> {
    db: Arc<FlushableDb>,
    key: Vec<u8>,
    cached_item: Arc<RwLock<Option<T>>>,
}

impl<T> CachedDbItem<T> {
    pub fn new(db: Arc<FlushableDb>, key: Vec<u8>) -> Self {
        Self { db, key, cached_item: Arc::new(RwLock::new(None)) }
    }

    pub fn read(&self) -> Result<T, StoreError>
    where
        T: Clone + DeserializeOwned,
    {
        if let Some(item) = self.cached_item.read().clone() {
            return Ok(item);
        }
        if let Some(bytes) = self.db.get(&self.key)? {
            let item: T = bincode::deserialize(&bytes)?;
            *self.cached_item.write() = Some(item.clone());
            Ok(item)
        } else {
            Err(StoreError::KeyNotFound(DbKey::prefix_only(&self.key)))
        }
    }

    pub fn write(&mut self, mut writer: impl DbWriter, item: &T) -> Result<(), StoreError>
    where
        T: Clone + Serialize,
    {
        let bin_data = bincode::serialize(item)?;
        *self.cached_item.write() = Some(item.clone());
        writer.put(&self.key, bin_data);
        Ok(())
    }

    pub fn remove(&mut self, mut writer: impl DbWriter) -> Result<(), StoreError> {
        *self.cached_item.write() = None;
        writer.delete(&self.key);
        Ok(())
    }

    pub fn update<F>(&mut self, mut writer: impl DbWriter, op: F) -> Result<T, StoreError>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: Fn(T) -> T,
    {
        let mut guard = self.cached_item.write();
        let mut item = if let Some(item) = guard.take() {
            item
        } else if let Some(bytes) = self.db.get(&self.key)? {
            bincode::deserialize(&bytes)?
        } else {
            return Err(StoreError::KeyNotFound(DbKey::prefix_only(&self.key)));
        };

        item = op(item); // Apply the update op
        *guard = Some(item.clone());
        let bin_data = bincode::serialize(&item)?;
        writer.put(&self.key, bin_data);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        create_temp_db,
        prelude::{ConnBuilder, DirectDbWriter, StoreConfig},
    };

    #[test]
    fn test_item_update_and_reload() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let flushable = Arc::new(FlushableDb::new(db, StoreConfig::default()));
        let mut item = CachedDbItem::<u64>::new(flushable.clone(), vec![9]);
        assert!(item.read().is_err());
        item.write(DirectDbWriter::new(&flushable), &5).unwrap();
        assert_eq!(item.update(DirectDbWriter::new(&flushable), |x| x + 1).unwrap(), 6);
        flushable.flush().unwrap();

        let reloaded = CachedDbItem::<u64>::new(flushable.clone(), vec![9]);
        assert_eq!(reloaded.read().unwrap(), 6);
    }
}

use galaxy_consensus_core::tx::Address;
use galaxy_database::prelude::{CachePolicy, CachedDbAccess, DbWriter, FlushableDb, StoreResult, StoreResultExt};
use galaxy_database::registry::DatabaseStorePrefixes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: u64,
    pub nonce: u64,
}

impl Account {
    pub fn is_empty(&self) -> bool {
        self.balance == 0 && self.nonce == 0
    }
}

/// Account state of the execution module
#[derive(Clone)]
pub struct DbAccountsStore {
    db: Arc<FlushableDb>,
    access: CachedDbAccess<Address, Account>,
}

impl DbAccountsStore {
    pub fn new(db: Arc<FlushableDb>, cache_policy: CachePolicy) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_policy, DatabaseStorePrefixes::Accounts.into()) }
    }

    /// Missing accounts read as empty
    pub fn get(&self, address: Address) -> StoreResult<Account> {
        Ok(self.access.read(address).optional()?.unwrap_or_default())
    }

    pub fn set(&self, mut writer: impl DbWriter, address: Address, account: Account) -> StoreResult<()> {
        if account.is_empty() {
            self.access.delete(&mut writer, address)
        } else {
            self.access.write(&mut writer, address, account)
        }
    }

    pub fn db(&self) -> &Arc<FlushableDb> {
        &self.db
    }
}

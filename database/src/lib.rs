mod access;
mod cache;
mod db;
mod errors;
mod flushable;
mod item;
mod key;
mod writer;

pub mod registry;

pub mod utils;

pub mod prelude {
    use crate::{db, errors};

    pub use super::access::CachedDbAccess;
    pub use super::cache::{Cache, CachePolicy};
    pub use super::flushable::{FlushableDb, StoreConfig};
    pub use super::item::CachedDbItem;
    pub use super::key::{DbKey, SEPARATOR};
    pub use super::writer::{DbWriter, DirectDbWriter};
    pub use db::{ConnBuilder, DB, delete_db};
    pub use errors::{StoreError, StoreResult, StoreResultExt, StoreResultUnitExt};
}

/// Single byte prefixes of all stores sharing the database. Values must never change
/// once data was written with them, and must never equal [`crate::prelude::SEPARATOR`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseStorePrefixes {
    // ---- Events and DAG index ----
    Events = 1,
    EventHeads = 2,
    HighestBefore = 3,
    BranchSeqs = 4,

    // ---- Block processing ----
    EpochState = 10,
    BlockState = 11,
    EpochHistory = 12,
    Blocks = 13,
    Receipts = 14,
    Accounts = 15,

    // ---- Light records ----
    BlockVotes = 20,
    BlockVoters = 21,
    DecidedBlocks = 22,
    EpochVotes = 23,
    EpochVoters = 24,
    DecidedEpochs = 25,
}

impl From<DatabaseStorePrefixes> for Vec<u8> {
    fn from(value: DatabaseStorePrefixes) -> Self {
        [value as u8].to_vec()
    }
}

impl From<DatabaseStorePrefixes> for u8 {
    fn from(value: DatabaseStorePrefixes) -> Self {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::SEPARATOR;

    #[test]
    fn test_prefixes_are_not_separator() {
        let prefixes = [DatabaseStorePrefixes::Events, DatabaseStorePrefixes::Accounts, DatabaseStorePrefixes::DecidedEpochs];
        for prefix in prefixes {
            assert_ne!(u8::from(prefix), SEPARATOR);
            assert_eq!(Vec::<u8>::from(prefix), vec![prefix as u8]);
        }
    }
}

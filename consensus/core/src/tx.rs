use crate::{Gas, Hash, ValidatorId, Weight};
use galaxy_hashes::{Hasher, HasherBase, HasherExtensions, TransactionHash};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

pub const ADDRESS_SIZE: usize = 20;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_SIZE]);

impl Address {
    pub const ZERO: Address = Address([0; ADDRESS_SIZE]);

    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes[ADDRESS_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// The account validator rewards are paid to
    pub fn from_validator(id: ValidatorId) -> Self {
        let mut address = Self::from_u64(id as u64);
        address.0[0] = 0xa0;
        address
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Address of the node driver. Internal transactions are sent from it and its logs drive the validator set
pub const DRIVER_ADDRESS: Address = Address([0xd1; ADDRESS_SIZE]);

/// The payload of a transaction as understood by the execution module
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPayload {
    Transfer,
    /// Registers or re-weights a validator
    SetValidator { id: ValidatorId, weight: Weight, pubkey: Vec<u8> },
    /// Deactivates a validator starting from the next epoch
    DeactivateValidator { id: ValidatorId },
    /// Pays the accumulated fees out of the driver balance
    DistributeFees { rewards: Vec<(Address, u64)> },
    /// Asks the sealer to advance the epoch after the current block
    AdvanceEpochs { num: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub value: u64,
    pub gas: Gas,
    pub gas_price: u64,
    pub payload: TxPayload,
}

impl Transaction {
    pub fn new_transfer(from: Address, to: Address, nonce: u64, value: u64, gas: Gas, gas_price: u64) -> Self {
        Self { from, to, nonce, value, gas, gas_price, payload: TxPayload::Transfer }
    }

    /// An internal (driver originated) transaction. Internal transactions are free and carry no gas limit
    pub fn new_internal(nonce: u64, payload: TxPayload) -> Self {
        Self { from: Address::ZERO, to: DRIVER_ADDRESS, nonce, value: 0, gas: 0, gas_price: 0, payload }
    }

    pub fn is_internal(&self) -> bool {
        self.from == Address::ZERO
    }

    pub fn hash(&self) -> Hash {
        let mut hasher = TransactionHash::new();
        hasher
            .update(self.from)
            .update(self.to)
            .write_u64(self.nonce)
            .write_u64(self.value)
            .write_u64(self.gas)
            .write_u64(self.gas_price)
            .write_var_bytes(&bincode::serialize(&self.payload).unwrap_or_default());
        hasher.finalize()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub status: ReceiptStatus,
    pub gas_used: Gas,
    pub logs: Vec<Log>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_covers_payload() {
        let a = Transaction::new_internal(0, TxPayload::DeactivateValidator { id: 1 });
        let b = Transaction::new_internal(0, TxPayload::DeactivateValidator { id: 2 });
        assert_ne!(a.hash(), b.hash());
        assert!(a.is_internal());
        assert!(!Transaction::new_transfer(Address::from_u64(1), Address::from_u64(2), 0, 1, 21000, 1).is_internal());
        assert_eq!(Address::from_u64(1).to_string(), "0x0000000000000000000000000000000000000001");
    }
}

use crate::{
    Epoch, Gas, Hash, Lamport, Seq, Timestamp, ValidatorId,
    config::params::EconomyRules,
    tx::Transaction,
};
use galaxy_hashes::{EventHash, Hasher, HasherBase, HasherExtensions};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Event identifier. Lays out `epoch | lamport | hash suffix` so that the
/// natural byte order sorts events by epoch and then by lamport time
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Hash);

impl EventId {
    pub fn new(epoch: Epoch, lamport: Lamport, hash: Hash) -> Self {
        let mut bytes = hash.as_bytes();
        bytes[..4].copy_from_slice(&epoch.to_be_bytes());
        bytes[4..8].copy_from_slice(&lamport.to_be_bytes());
        Self(Hash::from_bytes(bytes))
    }

    pub fn epoch(&self) -> Epoch {
        let bytes = self.0.as_bytes();
        Epoch::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn lamport(&self) -> Lamport {
        let bytes = self.0.as_bytes();
        Lamport::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
    }

    pub fn as_hash(&self) -> Hash {
        self.0
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self.0.to_string();
        write!(f, "{}:{}:{}", self.epoch(), self.lamport(), &hex[16..24])
    }
}

impl Debug for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// A DAG event. Immutable once built, see [`MutableEvent`] for construction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub epoch: Epoch,
    pub seq: Seq,
    pub creator: ValidatorId,
    pub lamport: Lamport,
    pub creation_time: Timestamp,
    /// Self-parent (if any) comes first
    pub parents: Vec<EventId>,
    pub gas_power_left: Gas,
    pub gas_power_used: Gas,
    pub txs: Vec<Transaction>,
    pub extra: Vec<u8>,
    pub signature: Vec<u8>,
    id: EventId,
}

impl Event {
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The hash covering every field but the signature. This is what gets signed
    pub fn signing_hash(&self) -> Hash {
        calc_signing_hash(
            self.epoch,
            self.seq,
            self.creator,
            self.lamport,
            self.creation_time,
            &self.parents,
            self.gas_power_left,
            self.gas_power_used,
            &self.txs,
            &self.extra,
        )
    }

    /// Recomputes the id from the event content
    pub fn calc_id(&self) -> EventId {
        EventId::new(self.epoch, self.lamport, self.signing_hash())
    }

    pub fn self_parent(&self) -> Option<EventId> {
        if self.seq > 1 { self.parents.first().copied() } else { None }
    }

    pub fn is_self_parent(&self, id: &EventId) -> bool {
        self.self_parent().as_ref() == Some(id)
    }

    pub fn to_mutable(&self) -> MutableEvent {
        MutableEvent {
            epoch: self.epoch,
            seq: self.seq,
            creator: self.creator,
            lamport: self.lamport,
            creation_time: self.creation_time,
            parents: self.parents.clone(),
            gas_power_left: self.gas_power_left,
            gas_power_used: self.gas_power_used,
            txs: self.txs.clone(),
            extra: self.extra.clone(),
            signature: self.signature.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn calc_signing_hash(
    epoch: Epoch,
    seq: Seq,
    creator: ValidatorId,
    lamport: Lamport,
    creation_time: Timestamp,
    parents: &[EventId],
    gas_power_left: Gas,
    gas_power_used: Gas,
    txs: &[Transaction],
    extra: &[u8],
) -> Hash {
    let mut hasher = EventHash::new();
    hasher.write_u32(epoch).write_u32(seq).write_u32(creator).write_u32(lamport).write_u64(creation_time).write_len(parents.len());
    for parent in parents {
        hasher.update(parent);
    }
    hasher.write_u64(gas_power_left).write_u64(gas_power_used).write_len(txs.len());
    for tx in txs {
        hasher.update(tx.hash());
    }
    hasher.write_var_bytes(extra);
    hasher.finalize()
}

/// The gas power an event spends by its structure and payload. Saturates at `Gas::MAX`, which is
/// above any event gas limit
pub fn calc_gas_power_used(parents: usize, extra: usize, txs: &[Transaction], rules: &EconomyRules) -> Gas {
    let txs_gas = txs.iter().fold(0 as Gas, |acc, tx| acc.saturating_add(tx.gas));
    rules
        .event_gas
        .saturating_add(rules.parent_gas.saturating_mul(parents as Gas))
        .saturating_add(rules.extra_data_gas.saturating_mul(extra as Gas))
        .saturating_add(txs_gas)
}

/// Builder for [`Event`]
#[derive(Clone, Debug, Default)]
pub struct MutableEvent {
    pub epoch: Epoch,
    pub seq: Seq,
    pub creator: ValidatorId,
    pub lamport: Lamport,
    pub creation_time: Timestamp,
    pub parents: Vec<EventId>,
    pub gas_power_left: Gas,
    pub gas_power_used: Gas,
    pub txs: Vec<Transaction>,
    pub extra: Vec<u8>,
    pub signature: Vec<u8>,
}

impl MutableEvent {
    pub fn signing_hash(&self) -> Hash {
        calc_signing_hash(
            self.epoch,
            self.seq,
            self.creator,
            self.lamport,
            self.creation_time,
            &self.parents,
            self.gas_power_left,
            self.gas_power_used,
            &self.txs,
            &self.extra,
        )
    }

    pub fn build(self) -> Event {
        let id = EventId::new(self.epoch, self.lamport, self.signing_hash());
        Event {
            epoch: self.epoch,
            seq: self.seq,
            creator: self.creator,
            lamport: self.lamport,
            creation_time: self.creation_time,
            parents: self.parents,
            gas_power_left: self.gas_power_left,
            gas_power_used: self.gas_power_used,
            txs: self.txs,
            extra: self.extra,
            signature: self.signature,
            id,
        }
    }
}

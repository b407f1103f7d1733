use crate::{
    Epoch, Hash, Timestamp, ValidatorId, Weight,
    block::BlockCtx,
    config::params::Rules,
    state::{BlockState, EpochState, ValidatorBlockState, ValidatorEpochState},
    tx::Address,
    validators::{ValidatorProfile, ValidatorProfiles, validators_from_profiles},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub id: ValidatorId,
    pub weight: Weight,
    /// X-only schnorr public key
    pub pubkey: Vec<u8>,
}

/// The initial state of a network: its first epoch's validator set, rules and balances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub time: Timestamp,
    /// The epoch of the first sealed state. Events start at this epoch
    pub first_epoch: Epoch,
    pub validators: Vec<GenesisValidator>,
    pub balances: Vec<(Address, u64)>,
    pub rules: Rules,
}

impl Genesis {
    pub fn profiles(&self) -> ValidatorProfiles {
        self.validators.iter().map(|v| (v.id, ValidatorProfile { weight: v.weight, pubkey: v.pubkey.clone() })).collect()
    }

    pub fn epoch_state(&self) -> EpochState {
        let profiles = self.profiles();
        let validators = validators_from_profiles(&profiles);
        EpochState {
            epoch: self.first_epoch,
            epoch_start: self.time,
            prev_epoch_start: self.time,
            epoch_state_root: Hash::ZERO,
            validator_states: vec![ValidatorEpochState::default(); validators.len()],
            validators,
            validator_profiles: profiles,
            rules: self.rules,
        }
    }

    /// The state before the first block, on top of the genesis balances `root`
    pub fn block_state(&self, root: Hash) -> BlockState {
        let profiles = self.profiles();
        let validators = validators_from_profiles(&profiles);
        BlockState {
            last_block: BlockCtx { idx: 0, time: self.time, atropos: Default::default() },
            finalized_state_root: root,
            validator_states: vec![ValidatorBlockState { last_online_time: self.time, ..Default::default() }; validators.len()],
            next_validator_profiles: profiles,
            ..Default::default()
        }
    }
}

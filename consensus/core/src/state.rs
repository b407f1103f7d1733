use crate::{
    BlockIndex, Epoch, Gas, Hash, Timestamp, ValidatorId,
    block::BlockCtx,
    config::params::Rules,
    event::EventId,
    validators::{ValidatorProfiles, Validators},
};
use galaxy_hashes::{Hasher, StateHash};
use serde::{Deserialize, Serialize};

/// Minimal info about the last known event of a validator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: EventId,
    pub time: Timestamp,
    pub gas_power_left: Gas,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEpochState {
    pub gas_refund: Gas,
    /// The last event of the validator in the previous epoch, used as gas power starting point
    pub prev_epoch_event: EventInfo,
}

/// State fixed for the duration of an epoch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochState {
    pub epoch: Epoch,
    pub epoch_start: Timestamp,
    pub prev_epoch_start: Timestamp,
    pub epoch_state_root: Hash,
    pub validators: Validators,
    /// Indexed by validator position in `validators`
    pub validator_states: Vec<ValidatorEpochState>,
    pub validator_profiles: ValidatorProfiles,
    pub rules: Rules,
}

impl EpochState {
    pub fn hash(&self) -> Hash {
        StateHash::hash(bincode::serialize(self).unwrap_or_default())
    }

    pub fn validator_state(&self, id: ValidatorId) -> Option<&ValidatorEpochState> {
        self.validators.get_idx(id).and_then(|idx| self.validator_states.get(idx))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorBlockState {
    pub last_event: EventInfo,
    /// Accumulated online time in this epoch
    pub uptime: Timestamp,
    pub last_online_time: Timestamp,
    pub last_block: BlockIndex,
    pub dirty_gas_refund: Gas,
    /// Fees of transactions which were first included in events of this validator
    pub originated: u64,
}

/// State accumulated block by block and reset on epoch seal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub last_block: BlockCtx,
    pub finalized_state_root: Hash,
    pub epoch_gas: Gas,
    pub epoch_cheaters: Vec<ValidatorId>,
    /// Number of `epoch_cheaters` already deactivated by internal transactions
    pub cheaters_written: u32,
    /// Indexed by validator position in the current epoch's validator set
    pub validator_states: Vec<ValidatorBlockState>,
    /// The validator profiles the next epoch will start with
    pub next_validator_profiles: ValidatorProfiles,
    /// Rules the next epoch will start with, if changed
    pub dirty_rules: Option<Rules>,
    /// Number of epochs to seal after the current block
    pub advance_epochs: u32,
}

impl BlockState {
    pub fn hash(&self) -> Hash {
        StateHash::hash(bincode::serialize(self).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::FAKENET_RULES;

    #[test]
    fn test_state_hashes() {
        let es = EpochState {
            epoch: 1,
            epoch_start: 0,
            prev_epoch_start: 0,
            epoch_state_root: Hash::ZERO,
            validators: Validators::new([(1, 1)]),
            validator_states: vec![ValidatorEpochState::default()],
            validator_profiles: Default::default(),
            rules: FAKENET_RULES,
        };
        let mut es2 = es.clone();
        assert_eq!(es.hash(), es2.hash());
        es2.epoch = 2;
        assert_ne!(es.hash(), es2.hash());
        assert!(es.validator_state(1).is_some());
        assert!(es.validator_state(2).is_none());

        let bs = BlockState::default();
        assert_ne!(bs.hash(), Hash::ZERO);
    }
}

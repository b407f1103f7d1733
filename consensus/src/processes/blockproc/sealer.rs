use super::{SealerModule, SealerProcessor};
use galaxy_consensus_core::{
    block::BlockCtx,
    state::{BlockState, EpochState, ValidatorBlockState, ValidatorEpochState},
    validators::validators_from_profiles,
};

/// Decides when an epoch ends and builds the states the next epoch starts with
pub struct EpochsSealerModule;

impl SealerModule for EpochsSealerModule {
    fn start(&self, block: &BlockCtx, bs: &BlockState, es: &EpochState) -> Box<dyn SealerProcessor> {
        Box::new(EpochsSealer { block: *block, bs: bs.clone(), es: es.clone() })
    }
}

struct EpochsSealer {
    block: BlockCtx,
    bs: BlockState,
    es: EpochState,
}

impl SealerProcessor for EpochsSealer {
    fn epoch_sealing(&self) -> bool {
        let epochs = &self.es.rules.epochs;
        self.bs.epoch_gas >= epochs.max_epoch_gas
            || self.block.time.saturating_sub(self.es.epoch_start) >= epochs.max_epoch_duration
            || self.bs.advance_epochs > 0
            || !self.bs.epoch_cheaters.is_empty()
    }

    fn seal_epoch(&mut self) -> (BlockState, EpochState) {
        let old_validators = &self.es.validators;
        let new_validators = validators_from_profiles(&self.bs.next_validator_profiles);

        let mut epoch_states = Vec::with_capacity(new_validators.len());
        let mut block_states = Vec::with_capacity(new_validators.len());
        for id in new_validators.ids().iter().copied() {
            match old_validators.get_idx(id) {
                Some(old_idx) => {
                    let prev = &self.bs.validator_states[old_idx];
                    epoch_states.push(ValidatorEpochState { gas_refund: prev.dirty_gas_refund, prev_epoch_event: prev.last_event });
                    block_states.push(ValidatorBlockState { uptime: 0, dirty_gas_refund: 0, originated: 0, ..prev.clone() });
                }
                None => {
                    epoch_states.push(ValidatorEpochState::default());
                    block_states.push(ValidatorBlockState {
                        last_block: self.block.idx,
                        last_online_time: self.block.time,
                        ..Default::default()
                    });
                }
            }
        }

        self.es.validator_profiles = self.bs.next_validator_profiles.clone();
        self.es.validators = new_validators;
        self.es.validator_states = epoch_states;
        self.bs.validator_states = block_states;

        self.es.prev_epoch_start = self.es.epoch_start;
        self.es.epoch_start = self.block.time;
        if let Some(rules) = self.bs.dirty_rules.take() {
            self.es.rules = rules;
        }
        self.es.epoch_state_root = self.bs.finalized_state_root;

        self.bs.epoch_gas = 0;
        self.bs.epoch_cheaters.clear();
        self.bs.cheaters_written = 0;
        self.es.epoch += 1;
        self.bs.advance_epochs = self.bs.advance_epochs.saturating_sub(1);

        (self.bs.clone(), self.es.clone())
    }

    fn update(&mut self, bs: &BlockState, es: &EpochState) {
        self.bs = bs.clone();
        self.es = es.clone();
    }
}

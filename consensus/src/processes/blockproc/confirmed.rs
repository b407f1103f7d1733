use super::{ConfirmedEventsModule, ConfirmedEventsProcessor};
use galaxy_consensus_core::{
    Gas,
    block::BlockCtx,
    event::Event,
    state::{BlockState, EpochState, EventInfo},
};

/// Folds confirmed events into per validator block states: liveness, uptime and the epoch gas
pub struct ValidatorEventsModule;

impl ConfirmedEventsModule for ValidatorEventsModule {
    fn start(&self, bs: &BlockState, es: &EpochState) -> Box<dyn ConfirmedEventsProcessor> {
        Box::new(ValidatorEventsProcessor {
            highest_events: vec![None; es.validators.len()],
            gas_used: 0,
            bs: bs.clone(),
            es: es.clone(),
        })
    }
}

#[derive(Clone, Copy)]
struct HighestEvent {
    seq: u32,
    info: EventInfo,
}

struct ValidatorEventsProcessor {
    /// Per validator, the confirmed event with the highest seq in this block
    highest_events: Vec<Option<HighestEvent>>,
    gas_used: Gas,
    bs: BlockState,
    es: EpochState,
}

impl ConfirmedEventsProcessor for ValidatorEventsProcessor {
    fn process_confirmed_event(&mut self, event: &Event) {
        let Some(idx) = self.es.validators.get_idx(event.creator) else {
            return;
        };
        if self.highest_events[idx].is_none_or(|prev| event.seq > prev.seq) {
            let info = EventInfo { id: event.id(), time: event.creation_time, gas_power_left: event.gas_power_left };
            self.highest_events[idx] = Some(HighestEvent { seq: event.seq, info });
        }
        self.gas_used += event.gas_power_used;
    }

    fn finalize(&mut self, block: &BlockCtx, _skipped: bool) -> BlockState {
        for cheater in self.bs.epoch_cheaters.iter() {
            if let Some(idx) = self.es.validators.get_idx(*cheater) {
                self.highest_events[idx] = None;
            }
        }
        let slack = self.es.rules.economy.block_missed_slack;
        for (idx, highest) in self.highest_events.iter().enumerate() {
            let Some(HighestEvent { info: event, .. }) = highest else {
                continue;
            };
            let state = &mut self.bs.validator_states[idx];
            if block.idx <= state.last_block + slack {
                let prev_online = state.last_online_time.max(self.es.epoch_start);
                state.uptime += event.time.saturating_sub(prev_online);
            }
            state.last_event = *event;
            state.last_online_time = event.time;
            state.last_block = block.idx;
        }
        self.bs.epoch_gas += self.gas_used;
        self.bs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestDag;
    use galaxy_consensus_core::state::ValidatorBlockState;

    #[test]
    fn test_liveness_and_epoch_gas() {
        let mut dag = TestDag::new(1);
        let es = dag.epoch_state(&[(1, 1), (2, 1), (3, 1)]);
        let bs = BlockState { validator_states: vec![ValidatorBlockState::default(); 3], epoch_cheaters: vec![3], ..Default::default() };
        let (a, b, c) = (es.validators.get_idx(1).unwrap(), es.validators.get_idx(2).unwrap(), es.validators.get_idx(3).unwrap());

        let a1 = dag.add_with(1, &[], |e| e.gas_power_used = 10);
        let a2 = dag.add_with(1, &[a1.id()], |e| e.gas_power_used = 20);
        let c1 = dag.add_with(3, &[], |e| e.gas_power_used = 5);

        let mut processor = ValidatorEventsModule.start(&bs, &es);
        // Out of order on purpose: the highest seq wins
        processor.process_confirmed_event(&a2);
        processor.process_confirmed_event(&a1);
        processor.process_confirmed_event(&c1);
        let block = BlockCtx { idx: 1, time: a2.creation_time, atropos: a2.id() };
        let bs = processor.finalize(&block, false);

        assert_eq!(bs.epoch_gas, 35);
        assert_eq!(bs.validator_states[a].last_event.id, a2.id());
        assert_eq!(bs.validator_states[a].last_online_time, a2.creation_time);
        assert_eq!(bs.validator_states[a].uptime, a2.creation_time - es.epoch_start);
        assert_eq!(bs.validator_states[a].last_block, 1);
        assert_eq!(bs.validator_states[b], ValidatorBlockState::default());
        // Cheaters are not credited with liveness
        assert_eq!(bs.validator_states[c].last_block, 0);
    }
}

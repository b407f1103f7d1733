use super::{
    TxListener, TxListenerModule,
    evm::{ADVANCE_EPOCHS_TOPIC, DEACTIVATE_VALIDATOR_TOPIC, SET_VALIDATOR_TOPIC},
};
use galaxy_consensus_core::{
    ValidatorId,
    block::BlockCtx,
    state::{BlockState, EpochState},
    tx::{DRIVER_ADDRESS, Log, Receipt, Transaction, TxPayload},
    validators::ValidatorProfile,
};
use galaxy_core::{debug, warn};

/// Upper bound of pending epoch advances
const MAX_ADVANCE_EPOCHS: u32 = 1 << 16;

/// Applies driver logs to the next epoch's validator profiles and credits transaction fees
/// to the validators which originated the transactions
pub struct DriverTxListenerModule;

impl TxListenerModule for DriverTxListenerModule {
    fn start(&self, block: &BlockCtx, bs: &BlockState, es: &EpochState) -> Box<dyn TxListener> {
        Box::new(DriverTxListener { block: *block, bs: bs.clone(), es: es.clone() })
    }
}

struct DriverTxListener {
    block: BlockCtx,
    bs: BlockState,
    es: EpochState,
}

impl TxListener for DriverTxListener {
    fn on_new_log(&mut self, log: &Log) {
        if log.address != DRIVER_ADDRESS {
            return;
        }
        let Some(topic) = log.topics.first() else {
            return;
        };
        let payload = match bincode::deserialize::<TxPayload>(&log.data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Malformed driver log in block {}: {}", self.block.idx, err);
                return;
            }
        };
        match payload {
            TxPayload::SetValidator { id, weight, pubkey } if *topic == SET_VALIDATOR_TOPIC => {
                if weight == 0 {
                    self.bs.next_validator_profiles.remove(&id);
                } else {
                    self.bs.next_validator_profiles.insert(id, ValidatorProfile { weight, pubkey });
                }
            }
            TxPayload::DeactivateValidator { id } if *topic == DEACTIVATE_VALIDATOR_TOPIC => {
                debug!("Validator {} deactivated in block {}", id, self.block.idx);
                self.bs.next_validator_profiles.remove(&id);
            }
            TxPayload::AdvanceEpochs { num } if *topic == ADVANCE_EPOCHS_TOPIC => {
                self.bs.advance_epochs = self.bs.advance_epochs.saturating_add(num).min(MAX_ADVANCE_EPOCHS);
            }
            _ => warn!("Driver log topic {} does not match its payload", topic),
        }
    }

    fn on_new_receipt(&mut self, tx: &Transaction, receipt: &Receipt, originator: Option<ValidatorId>) {
        let Some(idx) = originator.and_then(|creator| self.es.validators.get_idx(creator)) else {
            return;
        };
        let fee = receipt.gas_used.saturating_mul(tx.gas_price);
        if let Some(state) = self.bs.validator_states.get_mut(idx) {
            state.originated = state.originated.saturating_add(fee);
        }
    }

    fn finalize(&mut self) -> BlockState {
        self.bs.clone()
    }

    fn update(&mut self, bs: &BlockState, es: &EpochState) {
        self.bs = bs.clone();
        self.es = es.clone();
    }
}

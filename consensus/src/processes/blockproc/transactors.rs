use super::{TxTransactor, evm::StateDb};
use crate::errors::BlockProcResult;
use galaxy_consensus_core::{
    block::BlockCtx,
    state::{BlockState, EpochState},
    tx::{Address, DRIVER_ADDRESS, Transaction, TxPayload},
};

fn internal_txs(statedb: &StateDb, payloads: impl IntoIterator<Item = TxPayload>) -> BlockProcResult<Vec<Transaction>> {
    let nonce = statedb.nonce(Address::ZERO)?;
    Ok(payloads.into_iter().enumerate().map(|(i, payload)| Transaction::new_internal(nonce + i as u64, payload)).collect())
}

/// Registers the genesis validators with the driver in the very first block
pub struct GenesisTransactor;

impl TxTransactor for GenesisTransactor {
    fn pop_internal_txs(
        &self,
        _block: &BlockCtx,
        bs: &BlockState,
        es: &EpochState,
        _sealing: bool,
        statedb: &StateDb,
    ) -> BlockProcResult<Vec<Transaction>> {
        if bs.last_block.idx != 0 {
            return Ok(vec![]);
        }
        internal_txs(
            statedb,
            es.validator_profiles.iter().map(|(id, profile)| TxPayload::SetValidator {
                id: *id,
                weight: profile.weight,
                pubkey: profile.pubkey.clone(),
            }),
        )
    }
}

/// Deactivates the cheaters not yet reported to the driver
pub struct PreBlockTransactor;

impl TxTransactor for PreBlockTransactor {
    fn pop_internal_txs(
        &self,
        _block: &BlockCtx,
        bs: &BlockState,
        _es: &EpochState,
        _sealing: bool,
        statedb: &StateDb,
    ) -> BlockProcResult<Vec<Transaction>> {
        let written = (bs.cheaters_written as usize).min(bs.epoch_cheaters.len());
        internal_txs(statedb, bs.epoch_cheaters[written..].iter().map(|id| TxPayload::DeactivateValidator { id: *id }))
    }
}

/// On epoch seal, deactivates validators which stayed offline for too long and pays
/// the collected fees out in proportion to the fees each validator originated
pub struct PostBlockTransactor;

impl TxTransactor for PostBlockTransactor {
    fn pop_internal_txs(
        &self,
        block: &BlockCtx,
        bs: &BlockState,
        es: &EpochState,
        sealing: bool,
        statedb: &StateDb,
    ) -> BlockProcResult<Vec<Transaction>> {
        if !sealing {
            return Ok(vec![]);
        }
        let threshold = es.rules.economy.offline_penalty_threshold;
        let mut payloads = Vec::new();
        for (idx, (id, _)) in es.validators.iter().enumerate() {
            let state = &bs.validator_states[idx];
            if state.last_block + threshold.blocks_num < block.idx && state.last_online_time + threshold.period < block.time {
                payloads.push(TxPayload::DeactivateValidator { id });
            }
        }

        let pool = statedb.balance(DRIVER_ADDRESS)?;
        let total_originated: u128 = bs.validator_states.iter().map(|state| state.originated as u128).sum();
        if pool > 0 && total_originated > 0 {
            let rewards: Vec<(Address, u64)> = es
                .validators
                .ids()
                .iter()
                .zip(bs.validator_states.iter())
                .filter(|(_, state)| state.originated > 0)
                .map(|(id, state)| (Address::from_validator(*id), (pool as u128 * state.originated as u128 / total_originated) as u64))
                .collect();
            payloads.push(TxPayload::DistributeFees { rewards });
        }
        internal_txs(statedb, payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::stores::accounts::{Account, DbAccountsStore}, test_helpers::{new_temp_flushable, test_epoch_state}};
    use galaxy_consensus_core::{Hash, state::ValidatorBlockState};
    use galaxy_database::prelude::CachePolicy;
    use std::sync::Arc;

    #[test]
    fn test_genesis_and_pre_block_txs() {
        let (_lifetime, db) = new_temp_flushable();
        let mut statedb = StateDb::new(Arc::new(DbAccountsStore::new(db, CachePolicy::Empty)), Hash::ZERO);
        statedb.set(Address::ZERO, Account { balance: 0, nonce: 4 });
        let es = test_epoch_state(1, &[(1, 1), (2, 1)]);
        let mut bs = BlockState { epoch_cheaters: vec![1, 2], cheaters_written: 1, ..Default::default() };
        let block = BlockCtx::default();

        let genesis = GenesisTransactor.pop_internal_txs(&block, &bs, &es, false, &statedb).unwrap();
        assert_eq!(genesis.len(), 2);
        assert_eq!(genesis[1].nonce, 5);

        let pre = PreBlockTransactor.pop_internal_txs(&block, &bs, &es, false, &statedb).unwrap();
        assert_eq!(pre, vec![Transaction::new_internal(4, TxPayload::DeactivateValidator { id: 2 })]);

        bs.last_block.idx = 1;
        bs.cheaters_written = 2;
        assert!(GenesisTransactor.pop_internal_txs(&block, &bs, &es, false, &statedb).unwrap().is_empty());
        assert!(PreBlockTransactor.pop_internal_txs(&block, &bs, &es, false, &statedb).unwrap().is_empty());
    }

    #[test]
    fn test_post_block_txs_on_seal() {
        let (_lifetime, db) = new_temp_flushable();
        let mut statedb = StateDb::new(Arc::new(DbAccountsStore::new(db, CachePolicy::Empty)), Hash::ZERO);
        statedb.set(DRIVER_ADDRESS, Account { balance: 1_000, nonce: 0 });
        let es = test_epoch_state(1, &[(1, 1), (2, 1)]);
        let threshold = es.rules.economy.offline_penalty_threshold;
        let (a, b) = (es.validators.get_idx(1).unwrap(), es.validators.get_idx(2).unwrap());
        let block = BlockCtx { idx: threshold.blocks_num + 10, time: threshold.period + 10, ..Default::default() };

        let mut validator_states = vec![ValidatorBlockState::default(); 2];
        validator_states[a] = ValidatorBlockState { last_block: block.idx - 1, last_online_time: block.time, originated: 3, ..Default::default() };
        validator_states[b].originated = 1;
        let bs = BlockState { validator_states, ..Default::default() };

        assert!(PostBlockTransactor.pop_internal_txs(&block, &bs, &es, false, &statedb).unwrap().is_empty());
        let txs = PostBlockTransactor.pop_internal_txs(&block, &bs, &es, true, &statedb).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].payload, TxPayload::DeactivateValidator { id: 2 });
        assert_eq!(
            txs[1].payload,
            TxPayload::DistributeFees { rewards: vec![(Address::from_validator(1), 750), (Address::from_validator(2), 250)] }
        );
    }
}

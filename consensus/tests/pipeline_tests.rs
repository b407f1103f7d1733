use galaxy_consensus::{
    consensus::test_consensus::TestConsensus, errors::ConsensusError, model::stores::states::StatesStoreReader,
};
use galaxy_consensus_core::{
    errors::event::{CheckStage, EventError},
    sign::sign_event,
    tx::{Address, DRIVER_ADDRESS, Transaction, TxPayload},
};
use std::{
    sync::{Arc, atomic::Ordering},
    thread,
    time::{Duration, Instant},
};

mod common;
use common::{A, B, C};

fn rejection_stage(result: Result<(), ConsensusError>) -> CheckStage {
    match result {
        Err(ConsensusError::Rejected(err)) => err.stage(),
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[test]
fn test_highest_before_vectors() {
    let tc = common::equal_validators(&common::test_config(), 2);
    let handles = tc.init();
    let validators = tc.get_validators().unwrap();
    let (a, b) = (validators.get_idx(A).unwrap(), validators.get_idx(B).unwrap());

    let a1 = tc.build_event(A, &[]);
    tc.process_event(a1.clone()).unwrap();
    let b1 = tc.build_event(B, &[]);
    tc.process_event(b1.clone()).unwrap();
    let a2 = tc.build_event(A, &[a1.id(), b1.id()]);
    tc.process_event(a2.clone()).unwrap();

    let hb = tc.get_highest_before(a1.id()).unwrap().unwrap();
    assert_eq!((hb.seq(a), hb.seq(b)), (1, 0));
    let hb = tc.get_highest_before(b1.id()).unwrap().unwrap();
    assert_eq!((hb.seq(a), hb.seq(b)), (0, 1));
    let hb = tc.get_highest_before(a2.id()).unwrap().unwrap();
    assert_eq!((hb.seq(a), hb.seq(b)), (2, 1));
    assert!(!hb.is_fork_detected(a) && !hb.is_fork_detected(b));

    let mut heads = tc.heads().unwrap();
    heads.sort();
    let mut expected = vec![a2.id(), b1.id()];
    expected.sort();
    assert_eq!(heads, expected);

    tc.shutdown(handles);
}

#[test]
fn test_blocks_follow_confirmation_order() {
    let tc = common::equal_validators(&common::test_config(), 2);
    let handles = tc.init();

    let a1 = tc.build_event(A, &[]);
    tc.process_event(a1.clone()).unwrap();
    let b1 = tc.build_event(B, &[]);
    tc.process_event(b1.clone()).unwrap();
    tc.wait_for_processing();
    assert!(tc.get_block(1).unwrap().is_none());

    // A2 lets both validators observe B1
    let a2 = tc.build_event(A, &[a1.id(), b1.id()]);
    tc.process_event(a2.clone()).unwrap();
    tc.wait_for_processing();
    let block = tc.get_block(1).unwrap().expect("block 1 is produced");
    assert_eq!(block.events, vec![b1.id()]);
    assert_eq!(block.atropos, b1.id());
    assert!(block.time >= b1.creation_time);

    // B2 confirms A1 and A2, ordered by lamport
    let b2 = tc.build_event(B, &[b1.id(), a2.id()]);
    tc.process_event(b2).unwrap();
    tc.wait_for_processing();
    let block = tc.get_block(2).unwrap().expect("block 2 is produced");
    assert_eq!(block.events, vec![a1.id(), a2.id()]);
    assert_eq!(block.atropos, a2.id());

    let bs = tc.block_state().unwrap();
    assert_eq!(bs.last_block.idx, 2);
    assert_eq!(bs.last_block.atropos, a2.id());
    assert_eq!(tc.counters().blocks_processed.load(Ordering::Relaxed), 2);

    tc.shutdown(handles);
}

#[test]
fn test_transfers_are_executed() {
    let tc = common::equal_validators(&common::test_config(), 2);
    let handles = tc.init();
    let (from, to) = (Address::from_validator(A), Address::from_u64(1234));

    let tx = Transaction::new_transfer(from, to, 0, 500, 21_000, 0);
    let a1 = tc.build_event_with_txs(A, &[], vec![tx.clone()]);
    assert_eq!(a1.txs, vec![tx.clone()]);
    tc.process_event(a1.clone()).unwrap();
    let b1 = tc.build_event(B, &[a1.id()]);
    tc.process_event(b1).unwrap();
    tc.wait_for_processing();

    let block = tc.get_block(1).unwrap().expect("block 1 is produced");
    assert_eq!(block.events, vec![a1.id()]);
    assert_eq!(block.txs, vec![tx.hash()]);
    assert!(block.skipped_txs.is_empty());
    assert_eq!(tc.storage().accounts_store.get(to).unwrap().balance, 500);
    assert_eq!(tc.storage().accounts_store.get(from).unwrap().nonce, 1);
    assert_eq!(tc.block_state().unwrap().finalized_state_root, block.root);

    tc.shutdown(handles);
}

#[test]
fn test_rejections_leave_no_trace() {
    let tc = common::equal_validators(&common::test_config(), 2);
    let handles = tc.init();

    // Future epoch
    let mut event = tc.build_event(A, &[]).to_mutable();
    event.epoch = 2;
    let future = tc.sign(event);
    assert_eq!(rejection_stage(tc.process_event(future.clone())), CheckStage::Epoch);

    // Signed by another validator
    let mut forged = tc.build_event(A, &[]).to_mutable();
    sign_event(&mut forged, tc.keypair(B));
    let forged = Arc::new(forged.build());
    assert_eq!(rejection_stage(tc.process_event(forged.clone())), CheckStage::Heavy);

    // Lies about its gas power
    let mut greedy = tc.build_event(A, &[]).to_mutable();
    greedy.gas_power_left += 1;
    let greedy = tc.sign(greedy);
    assert_eq!(rejection_stage(tc.process_event(greedy.clone())), CheckStage::GasPower);

    for event in [future, forged, greedy] {
        assert!(tc.get_event(event.id()).unwrap().is_none());
        assert!(tc.get_highest_before(event.id()).unwrap().is_none());
    }
    assert!(tc.heads().unwrap().is_empty());

    // A valid event is still accepted on a clean slate
    let a1 = tc.build_event(A, &[]);
    tc.process_event(a1.clone()).unwrap();
    assert_eq!(tc.heads().unwrap(), vec![a1.id()]);
    match tc.process_event(a1.clone()) {
        Err(ConsensusError::Rejected(EventError::AlreadyKnown(id))) => assert_eq!(id, a1.id()),
        other => panic!("expected the event to be known, got {:?}", other),
    }

    let counters = tc.counters().snapshot();
    assert_eq!(counters.events_received, 5);
    assert_eq!(counters.events_accepted, 1);
    assert_eq!(counters.events_rejected, 4);

    tc.shutdown(handles);
}

#[test]
fn test_no_gas_power_no_event() {
    let config = common::test_config()
        .to_builder()
        .edit_consensus_params(|p| {
            p.rules.economy.gas_power.alloc_per_sec = 0;
            p.rules.economy.gas_power.min_startup_gas = 0;
        })
        .build();
    let tc = common::equal_validators(&config, 2);
    match tc.emit(A) {
        Err(ConsensusError::Rejected(err)) => {
            assert!(err.is_resource_exhaustion());
            assert_eq!(err.stage(), CheckStage::GasPower);
        }
        other => panic!("expected insufficient gas power, got {:?}", other),
    }
    assert!(tc.heads().unwrap().is_empty());
}

#[test]
fn test_epoch_sealed_by_duration() {
    let config = common::test_config().to_builder().edit_consensus_params(|p| p.rules.epochs.max_epoch_duration = 0).build();
    let tc = common::equal_validators(&config, 3);
    let handles = tc.init();
    let first = tc.epoch_state().unwrap();

    // C1 makes A1 observed by every validator, and the first block seals the epoch
    let a1 = tc.emit(A).unwrap();
    let b1 = tc.emit(B).unwrap();
    let c1 = tc.emit(C).unwrap();
    tc.wait_for_processing();
    assert_eq!(tc.get_block(1).unwrap().expect("block 1 is produced").events, vec![a1.id()]);

    let es = tc.epoch_state().unwrap();
    assert_eq!(es.epoch, first.epoch + 1);
    assert_eq!(es.validators, first.validators);
    assert_eq!(tc.counters().epochs_sealed.load(Ordering::Relaxed), 1);
    let record = tc.storage().states_store.read().get_history(es.epoch).unwrap();
    assert_eq!(record.epoch_state, *es);

    // Events of the sealed epoch are now rejected, fresh ones are accepted
    let late = tc.build_event(A, &[]);
    assert_eq!(late.epoch, es.epoch);
    tc.process_event(late).unwrap();
    for event in [a1, b1, c1] {
        assert!(tc.get_event(event.id()).unwrap().is_some());
    }

    tc.shutdown(handles);
}

#[test]
fn test_epoch_advanced_by_driver() {
    let config = common::test_config();
    let owner = config.driver_owner;
    let weights = [(A, 1), (B, 1)];
    let tc = TestConsensus::new(&config, &weights, vec![(owner, 1_000_000)]);
    let handles = tc.init();
    let validators = tc.epoch_state().unwrap().validators.clone();

    let mut advance = Transaction::new_transfer(owner, DRIVER_ADDRESS, 0, 0, 21_000, 0);
    advance.payload = TxPayload::AdvanceEpochs { num: 1 };
    let a1 = tc.build_event_with_txs(A, &[], vec![advance]);
    tc.process_event(a1.clone()).unwrap();
    let b1 = tc.build_event(B, &[a1.id()]);
    tc.process_event(b1).unwrap();
    tc.wait_for_processing();

    let es = tc.epoch_state().unwrap();
    assert_eq!(es.epoch, 2);
    assert_eq!(es.validators, validators);
    let bs = tc.block_state().unwrap();
    assert_eq!(bs.advance_epochs, 0);
    assert_eq!(bs.last_block.idx, 1);
    assert_eq!(es.epoch_start, tc.get_block(1).unwrap().unwrap().time);

    tc.shutdown(handles);
}

#[test]
fn test_flusher_waits_for_idle() {
    let config = common::test_config().to_builder().edit_perf_params(|p| p.max_non_flushed_period = Duration::from_millis(1)).build();
    let tc = common::equal_validators(&config, 2);
    let handles = tc.init();

    // A single event of two validators confirms nothing, so no block task is pending
    tc.emit(A).unwrap();
    thread::sleep(Duration::from_millis(10));
    assert!(tc.storage().db().not_flushed_entries() > 0);

    {
        let _busy = tc.busy_flags().event_guard();
        assert!(!tc.flusher().try_commit());
        assert!(tc.storage().db().not_flushed_entries() > 0);
    }
    assert!(tc.flusher().try_commit());
    assert_eq!(tc.storage().db().not_flushed_entries(), 0);
    assert!(!tc.flusher().try_commit());

    tc.shutdown(handles);
}

#[test]
fn test_emitters_and_shutdown() {
    let config = common::test_config().to_builder().edit_perf_params(|p| p.emit_interval = Duration::from_millis(20)).build();
    let tc = common::equal_validators(&config, 2);
    let pool = tc.add_emitter(A, *tc.keypair(A));
    tc.add_emitter(B, *tc.keypair(B));
    pool.add(Transaction::new_transfer(Address::from_validator(A), Address::from_u64(7), 0, 10, 21_000, 0));

    let handles = tc.init();
    let deadline = Instant::now() + Duration::from_secs(10);
    while tc.counters().blocks_processed.load(Ordering::Relaxed) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    tc.shutdown(handles);

    let counters = tc.counters().snapshot();
    assert!(counters.events_accepted >= 4);
    assert!(counters.blocks_processed >= 2);
    assert!(pool.is_empty());
    assert_eq!(tc.storage().db().not_flushed_entries(), 0);

    // Intake is closed for good
    assert!(matches!(tc.emit(A), Err(ConsensusError::ShuttingDown)));
    tc.shutdown(vec![]);
}

use super::Consensus;
use crate::errors::ConsensusResult;
use galaxy_consensus_core::{
    ValidatorId, Weight,
    config::{
        Config,
        genesis::{Genesis, GenesisValidator},
    },
    event::{Event, EventId, MutableEvent},
    sign::{generate_keypair, pubkey_bytes, sign_event},
    tx::{Address, Transaction},
};
use galaxy_core::time::unix_now;
use galaxy_database::{create_temp_db, prelude::ConnBuilder, utils::DbLifetime};
use secp256k1::Keypair;
use std::{
    collections::{BTreeMap, VecDeque},
    ops::Deref,
    sync::Arc,
    thread::JoinHandle,
};

/// A consensus over a temp DB, with a generated keypair for every genesis validator
pub struct TestConsensus {
    consensus: Arc<Consensus>,
    keypairs: BTreeMap<ValidatorId, Keypair>,
    genesis: Genesis,
    _db_lifetime: DbLifetime,
}

impl TestConsensus {
    pub fn new(config: &Config, weights: &[(ValidatorId, Weight)], balances: Vec<(Address, u64)>) -> Self {
        let keypairs: BTreeMap<_, _> = weights.iter().map(|(id, _)| (*id, generate_keypair())).collect();
        let genesis = Genesis {
            time: unix_now(),
            first_epoch: 1,
            validators: weights
                .iter()
                .map(|(id, weight)| GenesisValidator { id: *id, weight: *weight, pubkey: pubkey_bytes(&keypairs[id]) })
                .collect(),
            balances,
            rules: config.rules,
        };
        let (db_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let consensus = Arc::new(Consensus::new(db, Arc::new(config.clone()), &genesis).unwrap());
        Self { consensus, keypairs, genesis, _db_lifetime: db_lifetime }
    }

    pub fn consensus(&self) -> Arc<Consensus> {
        self.consensus.clone()
    }

    pub fn genesis(&self) -> &Genesis {
        &self.genesis
    }

    pub fn keypair(&self, id: ValidatorId) -> &Keypair {
        &self.keypairs[&id]
    }

    pub fn init(&self) -> Vec<JoinHandle<()>> {
        self.consensus.run_processors()
    }

    pub fn shutdown(&self, wait_handles: Vec<JoinHandle<()>>) {
        self.consensus.shutdown();
        wait_handles.into_iter().for_each(|handle| handle.join().unwrap());
    }

    /// Closes the consensus and opens a new one over the same database, as a node restart would.
    /// Handles returned by [`Self::init`] must be joined first
    pub fn restart(&mut self) {
        self.consensus.shutdown();
        let db = self.consensus.storage().db().inner().clone();
        let config = self.consensus.config().clone();
        self.consensus = Arc::new(Consensus::new(db, config, &self.genesis).unwrap());
    }

    /// A signed event of `creator` with the given parents, self-parent first
    pub fn build_event(&self, creator: ValidatorId, parents: &[EventId]) -> Arc<Event> {
        self.build_event_with_txs(creator, parents, vec![])
    }

    pub fn build_event_with_txs(&self, creator: ValidatorId, parents: &[EventId], txs: Vec<Transaction>) -> Arc<Event> {
        let mut pending = VecDeque::from(txs);
        let event = self.consensus.build_event(creator, parents, unix_now(), &mut pending).unwrap();
        self.sign(event)
    }

    /// Signs with the key of the event creator
    pub fn sign(&self, mut event: MutableEvent) -> Arc<Event> {
        let keypair = self.keypair(event.creator);
        sign_event(&mut event, keypair);
        Arc::new(event.build())
    }

    /// Creates, signs and processes an event on top of the current heads
    pub fn emit(&self, creator: ValidatorId) -> ConsensusResult<Arc<Event>> {
        let event = self.sign(self.consensus.create_event(creator, &mut VecDeque::new())?);
        self.consensus.process_event(event.clone())?;
        Ok(event)
    }
}

impl Deref for TestConsensus {
    type Target = Consensus;

    fn deref(&self) -> &Self::Target {
        &self.consensus
    }
}

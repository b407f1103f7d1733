use crate::processes::dagidx::EventLookup;
use galaxy_consensus_core::{
    Epoch, Hash, Timestamp, ValidatorId, Weight,
    config::params::FAKENET_RULES,
    event::{Event, EventId, MutableEvent},
    sign::{generate_keypair, pubkey_bytes, sign_event},
    state::{EpochState, ValidatorEpochState},
    validators::{ValidatorProfile, ValidatorProfiles, Validators},
};
use galaxy_database::{
    create_temp_db,
    prelude::{ConnBuilder, FlushableDb, StoreConfig},
    utils::DbLifetime,
};
use parking_lot::RwLock;
use secp256k1::Keypair;
use std::{collections::HashMap, sync::Arc};

/// A flushable overlay over a fresh temp DB. Keep the lifetime in scope while the DB is in use
pub fn new_temp_flushable() -> (DbLifetime, Arc<FlushableDb>) {
    let (lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
    (lifetime, Arc::new(FlushableDb::new(db, StoreConfig::default())))
}

fn epoch_state_of(epoch: Epoch, profiles: ValidatorProfiles) -> EpochState {
    let validators = Validators::new(profiles.iter().map(|(id, profile)| (*id, profile.weight)));
    EpochState {
        epoch,
        epoch_start: 0,
        prev_epoch_start: 0,
        epoch_state_root: Hash::ZERO,
        validator_states: vec![ValidatorEpochState::default(); validators.len()],
        validators,
        validator_profiles: profiles,
        rules: FAKENET_RULES,
    }
}

/// An epoch state with fakenet rules and no public keys
pub fn test_epoch_state(epoch: Epoch, weights: &[(ValidatorId, Weight)]) -> EpochState {
    epoch_state_of(epoch, weights.iter().map(|(id, weight)| (*id, ValidatorProfile { weight: *weight, pubkey: vec![] })).collect())
}

/// Builds signed events of a single epoch. Structural fields (seq, lamport, time) follow the
/// parents, gas fields are left zeroed unless edited
pub struct TestDag {
    epoch: Epoch,
    events: Arc<RwLock<HashMap<EventId, Arc<Event>>>>,
    keypairs: HashMap<ValidatorId, Keypair>,
    clock: Timestamp,
}

impl TestDag {
    pub fn new(epoch: Epoch) -> Self {
        Self { epoch, events: Default::default(), keypairs: HashMap::new(), clock: 1_000 }
    }

    pub fn keypair(&mut self, creator: ValidatorId) -> Keypair {
        *self.keypairs.entry(creator).or_insert_with(generate_keypair)
    }

    pub fn add(&mut self, creator: ValidatorId, parents: &[EventId]) -> Arc<Event> {
        self.add_with(creator, parents, |_| {})
    }

    /// Like [`TestDag::add`], with `edit` applied right before signing
    pub fn add_with(&mut self, creator: ValidatorId, parents: &[EventId], edit: impl FnOnce(&mut MutableEvent)) -> Arc<Event> {
        let known_parents: Vec<Arc<Event>> = {
            let events = self.events.read();
            parents.iter().filter_map(|id| events.get(id).cloned()).collect()
        };
        let seq = match known_parents.first() {
            Some(first) if first.creator == creator && first.id() == parents[0] => first.seq + 1,
            _ => 1,
        };
        let lamport = known_parents.iter().map(|p| p.lamport).max().unwrap_or(0) + 1;
        self.clock += 1;

        let mut event = MutableEvent {
            epoch: self.epoch,
            seq,
            creator,
            lamport,
            creation_time: self.clock,
            parents: parents.to_vec(),
            ..Default::default()
        };
        edit(&mut event);
        let keypair = self.keypair(creator);
        sign_event(&mut event, &keypair);

        let event = Arc::new(event.build());
        self.events.write().insert(event.id(), event.clone());
        event
    }

    pub fn get(&self, id: EventId) -> Option<Arc<Event>> {
        self.events.read().get(&id).cloned()
    }

    /// A lookup which also sees events added after it was created
    pub fn lookup(&self) -> EventLookup {
        let events = self.events.clone();
        Arc::new(move |id| events.read().get(&id).cloned())
    }

    /// An epoch state of this DAG's epoch, holding the public keys of the signing creators
    pub fn epoch_state(&mut self, weights: &[(ValidatorId, Weight)]) -> EpochState {
        let profiles = weights
            .iter()
            .map(|(id, weight)| (*id, ValidatorProfile { weight: *weight, pubkey: pubkey_bytes(&self.keypair(*id)) }))
            .collect();
        epoch_state_of(self.epoch, profiles)
    }
}

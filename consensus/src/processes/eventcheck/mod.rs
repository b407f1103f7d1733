//! Event validation pipeline. Stages run in a fixed order and the first failure aborts:
//! basic, epoch, parents, heavy (signatures) and gas power.
//!
//! Validation is lock-free. Epoch dependent data is read from atomic snapshots which the
//! block worker replaces on epoch seal

pub mod basic;
pub mod epoch;
pub mod gaspower;
pub mod heavy;
pub mod parents;

use crate::model::stores::events::EventsStoreReader;
use arc_swap::ArcSwap;
use galaxy_consensus_core::{
    Epoch, Gas, Timestamp, ValidatorId,
    config::params::Rules,
    errors::event::{EventError, EventResult},
    event::{Event, EventId},
    state::EpochState,
    validators::Validators,
};
use rayon::ThreadPool;
use std::{collections::HashMap, sync::Arc};

use self::{
    basic::{BasicCheck, BasicChecker},
    epoch::{EpochCheck, EpochChecker},
    gaspower::{GasPowerCheck, GasPowerChecker, GasPowerContext},
    heavy::{HeavyCheck, HeavyCheckContext, HeavyChecker},
    parents::{ParentsCheck, ParentsChecker},
};

/// Epoch data shared by the light checks
pub struct EpochContext {
    pub epoch: Epoch,
    pub epoch_start: Timestamp,
    pub validators: Validators,
    pub rules: Rules,
}

impl From<&EpochState> for EpochContext {
    fn from(es: &EpochState) -> Self {
        Self { epoch: es.epoch, epoch_start: es.epoch_start, validators: es.validators.clone(), rules: es.rules }
    }
}

pub struct Checkers {
    ctx: Arc<ArcSwap<EpochContext>>,
    events: Arc<dyn EventsStoreReader + Send + Sync>,

    pub basic: Box<dyn BasicCheck>,
    pub epoch: Box<dyn EpochCheck>,
    pub parents: Box<dyn ParentsCheck>,
    pub heavy: Box<dyn HeavyCheck>,
    pub gas_power: Box<dyn GasPowerCheck>,
}

impl Checkers {
    /// Builds the default checker of every stage over `es`
    pub fn new(
        es: &EpochState,
        events: Arc<dyn EventsStoreReader + Send + Sync>,
        thread_pool: Arc<ThreadPool>,
        heavy_check_batch_threshold: usize,
    ) -> Self {
        let ctx = Arc::new(ArcSwap::from_pointee(EpochContext::from(es)));
        Self {
            basic: Box::new(BasicChecker::new(ctx.clone())),
            epoch: Box::new(EpochChecker::new(ctx.clone(), events.clone())),
            parents: Box::new(ParentsChecker::new(ctx.clone())),
            heavy: Box::new(HeavyChecker::new(HeavyCheckContext::from(es), thread_pool, heavy_check_batch_threshold)),
            gas_power: Box::new(GasPowerChecker::new(GasPowerContext::from(es))),
            ctx,
            events,
        }
    }

    pub fn with_heavy(mut self, heavy: Box<dyn HeavyCheck>) -> Self {
        self.heavy = heavy;
        self
    }

    pub fn with_gas_power(mut self, gas_power: Box<dyn GasPowerCheck>) -> Self {
        self.gas_power = gas_power;
        self
    }

    /// The epoch all snapshots currently describe
    pub fn epoch(&self) -> Epoch {
        self.ctx.load().epoch
    }

    /// Replaces all snapshots with the state of a newly sealed epoch
    pub fn on_new_epoch(&self, es: &EpochState) {
        self.ctx.store(Arc::new(EpochContext::from(es)));
        self.heavy.on_new_epoch(es);
        self.gas_power.on_new_epoch(es);
    }

    pub fn available_gas_power(&self, creator: ValidatorId, time: Timestamp, self_parent: Option<&Event>) -> Gas {
        self.gas_power.available(creator, time, self_parent)
    }

    /// Runs all stages on a single event
    pub fn validate(&self, event: &Event) -> EventResult<()> {
        self.basic.validate(event)?;
        self.epoch.validate(event)?;
        let parents = self.load_parents(event, &HashMap::new())?;
        self.parents.validate(event, &parents)?;
        self.heavy.validate(event)?;
        self.gas_power.validate(event, self_parent_of(event, &parents))
    }

    /// Runs all stages on a batch. Parents may precede their children within the batch.
    /// Signatures of events which passed the light stages are verified together
    pub fn validate_batch(&self, events: &[Arc<Event>]) -> Vec<EventResult<()>> {
        let in_batch: HashMap<EventId, Arc<Event>> = events.iter().map(|e| (e.id(), e.clone())).collect();
        let mut results = Vec::with_capacity(events.len());
        let mut parents_of = Vec::with_capacity(events.len());
        for event in events.iter() {
            let light = self
                .basic
                .validate(event)
                .and_then(|_| self.epoch.validate(event))
                .and_then(|_| self.load_parents(event, &in_batch))
                .and_then(|parents| self.parents.validate(event, &parents).map(|_| parents));
            match light {
                Ok(parents) => {
                    results.push(Ok(()));
                    parents_of.push(parents);
                }
                Err(err) => {
                    results.push(Err(err));
                    parents_of.push(Vec::new());
                }
            }
        }

        let passed: Vec<usize> = (0..events.len()).filter(|&i| results[i].is_ok()).collect();
        let heavy = self.heavy.validate_batch(&passed.iter().map(|&i| events[i].clone()).collect::<Vec<_>>());
        for (i, result) in passed.into_iter().zip(heavy) {
            results[i] = result.and_then(|_| self.gas_power.validate(&events[i], self_parent_of(&events[i], &parents_of[i])));
        }
        results
    }

    fn load_parents(&self, event: &Event, in_batch: &HashMap<EventId, Arc<Event>>) -> EventResult<Vec<Arc<Event>>> {
        event
            .parents
            .iter()
            .map(|id| match in_batch.get(id) {
                Some(parent) => Ok(parent.clone()),
                None => self.events.get(*id).map_err(|_| EventError::UnknownParent(*id)),
            })
            .collect()
    }
}

fn self_parent_of<'a>(event: &Event, parents: &'a [Arc<Event>]) -> Option<&'a Event> {
    event.self_parent().and_then(|id| parents.iter().find(|p| p.id() == id)).map(|p| p.as_ref())
}

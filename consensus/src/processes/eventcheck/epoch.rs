use super::EpochContext;
use crate::model::stores::events::EventsStoreReader;
use arc_swap::ArcSwap;
use galaxy_consensus_core::{
    errors::event::{EventError, EventResult},
    event::{Event, calc_gas_power_used},
};
use std::sync::Arc;

/// Checks an event against the current epoch: epoch number, creator and gas limits
pub trait EpochCheck: Send + Sync {
    fn validate(&self, event: &Event) -> EventResult<()>;
}

pub struct EpochChecker {
    ctx: Arc<ArcSwap<EpochContext>>,
    events: Arc<dyn EventsStoreReader + Send + Sync>,
}

impl EpochChecker {
    pub fn new(ctx: Arc<ArcSwap<EpochContext>>, events: Arc<dyn EventsStoreReader + Send + Sync>) -> Self {
        Self { ctx, events }
    }
}

impl EpochCheck for EpochChecker {
    fn validate(&self, event: &Event) -> EventResult<()> {
        let ctx = self.ctx.load();
        if event.epoch != ctx.epoch {
            return Err(EventError::WrongEpoch(ctx.epoch, event.epoch));
        }
        // A store failure here is not the event's fault, let the exclusive section recheck
        if self.events.has(event.id()).unwrap_or(false) {
            return Err(EventError::AlreadyKnown(event.id()));
        }
        if !ctx.validators.exists(event.creator) {
            return Err(EventError::UnknownCreator(event.creator));
        }
        let economy = &ctx.rules.economy;
        let expected = calc_gas_power_used(event.parents.len(), event.extra.len(), &event.txs, economy);
        if event.gas_power_used != expected {
            return Err(EventError::WrongGasUsed(expected, event.gas_power_used));
        }
        if event.gas_power_used > economy.max_event_gas {
            return Err(EventError::TooBigGasUsed(event.gas_power_used, economy.max_event_gas));
        }
        Ok(())
    }
}

use arc_swap::ArcSwap;
use galaxy_consensus_core::{
    Epoch, Gas, Timestamp, ValidatorId,
    config::params::GasPowerRules,
    errors::event::{EventError, EventResult},
    event::Event,
    state::{EpochState, ValidatorEpochState},
    validators::Validators,
};
use std::sync::Arc;

const MILLIS_PER_SEC: u128 = 1000;

/// Everything needed to replay a validator's gas power from the epoch start
pub struct GasPowerContext {
    pub epoch: Epoch,
    pub epoch_start: Timestamp,
    pub validators: Validators,
    pub validator_states: Vec<ValidatorEpochState>,
    pub rules: GasPowerRules,
}

impl From<&EpochState> for GasPowerContext {
    fn from(es: &EpochState) -> Self {
        Self {
            epoch: es.epoch,
            epoch_start: es.epoch_start,
            validators: es.validators.clone(),
            validator_states: es.validator_states.clone(),
            rules: es.rules.economy.gas_power,
        }
    }
}

/// Allocation rates of a single validator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasPowerRates {
    pub per_sec: Gas,
    pub max: Gas,
    pub startup: Gas,
}

pub fn calc_gas_power_rates(creator: ValidatorId, validators: &Validators, rules: &GasPowerRules) -> GasPowerRates {
    let total = validators.total_weight();
    if total == 0 {
        return GasPowerRates { per_sec: 0, max: 0, startup: rules.min_startup_gas };
    }
    let per_sec = (rules.alloc_per_sec as u128 * validators.get_weight(creator) as u128 / total as u128) as Gas;
    let max = (per_sec as u128 * rules.max_alloc_period as u128 / MILLIS_PER_SEC) as Gas;
    let startup = ((per_sec as u128 * rules.startup_alloc_period as u128 / MILLIS_PER_SEC) as Gas).max(rules.min_startup_gas);
    GasPowerRates { per_sec, max, startup }
}

/// Gas power available to `creator` at `time`, given the previous gas power checkpoint.
/// Without a self-parent the checkpoint is raised to the startup allocation
pub fn calc_available_gas_power(
    rates: GasPowerRates,
    time: Timestamp,
    prev_time: Timestamp,
    prev_left: Gas,
    has_self_parent: bool,
) -> Gas {
    let prev_left = if has_self_parent { prev_left } else { prev_left.max(rates.startup) };
    let prev_time = prev_time.min(time);
    let allocated = ((time - prev_time) as u128 * rates.per_sec as u128 / MILLIS_PER_SEC) as Gas;
    allocated.saturating_add(prev_left).min(rates.max)
}

/// Checks that the creator had enough gas power for the event and declared the rest correctly
pub trait GasPowerCheck: Send + Sync {
    fn validate(&self, event: &Event, self_parent: Option<&Event>) -> EventResult<()>;

    /// Gas power `creator` may spend on an event created at `time` on top of `self_parent`
    fn available(&self, creator: ValidatorId, time: Timestamp, self_parent: Option<&Event>) -> Gas;

    fn on_new_epoch(&self, es: &EpochState);
}

pub struct GasPowerChecker {
    ctx: ArcSwap<GasPowerContext>,
}

impl GasPowerChecker {
    pub fn new(ctx: GasPowerContext) -> Self {
        Self { ctx: ArcSwap::from_pointee(ctx) }
    }

    fn available_with(ctx: &GasPowerContext, creator: ValidatorId, time: Timestamp, self_parent: Option<&Event>) -> Gas {
        let rates = calc_gas_power_rates(creator, &ctx.validators, &ctx.rules);
        let (prev_time, prev_left) = match self_parent {
            Some(self_parent) => (self_parent.creation_time, self_parent.gas_power_left),
            None => {
                let prev = ctx.validators.get_idx(creator).and_then(|idx| ctx.validator_states.get(idx)).map(|s| s.prev_epoch_event);
                match prev {
                    Some(prev) if prev.id != Default::default() => (prev.time, prev.gas_power_left),
                    _ => (ctx.epoch_start, 0),
                }
            }
        };
        calc_available_gas_power(rates, time, prev_time, prev_left, self_parent.is_some())
    }
}

impl GasPowerCheck for GasPowerChecker {
    fn validate(&self, event: &Event, self_parent: Option<&Event>) -> EventResult<()> {
        let ctx = self.ctx.load();
        let available = Self::available_with(&ctx, event.creator, event.creation_time, self_parent);
        if event.gas_power_used > available {
            return Err(EventError::InsufficientGasPower(event.gas_power_used, available));
        }
        let expected_left = available - event.gas_power_used;
        if event.gas_power_left != expected_left {
            return Err(EventError::WrongGasPowerLeft(expected_left, event.gas_power_left));
        }
        Ok(())
    }

    fn available(&self, creator: ValidatorId, time: Timestamp, self_parent: Option<&Event>) -> Gas {
        Self::available_with(&self.ctx.load(), creator, time, self_parent)
    }

    fn on_new_epoch(&self, es: &EpochState) {
        self.ctx.store(Arc::new(GasPowerContext::from(es)));
    }
}

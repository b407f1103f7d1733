use galaxy_consensus_core::{
    Epoch, ValidatorId,
    errors::event::{EventError, EventResult},
    event::Event,
    sign::{parse_pubkey, verify_hash},
    state::EpochState,
};
use galaxy_core::warn;
use arc_swap::ArcSwap;
use rayon::{ThreadPool, prelude::*};
use secp256k1::XOnlyPublicKey;
use std::{collections::HashMap, sync::Arc};

/// Public keys of the epoch validators
#[derive(Default)]
pub struct HeavyCheckContext {
    pub epoch: Epoch,
    pub pubkeys: HashMap<ValidatorId, XOnlyPublicKey>,
}

impl From<&EpochState> for HeavyCheckContext {
    fn from(es: &EpochState) -> Self {
        let pubkeys = es
            .validator_profiles
            .iter()
            .filter_map(|(id, profile)| match parse_pubkey(&profile.pubkey) {
                Ok(pubkey) => Some((*id, pubkey)),
                Err(err) => {
                    warn!("Validator {} has an invalid public key: {}", id, err);
                    None
                }
            })
            .collect();
        Self { epoch: es.epoch, pubkeys }
    }
}

/// Signature verification
pub trait HeavyCheck: Send + Sync {
    fn validate(&self, event: &Event) -> EventResult<()>;

    /// Verifies a batch. The result at position `i` belongs to `events[i]`
    fn validate_batch(&self, events: &[Arc<Event>]) -> Vec<EventResult<()>> {
        events.iter().map(|e| self.validate(e)).collect()
    }

    fn on_new_epoch(&self, es: &EpochState);
}

pub struct HeavyChecker {
    ctx: ArcSwap<HeavyCheckContext>,
    thread_pool: Arc<ThreadPool>,
    batch_threshold: usize,
}

impl HeavyChecker {
    pub fn new(ctx: HeavyCheckContext, thread_pool: Arc<ThreadPool>, batch_threshold: usize) -> Self {
        Self { ctx: ArcSwap::from_pointee(ctx), thread_pool, batch_threshold }
    }

    fn validate_with(ctx: &HeavyCheckContext, event: &Event) -> EventResult<()> {
        let pubkey = ctx.pubkeys.get(&event.creator).ok_or(EventError::MissingPubkey(event.creator))?;
        verify_hash(event.signing_hash(), &event.signature, pubkey).map_err(|_| EventError::WrongSignature(event.id()))
    }
}

impl HeavyCheck for HeavyChecker {
    fn validate(&self, event: &Event) -> EventResult<()> {
        Self::validate_with(&self.ctx.load(), event)
    }

    fn validate_batch(&self, events: &[Arc<Event>]) -> Vec<EventResult<()>> {
        // Both paths use one snapshot so a batch never mixes keys of two epochs
        let ctx = self.ctx.load_full();
        if events.len() <= self.batch_threshold {
            return events.iter().map(|e| Self::validate_with(&ctx, e)).collect();
        }
        self.thread_pool.install(|| events.par_iter().map(|e| Self::validate_with(&ctx, e)).collect())
    }

    fn on_new_epoch(&self, es: &EpochState) {
        self.ctx.store(Arc::new(HeavyCheckContext::from(es)));
    }
}

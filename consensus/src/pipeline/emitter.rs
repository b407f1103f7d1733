use crate::{
    consensus::Consensus,
    errors::{ConsensusError, ConsensusResult},
};
use crossbeam_channel::{Receiver, Sender, select, tick, unbounded};
use galaxy_consensus_core::{
    ValidatorId,
    event::EventId,
    sign::sign_event,
    tx::Transaction,
};
use galaxy_core::{debug, trace, warn};
use parking_lot::Mutex;
use secp256k1::Keypair;
use std::{
    collections::VecDeque,
    sync::Arc,
    time::Duration,
};

/// Transactions waiting to be included into an event of the local validator
#[derive(Default)]
pub struct TxPool {
    txs: Mutex<VecDeque<Transaction>>,
}

impl TxPool {
    pub fn add(&self, tx: Transaction) {
        self.txs.lock().push_back(tx);
    }

    pub fn len(&self) -> usize {
        self.txs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.lock().is_empty()
    }
}

/// Periodically creates, signs and submits events of a single local validator
pub struct Emitter {
    creator: ValidatorId,
    keypair: Keypair,
    pool: Arc<TxPool>,
    interval: Duration,
    quit_sender: Sender<()>,
    quit_receiver: Receiver<()>,
}

impl Emitter {
    pub fn new(creator: ValidatorId, keypair: Keypair, interval: Duration) -> Self {
        let (quit_sender, quit_receiver) = unbounded();
        Self { creator, keypair, pool: Default::default(), interval, quit_sender, quit_receiver }
    }

    pub fn creator(&self) -> ValidatorId {
        self.creator
    }

    pub fn pool(&self) -> &Arc<TxPool> {
        &self.pool
    }

    pub fn worker(self: &Arc<Self>, consensus: Arc<Consensus>) {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(ticker) -> _ => {
                    match self.emit(&consensus) {
                        Ok(id) => trace!("Validator {} emitted {}", self.creator, id),
                        Err(ConsensusError::Rejected(err)) if err.is_resource_exhaustion() => {
                            debug!("Validator {} is out of gas power: {}", self.creator, err)
                        }
                        Err(ConsensusError::ShuttingDown) => break,
                        Err(err) => warn!("Validator {} failed to emit: {}", self.creator, err),
                    }
                }
                recv(self.quit_receiver) -> _ => break,
            }
        }
        trace!("emitter of validator {} exiting", self.creator);
    }

    /// Builds an event on top of the latest known heads and submits it
    pub fn emit(&self, consensus: &Consensus) -> ConsensusResult<EventId> {
        let mut event = {
            let mut pending = self.pool.txs.lock();
            consensus.create_event(self.creator, &mut pending)?
        };
        sign_event(&mut event, &self.keypair);
        let event = Arc::new(event.build());
        consensus.process_event(event.clone())?;
        Ok(event.id())
    }

    pub fn signal_exit(&self) {
        let _ = self.quit_sender.send(());
    }
}

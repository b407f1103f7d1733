use crate::service::Service;
use crate::{info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owns the set of running services and drives their lifecycle
pub struct Core {
    keep_running: AtomicBool,
    services: Mutex<Vec<Arc<dyn Service>>>,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    pub fn new() -> Core {
        Core { keep_running: AtomicBool::new(true), services: Mutex::new(Vec::new()) }
    }

    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::SeqCst)
    }

    pub fn bind<T: Service + 'static>(&self, service: Arc<T>) {
        self.services.lock().push(service);
    }

    /// Stops all services in reverse bind order. Calling it more than once has no effect
    pub fn shutdown(self: &Arc<Core>) {
        if !self.keep_running.swap(false, Ordering::SeqCst) {
            return;
        }
        trace!("signaling core shutdown...");
        let services = self.services.lock().clone();
        for service in services.into_iter().rev() {
            let ident = service.clone().ident();
            trace!("shutting down: {}", ident);
            service.stop();
        }
        trace!("core is shutting down...");
    }

    /// Starts all services and blocks until every worker thread exits
    pub fn run(self: &Arc<Core>) {
        let services = self.services.lock().clone();
        let workers = services.into_iter().flat_map(|service| service.start(self.clone())).collect::<Vec<_>>();
        info!("core is starting {} workers", workers.len());

        for worker in workers {
            if let Err(err) = worker.join() {
                warn!("thread join failure: {:?}", err);
            }
        }
        trace!("... core is shut down");
    }
}

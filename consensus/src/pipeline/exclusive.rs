use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// Marks a task handed to another thread as in flight. The task is done once the guard drops
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.in_flight.count.lock();
        *count -= 1;
        if *count == 0 {
            self.in_flight.idle.notify_all();
        }
    }
}

/// Serializes all mutations of `T`. Access is granted only once every task registered by an
/// earlier holder has completed, so a holder always observes the effects of all previous tasks
pub struct ExclusiveAccess<T> {
    state: Mutex<T>,
    in_flight: Arc<InFlight>,
}

/// The state under exclusive access, along with the ability to register in-flight tasks
pub struct ExclusiveCtx<'a, T> {
    pub state: &'a mut T,
    in_flight: &'a Arc<InFlight>,
}

impl<T> ExclusiveCtx<'_, T> {
    pub fn register_task(&self) -> InFlightGuard {
        *self.in_flight.count.lock() += 1;
        InFlightGuard { in_flight: self.in_flight.clone() }
    }
}

impl<T> ExclusiveAccess<T> {
    pub fn new(state: T) -> Self {
        Self { state: Mutex::new(state), in_flight: Default::default() }
    }

    /// Runs `f` under exclusive access. Blocks until all in-flight tasks are done
    pub fn run<R>(&self, f: impl FnOnce(&mut ExclusiveCtx<T>) -> R) -> R {
        let mut state = self.state.lock();
        self.in_flight.wait_idle();
        f(&mut ExclusiveCtx { state: &mut state, in_flight: &self.in_flight })
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };

    #[test]
    fn test_run_waits_for_in_flight_tasks() {
        let access = Arc::new(ExclusiveAccess::new(0u32));
        let done = Arc::new(AtomicBool::new(false));

        let guard = access.run(|ctx| {
            *ctx.state += 1;
            ctx.register_task()
        });
        assert_eq!(access.in_flight(), 1);

        let worker = {
            let done = done.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                done.store(true, Ordering::SeqCst);
                drop(guard);
            })
        };

        // Must not enter before the task above is done
        let observed = access.run(|ctx| {
            *ctx.state += 1;
            done.load(Ordering::SeqCst)
        });
        assert!(observed);
        assert_eq!(access.in_flight(), 0);
        assert_eq!(access.run(|ctx| *ctx.state), 2);
        worker.join().unwrap();
    }

    #[test]
    fn test_dropped_guards_never_block() {
        let access = ExclusiveAccess::new(());
        access.run(|ctx| {
            let guards = (0..4).map(|_| ctx.register_task()).collect::<Vec<_>>();
            drop(guards);
        });
        access.run(|_| {});
        assert_eq!(access.in_flight(), 0);
    }
}

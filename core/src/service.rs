use crate::core::Core;
use std::{sync::Arc, thread::JoinHandle};

/// A long running component owning one or more worker threads
pub trait Service: Send + Sync {
    fn ident(self: Arc<Self>) -> &'static str;

    /// Spawns the service workers. The returned handles are joined by [`Core::run`]
    fn start(self: Arc<Self>, core: Arc<Core>) -> Vec<JoinHandle<()>>;

    /// Signals the service to exit. Must not join the handles returned by `start`
    fn stop(self: Arc<Self>);
}

use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender, unbounded};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Urgency of work queued onto the render thread.
pub enum DispatchPriority {
    /// Run at the next pump, ahead of any deferred work.
    Normal,
    /// Deferred housekeeping, e.g. releasing detached GPU surfaces.
    Low,
}

struct DispatcherShared {
    owner: ThreadId,
    normal_tx: Sender<Job>,
    normal_rx: Receiver<Job>,
    low_tx: Sender<Job>,
    low_rx: Receiver<Job>,
}

#[derive(Clone)]
/// Cooperative executor bound to the single thread that owns GPU resources.
///
/// The render thread creates the dispatcher; clones may travel to any thread
/// and queue work back onto the owner, which drains it by pumping
/// [`run_pending`](Self::run_pending) between frames. There is no preemption:
/// queued work only ever runs inside the pump.
pub struct RenderDispatcher {
    shared: Arc<DispatcherShared>,
}

impl RenderDispatcher {
    /// Bind a dispatcher to the calling thread.
    pub fn new() -> Self {
        let (normal_tx, normal_rx) = unbounded();
        let (low_tx, low_rx) = unbounded();
        Self {
            shared: Arc::new(DispatcherShared {
                owner: thread::current().id(),
                normal_tx,
                normal_rx,
                low_tx,
                low_rx,
            }),
        }
    }

    /// True when the calling thread is the owning thread.
    pub fn check_access(&self) -> bool {
        thread::current().id() == self.shared.owner
    }

    /// Panic unless called from the owning thread.
    pub fn verify_access(&self) {
        assert!(
            self.check_access(),
            "GPU-owning state touched off the render thread"
        );
    }

    /// Queue `job` to run on the owning thread at the given priority.
    ///
    /// Callable from any thread.
    pub fn dispatch(&self, priority: DispatchPriority, job: impl FnOnce() + Send + 'static) {
        let tx = match priority {
            DispatchPriority::Normal => &self.shared.normal_tx,
            DispatchPriority::Low => &self.shared.low_tx,
        };
        // Both receiver halves live inside `shared`, so the send cannot fail.
        let _ = tx.send(Box::new(job));
    }

    /// Run queued jobs until both queues are empty, normal before low.
    ///
    /// Must be called from the owning thread.
    pub fn run_pending(&self) {
        self.verify_access();
        while let Ok(job) = self.shared.normal_rx.try_recv() {
            job();
        }
        while let Ok(job) = self.shared.low_rx.try_recv() {
            job();
        }
    }
}

impl Default for RenderDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/threading/dispatcher.rs"]
mod tests;

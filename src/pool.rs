use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A growable, never-shrinking pool of OS threads (spec §5: "The pool is grown when fewer than
/// the required idle workers exist; it is never shrunk. Pool workers outlive a single failover
/// call.").
///
/// Grounded on the original's `ctpl::thread_pool`: `ensure_idle` is the Rust analogue of
/// `thread_pool.resize(...)` calls scattered through `get_connection_from_hosts`/`failover`.
pub struct FailoverPool {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    size: AtomicUsize,
    idle: AtomicUsize,
}

impl FailoverPool {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Arc::new(FailoverPool {
            sender,
            receiver,
            size: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    pub fn n_idle(&self) -> usize {
        self.idle.load(Ordering::SeqCst)
    }

    /// Grows the pool, if needed, so at least `needed_idle` workers are idle. Never shrinks an
    /// existing pool.
    pub fn ensure_idle(self: &Arc<Self>, needed_idle: usize) {
        let deficit = needed_idle.saturating_sub(self.n_idle());
        for _ in 0..deficit {
            self.spawn_worker();
        }
    }

    fn spawn_worker(self: &Arc<Self>) {
        let receiver = self.receiver.clone();
        let pool = Arc::clone(self);
        pool.size.fetch_add(1, Ordering::SeqCst);
        pool.idle.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new()
            .name("failover-pool-worker".into())
            .spawn(move || {
                for job in receiver.iter() {
                    pool.idle.fetch_sub(1, Ordering::SeqCst);
                    job();
                    pool.idle.fetch_add(1, Ordering::SeqCst);
                }
            })
            .expect("failed to spawn failover pool worker");
    }

    /// Submits a job. Panics (via a disconnected channel) only once every worker has been
    /// dropped along with the pool — in practice the pool outlives every caller.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        self.sender
            .send(Box::new(job))
            .expect("failover pool workers are gone");
    }
}

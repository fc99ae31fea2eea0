use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StreamError;
use crate::worker::{WorkerHandle, WorkerId};

/// Something the registry can stop during teardown
pub trait Terminate {
    fn terminate(&self) -> Result<(), StreamError>;
}

impl Terminate for WorkerHandle {
    fn terminate(&self) -> Result<(), StreamError> {
        WorkerHandle::terminate(self);
        Ok(())
    }
}

/// The live workers of one log view.
///
/// Workers add themselves when started and remove themselves from their own
/// task when they end, so every access goes through the lock.
pub struct StreamRegistry<W = WorkerHandle> {
    workers: Arc<Mutex<HashMap<WorkerId, W>>>,
}

impl<W> Clone for StreamRegistry<W> {
    fn clone(&self) -> Self {
        Self {
            workers: Arc::clone(&self.workers),
        }
    }
}

impl<W> Default for StreamRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> StreamRegistry<W> {
    pub fn new() -> Self {
        Self {
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn insert(&self, id: WorkerId, worker: W) {
        self.workers.lock().insert(id, worker);
    }

    /// Remove a worker; removing an unknown or already removed id is a no-op
    pub fn remove(&self, id: WorkerId) -> Option<W> {
        self.workers.lock().remove(&id)
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.workers.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.lock().is_empty()
    }
}

impl<W: Terminate> StreamRegistry<W> {
    /// Empty the registry and terminate every worker that was in it.
    ///
    /// Failures are logged and skipped so one stuck worker cannot keep the
    /// rest alive. Returns how many workers were asked to stop.
    pub fn terminate_all(&self) -> usize {
        let workers: Vec<(WorkerId, W)> = self.workers.lock().drain().collect();
        let count = workers.len();

        for (id, worker) in workers {
            match worker.terminate() {
                Ok(()) => debug!(worker = %id, "terminated during teardown"),
                Err(e) => warn!(worker = %id, error = %e, "failed to terminate log stream"),
            }
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeWorker {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Terminate for FakeWorker {
        fn terminate(&self) -> Result<(), StreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StreamError::Terminate("process handle gone".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_terminate_all_survives_a_failing_worker() {
        let registry = StreamRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for i in 0..5 {
            registry.insert(
                WorkerId::next(),
                FakeWorker {
                    calls: Arc::clone(&calls),
                    fail: i == 2,
                },
            );
        }

        assert_eq!(registry.terminate_all(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry: StreamRegistry<()> = StreamRegistry::new();
        let id = WorkerId::next();
        registry.insert(id, ());

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry: StreamRegistry<()> = StreamRegistry::new();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let id = WorkerId::next();
                        registry.insert(id, ());
                        registry.remove(id);
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}

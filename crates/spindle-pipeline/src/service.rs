//! `Service<S>`: a generic worker pool around one pipeline [`Stage`].
//!
//! `queue()` is a non-blocking send into an unbounded `mpsc` channel,
//! `start()` spawns a configurable number of worker tasks pulling from that
//! channel, and `finished`/`failed` are `broadcast` channels any number of
//! listeners (the pipeline wiring, a progress reporter, a test) can
//! subscribe to.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::error::StageError;
use crate::job::Job;
use spindle_requirement::Requirement;

/// A dependency discovered while processing a job, emitted by the
/// Dependencer stage alongside (not instead of) its terminal `finished`
/// event: one `dependency_found` event per child, plus a final `finished`
/// for the wheel itself.
#[derive(Debug, Clone)]
pub struct DependencyFound {
    pub child: Requirement,
    pub dependency_of: Requirement,
}

/// A side channel a [`Stage`] can use to emit events beyond its single
/// `Ok`/`Err` return value. Only the Dependencer stage uses it today; it's
/// threaded through every stage so a future stage needing the same shape
/// doesn't require a `Service` API change.
#[derive(Clone)]
pub struct ExtraSink {
    dependency_found: broadcast::Sender<DependencyFound>,
}

impl ExtraSink {
    pub fn dependency_found(&self, child: Requirement, dependency_of: Requirement) {
        let _ = self.dependency_found.send(DependencyFound { child, dependency_of });
    }
}

/// One pipeline stage's processing logic. Implementations wrap a single
/// external collaborator (`UpstreamIndex`, `Transport`, `Builder`, ...).
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn process(&self, job: Job, extra: &ExtraSink) -> Result<Job, (Job, StageError)>;
}

/// Worker pool around a single [`Stage`]. Jobs queued before `start()` is
/// called are not lost — they sit in the unbounded channel until a worker
/// drains them.
pub struct Service<S: Stage> {
    stage: Arc<S>,
    sender: mpsc::UnboundedSender<Job>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    finished_tx: broadcast::Sender<Job>,
    failed_tx: broadcast::Sender<(Job, StageError)>,
    dependency_found_tx: broadcast::Sender<DependencyFound>,
    workers: usize,
    started: Arc<AtomicBool>,
    admitted: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

impl<S: Stage> Service<S> {
    pub fn new(stage: S) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (finished_tx, _) = broadcast::channel(1024);
        let (failed_tx, _) = broadcast::channel(1024);
        let (dependency_found_tx, _) = broadcast::channel(1024);
        Service {
            stage: Arc::new(stage),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            finished_tx,
            failed_tx,
            dependency_found_tx,
            workers: 1,
            started: Arc::new(AtomicBool::new(false)),
            admitted: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn name(&self) -> &'static str {
        self.stage.name()
    }

    pub fn queue(&self, job: Job) {
        self.admitted.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).is_err() {
            tracing::error!(stage = self.stage.name(), "queue() after all workers dropped");
        }
    }

    pub fn subscribe_finished(&self) -> broadcast::Receiver<Job> {
        self.finished_tx.subscribe()
    }

    pub fn subscribe_failed(&self) -> broadcast::Receiver<(Job, StageError)> {
        self.failed_tx.subscribe()
    }

    pub fn subscribe_dependency_found(&self) -> broadcast::Receiver<DependencyFound> {
        self.dependency_found_tx.subscribe()
    }

    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Spawn the worker pool. Idempotent: a second call is a no-op, so
    /// pipeline wiring code can call it unconditionally on every service it
    /// touches without worrying about call order.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        for worker in 0..self.workers {
            let service = Arc::clone(self);
            tokio::spawn(async move {
                service.run_worker(worker).await;
            });
        }
    }

    async fn run_worker(&self, worker: usize) {
        let extra = ExtraSink {
            dependency_found: self.dependency_found_tx.clone(),
        };
        loop {
            let job = {
                let mut receiver = self.receiver.lock().await;
                receiver.recv().await
            };
            let Some(job) = job else {
                break;
            };
            tracing::debug!(stage = self.stage.name(), worker, requirement = %job.requirement, "processing");
            match self.stage.process(job, &extra).await {
                Ok(job) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    let _ = self.finished_tx.send(job);
                }
                Err((job, err)) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    let _ = self.failed_tx.send((job, err));
                }
            }
        }
    }
}

//! Command dispatcher: the single consumer of the task queue
//!
//! Every frame that reaches the board goes through this loop. Tasks are
//! taken one at a time and each send is paired with its receive before the
//! next task is looked at; the wire carries no sequence number, so that
//! pairing is the only thing tying a response to its context.

use super::task::{task_queue, Task, TaskReceiver, TaskSender};
use crate::connection::ConnectionManager;
use crate::error::LinkError;
use crate::events::{EventSender, LinkEvent};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// How long the loop waits on an empty queue before re-checking its flag
const QUEUE_POLL: Duration = Duration::from_millis(100);

/// Snapshot of the dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Tasks taken off the queue
    pub dispatched: u64,
    pub responses: u64,
    pub timeouts: u64,
    /// Send/receive failures other than timeouts
    pub failures: u64,
    /// Tasks dropped because no connection was open
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    responses: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

pub struct CommandDispatcher {
    connection: Arc<ConnectionManager>,
    event_tx: EventSender,
    tx: TaskSender,
    rx: Mutex<Option<TaskReceiver>>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CommandDispatcher {
    pub fn new(connection: Arc<ConnectionManager>, event_tx: EventSender) -> Self {
        let (tx, rx) = task_queue();
        Self {
            connection,
            event_tx,
            tx,
            rx: Mutex::new(Some(rx)),
            running: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            task: Mutex::new(None),
        }
    }

    /// Queue a task; never blocks
    ///
    /// Tasks submitted after `stop()` are refused and handed back.
    pub fn submit(&self, task: Task) -> Result<(), Task> {
        self.tx.submit(task)
    }

    /// A producer handle for other schedulers (poller, UI)
    pub fn sender(&self) -> TaskSender {
        self.tx.clone()
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the dispatch loop
    ///
    /// The loop can only be started once; returns false on later calls.
    pub async fn start(&self) -> bool {
        let Some(mut rx) = self.rx.lock().await.take() else {
            warn!("[DISPATCH] Dispatcher already started");
            return false;
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let connection = self.connection.clone();
        let event_tx = self.event_tx.clone();
        let counters = self.counters.clone();

        let handle = tokio::spawn(async move {
            info!("[DISPATCH] Loop started");
            while running.load(Ordering::SeqCst) {
                let task = match timeout(QUEUE_POLL, rx.recv()).await {
                    Ok(Some(task)) => task,
                    Ok(None) => break,
                    Err(_) => continue,
                };
                dispatch(&connection, &event_tx, &counters, task).await;
            }
            // Refuse anything queued after this point
            rx.close();
            info!("[DISPATCH] Loop stopped");
        });

        *self.task.lock().await = Some(handle);
        true
    }

    /// Stop the loop after its current exchange, then disconnect
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("[DISPATCH] Loop task ended abnormally: {}", e);
            }
        }
        self.connection.disconnect().await;

        let stats = self.stats();
        info!(
            "[DISPATCH] dispatched={} responses={} timeouts={} failures={} rejected={}",
            stats.dispatched, stats.responses, stats.timeouts, stats.failures, stats.rejected
        );
    }
}

async fn dispatch(
    connection: &ConnectionManager,
    event_tx: &EventSender,
    counters: &Counters,
    task: Task,
) {
    let (frame, context) = task.into_parts();
    let kind = context.as_ref().map_or("raw", |c| c.kind());
    counters.dispatched.fetch_add(1, Ordering::Relaxed);

    let event = match connection.exchange(&frame).await {
        Ok(response) => {
            debug!("[DISPATCH] {} answered with {} bytes", kind, response.len());
            counters.responses.fetch_add(1, Ordering::Relaxed);
            LinkEvent::ResponseReceived { response, context }
        }
        Err(error) => {
            match &error {
                LinkError::NotConnected => {
                    counters.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!("[DISPATCH] Dropped {} task: {}", kind, error);
                }
                LinkError::Timeout(_) => {
                    counters.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!("[DISPATCH] {} task: {}", kind, error);
                }
                _ => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    error!("[DISPATCH] {} task: {}", kind, error);
                }
            }
            LinkEvent::TaskFailed { error, context }
        }
    };

    let _ = event_tx.send(event);
}

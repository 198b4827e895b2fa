//! Status Poller
//!
//! Runs a background ticker that queues the two broadcast status queries
//! each cycle. It never touches the socket itself; the dispatcher does.

use crate::command::{requests, TaskSender};
use crate::connection::ConnectionManager;
use crate::events::{EventSender, LinkEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Elapsed time as `HH:MM:SS`; hours keep counting past 24
pub fn format_runtime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub struct StatusPoller {
    connection: Arc<ConnectionManager>,
    tasks: TaskSender,
    event_tx: EventSender,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(
        connection: Arc<ConnectionManager>,
        tasks: TaskSender,
        event_tx: EventSender,
        interval: Duration,
    ) -> Self {
        Self {
            connection,
            tasks,
            event_tx,
            // A zero period panics the ticker
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// One polling cycle; returns how many tasks were queued
    ///
    /// Queues nothing while disconnected.
    pub async fn poll_once(&self, started: Instant) -> usize {
        if !self.connection.is_connected().await {
            debug!("[POLL] Not connected, skipping cycle");
            return 0;
        }

        let mut queued = 0;
        for task in [requests::query_temperature(), requests::query_voltage()] {
            let kind = task.context().map_or("raw", |c| c.kind());
            if self.tasks.submit(task).is_err() {
                warn!("[POLL] Dispatcher gone, could not queue {} query", kind);
                let _ = self.event_tx.send(LinkEvent::StatusError {
                    reason: format!("dispatcher queue closed ({} query)", kind),
                });
                return queued;
            }
            queued += 1;
        }

        let runtime = format_runtime(started.elapsed());
        let _ = self.event_tx.send(LinkEvent::StatusUpdated { runtime });
        queued
    }

    /// Start the polling background task
    pub fn start(self) -> PollerHandle {
        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());

        let task = {
            let running = running.clone();
            let wake = wake.clone();
            tokio::spawn(async move {
                info!("[POLL] Started, interval {:?}", self.interval);
                let started = Instant::now();
                let mut ticker = interval(self.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = wake.notified() => {}
                    }

                    if !running.load(Ordering::SeqCst) {
                        break;
                    }

                    self.poll_once(started).await;
                }

                info!("[POLL] Stopped");
            })
        };

        PollerHandle {
            running,
            wake,
            task: Some(task),
        }
    }
}

/// Handle to stop polling
pub struct PollerHandle {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop polling and wait for the current cycle to finish
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("[POLL] Task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{task_queue, TaskContext, TaskReceiver};
    use crate::config::NetworkConfig;
    use crate::events::{event_channel, EventReceiver};
    use mock_board::MockBoard;

    fn contexts(rx: &mut TaskReceiver) -> Vec<Option<TaskContext>> {
        let mut out = Vec::new();
        while let Ok(task) = rx.try_recv() {
            out.push(task.context().cloned());
        }
        out
    }

    fn runtimes(rx: &mut EventReceiver) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LinkEvent::StatusUpdated { runtime } = event {
                out.push(runtime);
            }
        }
        out
    }

    #[test]
    fn test_format_runtime() {
        assert_eq!(format_runtime(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_runtime(Duration::from_millis(61_900)), "00:01:01");
        assert_eq!(format_runtime(Duration::from_secs(3 * 3600 + 25 * 60 + 7)), "03:25:07");
        assert_eq!(format_runtime(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[tokio::test]
    async fn test_cycle_queues_two_tasks_when_connected() {
        let board = MockBoard::bind("127.0.0.1:0").await.unwrap().spawn();
        let (event_tx, mut events) = event_channel();
        let connection = Arc::new(ConnectionManager::new(NetworkConfig::default(), event_tx.clone()));
        connection.connect("127.0.0.1", board.port()).await.unwrap();

        let (tasks, mut queue) = task_queue();
        let poller = StatusPoller::new(connection, tasks, event_tx, Duration::from_secs(1));

        assert_eq!(poller.poll_once(Instant::now()).await, 2);
        assert_eq!(
            contexts(&mut queue),
            vec![Some(TaskContext::Temperature), Some(TaskContext::Voltage)]
        );
        assert_eq!(runtimes(&mut events), vec!["00:00:00".to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_queues_nothing_when_disconnected() {
        let (event_tx, mut events) = event_channel();
        let connection = Arc::new(ConnectionManager::new(NetworkConfig::default(), event_tx.clone()));
        let (tasks, mut queue) = task_queue();
        let poller = StatusPoller::new(connection, tasks, event_tx, Duration::from_secs(1));

        assert_eq!(poller.poll_once(Instant::now()).await, 0);
        assert!(contexts(&mut queue).is_empty());
        assert!(runtimes(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_reports_status_error() {
        let board = MockBoard::bind("127.0.0.1:0").await.unwrap().spawn();
        let (event_tx, mut events) = event_channel();
        let connection = Arc::new(ConnectionManager::new(NetworkConfig::default(), event_tx.clone()));
        connection.connect("127.0.0.1", board.port()).await.unwrap();

        let (tasks, queue) = task_queue();
        drop(queue);
        let poller = StatusPoller::new(connection, tasks, event_tx, Duration::from_secs(1));
        assert_eq!(poller.poll_once(Instant::now()).await, 0);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let LinkEvent::StatusError { reason } = event {
                assert!(reason.contains("temperature"));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_zero_interval_still_polls() {
        let board = MockBoard::bind("127.0.0.1:0").await.unwrap().spawn();
        let (event_tx, _events) = event_channel();
        let connection = Arc::new(ConnectionManager::new(NetworkConfig::default(), event_tx.clone()));
        connection.connect("127.0.0.1", board.port()).await.unwrap();

        let (tasks, mut queue) = task_queue();
        let handle = StatusPoller::new(connection, tasks, event_tx, Duration::ZERO).start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(handle.is_running());
        handle.stop().await;

        assert!(!contexts(&mut queue).is_empty());
    }

    #[tokio::test]
    async fn test_background_loop_and_stop() {
        let board = MockBoard::bind("127.0.0.1:0").await.unwrap().spawn();
        let (event_tx, _events) = event_channel();
        let connection = Arc::new(ConnectionManager::new(NetworkConfig::default(), event_tx.clone()));
        connection.connect("127.0.0.1", board.port()).await.unwrap();

        let (tasks, mut queue) = task_queue();
        let handle = StatusPoller::new(connection, tasks, event_tx, Duration::from_millis(50)).start();
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_millis(180)).await;
        handle.stop().await;

        let queued = contexts(&mut queue);
        assert!(queued.len() >= 4, "expected at least two cycles, got {}", queued.len());
        assert_eq!(queued.len() % 2, 0);

        // Nothing more arrives once stopped
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(contexts(&mut queue).is_empty());
    }
}

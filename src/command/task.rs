//! Units of work queued for the dispatcher

use bytes::Bytes;
use tokio::sync::mpsc;

/// How the response to a task should be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskContext {
    /// Output current applied to a board channel
    CurrentSetting { address: u8, value: u8 },
    /// SCR register read
    ReadScr { address: u8 },
    /// SCR register write
    WriteScr { address: u8, value: u8 },
    /// Broadcast temperature query
    Temperature,
    /// Broadcast voltage query
    Voltage,
    /// Board uptime query
    Runtime { address: u8 },
    /// Operator supplied bytes, reported without interpretation
    Custom { label: String },
}

impl TaskContext {
    /// Short tag used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            TaskContext::CurrentSetting { .. } => "current_setting",
            TaskContext::ReadScr { .. } => "read_scr",
            TaskContext::WriteScr { .. } => "write_scr",
            TaskContext::Temperature => "temperature",
            TaskContext::Voltage => "voltage",
            TaskContext::Runtime { .. } => "runtime",
            TaskContext::Custom { .. } => "custom_data",
        }
    }
}

/// A frame paired with the context of its eventual response
///
/// Immutable once built; the dispatcher hands the context back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    frame: Bytes,
    context: Option<TaskContext>,
}

impl Task {
    pub fn new(frame: impl Into<Bytes>, context: Option<TaskContext>) -> Self {
        Self {
            frame: frame.into(),
            context,
        }
    }

    pub fn frame(&self) -> &Bytes {
        &self.frame
    }

    pub fn context(&self) -> Option<&TaskContext> {
        self.context.as_ref()
    }

    pub fn into_parts(self) -> (Bytes, Option<TaskContext>) {
        (self.frame, self.context)
    }
}

/// Producer side of the dispatcher queue; cheap to clone
#[derive(Debug, Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskSender {
    /// Enqueue a task without blocking
    ///
    /// Gives the task back if the dispatcher is gone.
    pub fn submit(&self, task: Task) -> Result<(), Task> {
        self.tx.send(task).map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub type TaskReceiver = mpsc::UnboundedReceiver<Task>;

/// Create an unbounded many-producer, single-consumer task queue
pub fn task_queue() -> (TaskSender, TaskReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TaskSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_kind() {
        assert_eq!(TaskContext::ReadScr { address: 2 }.kind(), "read_scr");
        assert_eq!(TaskContext::Voltage.kind(), "voltage");
        assert_eq!(
            TaskContext::Custom {
                label: "AA BB".into()
            }
            .kind(),
            "custom_data"
        );
    }

    #[tokio::test]
    async fn test_queue_is_fifo_across_producers() {
        let (tx, mut rx) = task_queue();
        let producers: Vec<_> = (0..4u8)
            .map(|p| {
                let tx = tx.clone();
                tokio::spawn(async move {
                    for i in 0..25u8 {
                        let ctx = TaskContext::WriteScr {
                            address: p,
                            value: i,
                        };
                        tx.submit(Task::new(vec![p, i], Some(ctx))).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.await.unwrap();
        }

        // Per-producer order survives interleaving
        let mut last = [None::<u8>; 4];
        let mut count = 0;
        while let Ok(task) = rx.try_recv() {
            let Some(TaskContext::WriteScr { address, value }) = task.context().cloned() else {
                panic!("unexpected context");
            };
            assert_eq!(&task.frame()[..], &[address, value]);
            if let Some(prev) = last[address as usize] {
                assert!(value > prev);
            }
            last[address as usize] = Some(value);
            count += 1;
        }
        assert_eq!(count, 100);
    }

    #[test]
    fn test_submit_after_close_returns_task() {
        let (tx, rx) = task_queue();
        drop(rx);
        assert!(tx.is_closed());
        let task = Task::new(vec![0xAA], None);
        assert_eq!(tx.submit(task.clone()), Err(task));
    }
}

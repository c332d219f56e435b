//! Single-slot background execution.
//!
//! Swaps take long enough to freeze an interactive thread, so the GUI
//! hands them to a worker and polls for the outcome. The slot holds at
//! most one task: submitting while one is in flight is rejected with
//! [`Error::Busy`], there is no queue and no cancellation, and a finished
//! result is delivered exactly once.

use std::sync::mpsc;
use std::thread;

use log::{debug, info};

use crate::error::Error;

enum Message<T> {
    NewTask(Box<dyn FnOnce() -> crate::Result<T> + Send>),
    Terminate,
}

/// Where the slot currently stands. `Done` and `Failed` are handed out
/// once; afterwards the slot reads `Idle` again.
#[derive(Debug)]
pub enum TaskState<T> {
    Idle,
    Running,
    Done(T),
    Failed(Error),
}

/// A worker thread executing one fallible task at a time.
pub struct TaskSlot<T: Send + 'static> {
    sender: mpsc::Sender<Message<T>>,
    results: mpsc::Receiver<crate::Result<T>>,
    worker: Option<thread::JoinHandle<()>>,
    running: bool,
}

impl<T: Send + 'static> TaskSlot<T> {
    pub fn new(name: &str) -> crate::Result<Self> {
        let (sender, tasks) = mpsc::channel::<Message<T>>();
        let (result_sender, results) = mpsc::channel();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(message) = tasks.recv() {
                    match message {
                        Message::NewTask(task) => {
                            let _ = result_sender.send(task());
                        }
                        Message::Terminate => break,
                    }
                }
                debug!("task worker exiting");
            })?;

        Ok(Self {
            sender,
            results,
            worker: Some(worker),
            running: false,
        })
    }

    /// Hand the slot a task. Rejected with [`Error::Busy`] while the
    /// previous task is still in flight.
    pub fn submit<F>(&mut self, task: F) -> crate::Result<()>
    where
        F: FnOnce() -> crate::Result<T> + Send + 'static,
    {
        if self.running {
            return Err(Error::Busy);
        }
        self.sender
            .send(Message::NewTask(Box::new(task)))
            .map_err(|_| Error::TaskAborted)?;
        self.running = true;
        Ok(())
    }

    /// Non-blocking progress check. Returns `Done`/`Failed` exactly once
    /// when the task finishes, then goes back to `Idle`.
    pub fn poll(&mut self) -> TaskState<T> {
        if !self.running {
            return TaskState::Idle;
        }
        match self.results.try_recv() {
            Ok(Ok(value)) => {
                self.running = false;
                TaskState::Done(value)
            }
            Ok(Err(error)) => {
                self.running = false;
                TaskState::Failed(error)
            }
            Err(mpsc::TryRecvError::Empty) => TaskState::Running,
            Err(mpsc::TryRecvError::Disconnected) => {
                // The worker died mid-task, most likely a panic inside it.
                self.running = false;
                TaskState::Failed(Error::TaskAborted)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl<T: Send + 'static> Drop for TaskSlot<T> {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Terminate);
        if let Some(worker) = self.worker.take() {
            info!("shutting down task worker");
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Poll until the slot leaves `Running`, with a generous timeout.
    fn wait(slot: &mut TaskSlot<u32>) -> TaskState<u32> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match slot.poll() {
                TaskState::Running => {
                    assert!(Instant::now() < deadline, "task did not finish in time");
                    thread::sleep(Duration::from_millis(5));
                }
                state => return state,
            }
        }
    }

    #[test]
    fn starts_idle() {
        let mut slot: TaskSlot<u32> = TaskSlot::new("test-idle").unwrap();
        assert!(matches!(slot.poll(), TaskState::Idle));
        assert!(!slot.is_running());
    }

    #[test]
    fn delivers_a_result_exactly_once() {
        let mut slot = TaskSlot::new("test-once").unwrap();
        slot.submit(|| Ok(7u32)).unwrap();

        match wait(&mut slot) {
            TaskState::Done(value) => assert_eq!(value, 7),
            other => panic!("expected Done, got {:?}", other),
        }

        // Delivered; the slot is idle again.
        assert!(matches!(slot.poll(), TaskState::Idle));
    }

    #[test]
    fn rejects_submission_while_running() {
        let mut slot = TaskSlot::new("test-busy").unwrap();
        slot.submit(|| {
            thread::sleep(Duration::from_millis(100));
            Ok(1u32)
        })
        .unwrap();

        match slot.submit(|| Ok(2u32)) {
            Err(Error::Busy) => {}
            other => panic!("expected Busy, got {:?}", other),
        }

        match wait(&mut slot) {
            TaskState::Done(value) => assert_eq!(value, 1),
            other => panic!("expected the first task's result, got {:?}", other),
        }
    }

    #[test]
    fn task_errors_surface_as_failed() {
        let mut slot: TaskSlot<u32> = TaskSlot::new("test-failed").unwrap();
        slot.submit(|| Err(Error::EmptyTopology)).unwrap();

        match wait(&mut slot) {
            TaskState::Failed(Error::EmptyTopology) => {}
            other => panic!("expected Failed(EmptyTopology), got {:?}", other),
        }
        assert!(matches!(slot.poll(), TaskState::Idle));
    }
}

use std::collections::{HashSet, VecDeque};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::messages::{Completion, Job, SessionUpdate, Ticket};
use crate::session::DiffSession;

/// Messages sent to the dispatch thread
pub enum WorkerMessage {
    Run(Job),
    /// Stop the dispatch thread
    Stop,
}

/// Runs jobs off the caller's thread.
///
/// Every job gets its own thread, so completions arrive in whatever order the
/// backends answer; the session sorts out which ones still matter.
pub struct Worker {
    sender: Sender<WorkerMessage>,
    completions: Receiver<Completion>,
    _thread_handle: thread::JoinHandle<()>,
}

impl Worker {
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel();
        let (completion_sender, completions) = mpsc::channel();

        let thread_handle = thread::spawn(move || {
            Self::dispatch_loop(receiver, completion_sender);
        });

        Self {
            sender,
            completions,
            _thread_handle: thread_handle,
        }
    }

    pub fn submit(&self, job: Job) {
        let _ = self.sender.send(WorkerMessage::Run(job));
    }

    pub fn submit_all(&self, jobs: impl IntoIterator<Item = Job>) {
        for job in jobs {
            self.submit(job);
        }
    }

    /// Wait up to `timeout` for the next completion
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => Some(completion),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Submit `jobs` and apply completions until `jobs` and their follow-ups
    /// have all answered, or nothing arrives within `timeout`.
    ///
    /// Late completions of earlier jobs are applied as they come but do not
    /// count towards this call's jobs.
    pub fn settle(
        &self,
        session: &mut DiffSession,
        jobs: Vec<Job>,
        timeout: Duration,
    ) -> Vec<SessionUpdate> {
        let mut outstanding: HashSet<Ticket> = jobs.iter().map(|job| job.ticket).collect();
        let mut updates = Vec::new();
        self.submit_all(jobs);

        while !outstanding.is_empty() {
            let Some(completion) = self.recv_timeout(timeout) else {
                warn!(outstanding = outstanding.len(), "gave up waiting for backend");
                break;
            };
            let ours = outstanding.remove(&completion.ticket);
            let applied = session.apply(completion);
            if ours {
                outstanding.extend(applied.jobs.iter().map(|job| job.ticket));
            }
            self.submit_all(applied.jobs);
            updates.push(applied.update);
        }

        updates
    }

    fn dispatch_loop(receiver: Receiver<WorkerMessage>, completions: Sender<Completion>) {
        while let Ok(message) = receiver.recv() {
            match message {
                WorkerMessage::Run(job) => {
                    debug!(ticket = ?job.ticket, "dispatching job");
                    let completions = completions.clone();
                    thread::spawn(move || {
                        let _ = completions.send(job.run());
                    });
                }
                WorkerMessage::Stop => break,
            }
        }
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::spawn()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.sender.send(WorkerMessage::Stop);
    }
}

/// Run `jobs` and all their follow-ups on the current thread, in order
pub fn run_inline(session: &mut DiffSession, jobs: Vec<Job>) -> Vec<SessionUpdate> {
    let mut queue: VecDeque<Job> = jobs.into();
    let mut updates = Vec::new();

    while let Some(job) = queue.pop_front() {
        let applied = session.apply(job.run());
        queue.extend(applied.jobs);
        updates.push(applied.update);
    }

    updates
}

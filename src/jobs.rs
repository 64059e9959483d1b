//! Background job tracking.

use crate::command::ExitOutcome;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, warn};

/// A tracked background process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub alive: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("too many background processes (limit is {limit})")]
    Full { limit: usize },
}

/// A background job that finished since the last reap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub pid: Pid,
    pub outcome: ExitOutcome,
}

impl std::fmt::Display for Finished {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "background pid {} is done: {}", self.pid, self.outcome)
    }
}

/// Ordered, capacity-bounded set of background jobs.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.jobs.iter().map(|job| job.pid)
    }

    /// Start tracking `pid`. A full table is left untouched.
    pub fn insert(&mut self, pid: Pid) -> Result<(), JobError> {
        if self.is_full() {
            return Err(JobError::Full {
                limit: self.capacity,
            });
        }
        self.jobs.push(Job { pid, alive: true });
        Ok(())
    }

    /// Poll every job without blocking and drop the ones that finished.
    ///
    /// The first pass only marks entries dead; the second removes them, so
    /// the survivors keep their relative order.
    pub fn reap(&mut self) -> Vec<Finished> {
        let mut finished = Vec::new();
        for job in &mut self.jobs {
            match waitpid(job.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(status) => {
                    if let Some(outcome) = ExitOutcome::from_wait_status(status) {
                        debug!(pid = %job.pid, %outcome, "reaped background job");
                        finished.push(Finished {
                            pid: job.pid,
                            outcome,
                        });
                        job.alive = false;
                    }
                }
                Err(Errno::EINTR) => {}
                Err(err) => {
                    warn!(pid = %job.pid, %err, "lost track of background job");
                    job.alive = false;
                }
            }
        }
        self.jobs.retain(|job| job.alive);
        finished
    }

    /// Send SIGTERM to every tracked job.
    pub fn terminate_all(&self) {
        for pid in self.pids() {
            if let Err(err) = kill(pid, Signal::SIGTERM) {
                warn!(%pid, %err, "failed to signal background job");
            }
        }
    }
}

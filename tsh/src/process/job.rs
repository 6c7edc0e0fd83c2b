use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{Pid, getpid};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::signal::send_signal_to_group;
use super::state::ProcessState;
use super::wait::{wait_pid_job, wait_until_done};

/// A background process the shell believes may still be running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: usize,
    pub pid: Pid,
    pub cmd: String,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.job_id, self.cmd)
    }
}

/// How the table finds out whether a tracked pid has terminated.
pub trait ReapProbe {
    /// Non-blocking check; a terminated process is reaped as a side effect.
    fn poll(&mut self, pid: Pid) -> ProcessState;

    /// Block until `pid` has terminated.
    fn wait(&mut self, pid: Pid) -> ProcessState;
}

/// Reaps with `waitpid`.
///
/// Only the process that forked the jobs can wait for them. A forked copy of
/// the shell (a builtin running inside a pipeline stage) falls back to a
/// liveness probe with the null signal and never reaps.
#[derive(Debug)]
pub struct WaitPidProbe {
    owner: Pid,
}

impl WaitPidProbe {
    pub fn new() -> Self {
        WaitPidProbe { owner: getpid() }
    }

    fn is_owner(&self) -> bool {
        getpid() == self.owner
    }
}

impl Default for WaitPidProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ReapProbe for WaitPidProbe {
    fn poll(&mut self, pid: Pid) -> ProcessState {
        if self.is_owner() {
            return wait_pid_job(pid, true);
        }
        match kill(pid, None::<Signal>) {
            Err(Errno::ESRCH) => ProcessState::Completed(1, None),
            _ => ProcessState::Running,
        }
    }

    fn wait(&mut self, pid: Pid) -> ProcessState {
        wait_until_done(pid)
    }
}

/// Background jobs keyed by job id.
///
/// Every read that depends on liveness sweeps first, so callers never see a
/// job whose process has already terminated.
pub struct JobTable {
    jobs: BTreeMap<usize, Job>,
    probe: Box<dyn ReapProbe>,
}

impl fmt::Debug for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTable").field("jobs", &self.jobs).finish()
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::with_probe(Box::new(WaitPidProbe::new()))
    }

    pub fn with_probe(probe: Box<dyn ReapProbe>) -> Self {
        JobTable {
            jobs: BTreeMap::new(),
            probe,
        }
    }

    /// Track `pid` under a fresh id and return the id.
    ///
    /// A pid that is already tracked keeps its existing id.
    pub fn add_job(&mut self, pid: Pid, cmd: impl Into<String>) -> usize {
        self.reclaim();

        if let Some(existing) = self.jobs.values().find(|job| job.pid == pid) {
            warn!(
                "job table already tracks pid {} as job {}",
                pid, existing.job_id
            );
            return existing.job_id;
        }

        let job_id = self.next_job_id();
        let job = Job {
            job_id,
            pid,
            cmd: cmd.into(),
        };
        debug!("📋 JOB: added {:?}", job);
        self.jobs.insert(job_id, job);
        job_id
    }

    pub fn get_job_by_id(&mut self, job_id: usize) -> Option<&Job> {
        self.reclaim();
        self.jobs.get(&job_id)
    }

    /// Drop a job without checking on its process.
    pub fn remove_job_by_id(&mut self, job_id: usize) -> Option<Job> {
        let removed = self.jobs.remove(&job_id);
        if let Some(job) = &removed {
            debug!("📋 JOB: removed {:?}", job);
        }
        removed
    }

    /// Live jobs in ascending id order.
    pub fn jobs(&mut self) -> Vec<&Job> {
        self.reclaim();
        self.jobs.values().collect()
    }

    /// The job with the highest id.
    pub fn last_job(&mut self) -> Option<&Job> {
        self.reclaim();
        self.jobs.values().next_back()
    }

    /// One past the highest id in use, 1 for an empty table.
    pub fn next_job_id(&self) -> usize {
        self.jobs.keys().next_back().map_or(1, |id| id + 1)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Poll every tracked pid once and drop the ones that have terminated.
    pub fn reclaim(&mut self) -> Vec<Job> {
        let finished: Vec<(usize, ProcessState)> = self
            .jobs
            .values()
            .filter_map(|job| {
                let state = self.probe.poll(job.pid);
                state.is_completed().then_some((job.job_id, state))
            })
            .collect();

        finished
            .into_iter()
            .filter_map(|(job_id, state)| {
                let job = self.jobs.remove(&job_id)?;
                debug!("📋 JOB: reclaimed {:?} ({})", job, state);
                Some(job)
            })
            .collect()
    }

    /// Send SIGKILL to the process group of every tracked job, reap them
    /// and empty the table. Returns how many jobs were signalled.
    pub fn terminate_all(&mut self) -> usize {
        let jobs = std::mem::take(&mut self.jobs);
        let mut signalled = 0;
        for job in jobs.values() {
            match send_signal_to_group(job.pid, Signal::SIGKILL) {
                Ok(_) => signalled += 1,
                Err(e) => warn!("failed to kill job {} (pid {}): {}", job.job_id, job.pid, e),
            }
        }
        for job in jobs.values() {
            let state = self.probe.wait(job.pid);
            debug!("📋 JOB: terminated {:?} ({})", job, state);
        }
        signalled
    }
}

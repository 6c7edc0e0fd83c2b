pub mod job;
pub mod launcher;
pub mod pipeline;
pub mod redirect;
pub mod signal;
pub mod state;
pub mod terminal;
pub mod wait;

pub use job::{Job, JobTable, ReapProbe, WaitPidProbe};
pub use launcher::{LaunchMode, ProcessGroup, Program};
pub use pipeline::{PipeStream, StageGroup};
pub use redirect::Redirect;
pub use signal::{ForegroundSlot, InterruptMask, InterruptOutcome, foreground};
pub use state::ProcessState;
pub use wait::wait_pid_job;

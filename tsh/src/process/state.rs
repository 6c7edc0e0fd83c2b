use nix::sys::signal::Signal;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessState {
    /// Not terminated yet, or the wait for it was interrupted.
    Running,
    Completed(u8, Option<Signal>),
}

impl ProcessState {
    pub fn is_completed(&self) -> bool {
        matches!(self, ProcessState::Completed(_, _))
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProcessState::Running => formatter.write_str("running"),
            ProcessState::Completed(_, signal) => match signal {
                Some(Signal::SIGKILL) => formatter.write_str("killed"),
                Some(Signal::SIGTERM) => formatter.write_str("terminated"),
                Some(Signal::SIGINT) => formatter.write_str("interrupted"),
                _ => formatter.write_str("done"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_terminating_signal() {
        assert_eq!(ProcessState::Running.to_string(), "running");
        assert_eq!(ProcessState::Completed(0, None).to_string(), "done");
        assert_eq!(
            ProcessState::Completed(1, Some(Signal::SIGKILL)).to_string(),
            "killed"
        );
        assert_eq!(
            ProcessState::Completed(1, Some(Signal::SIGTERM)).to_string(),
            "terminated"
        );
    }
}

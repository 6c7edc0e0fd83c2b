use super::ShellProxy;
use tsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    super::dispatch_to_shell(ctx, "jobs", argv, proxy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingProxy, context};

    #[test]
    fn jobs_is_handled_by_the_shell() {
        let mut proxy = RecordingProxy::default();
        let status = command(&context(), vec!["jobs".to_string()], &mut proxy);
        assert_eq!(status, ExitStatus::ExitedWith(0));
        assert_eq!(proxy.dispatched[0].0, "jobs");
    }
}

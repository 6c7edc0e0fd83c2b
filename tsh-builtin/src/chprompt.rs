use super::ShellProxy;
use tsh_types::{Context, ExitStatus};

/// `chprompt` with no argument restores the default prompt.
pub fn command(_ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    proxy.set_prompt(argv.get(1).cloned());
    ExitStatus::ExitedWith(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{RecordingProxy, context};

    #[test]
    fn chprompt_sets_and_resets() {
        let mut proxy = RecordingProxy::default();
        command(
            &context(),
            vec!["chprompt".to_string(), "hello".to_string()],
            &mut proxy,
        );
        assert_eq!(proxy.prompt.as_deref(), Some("hello"));

        command(&context(), vec!["chprompt".to_string()], &mut proxy);
        assert_eq!(proxy.prompt, None);
    }
}

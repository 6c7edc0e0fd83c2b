use tracing::debug;
use tsh_types::APP_NAME;

/// Print an error the way the shell reports every failure:
/// `tsh error: <message>` on stderr, one line, no cause chain.
///
/// The full chain goes to the debug log.
pub fn display_user_error(err: &anyhow::Error) {
    debug!("user error: {:?}", err);
    eprintln!("{}", user_message(err));
}

fn user_message(err: &anyhow::Error) -> String {
    format!("{APP_NAME} error: {err}")
}

use tracing::debug;
use tsh_types::{TshError, TshResult};

use crate::process::{PipeStream, Program, Redirect};
use crate::shell::command::{Command, CommandKind};

/// Builtins whose arguments are taken verbatim, so a quoted `|` or `>` in
/// an alias definition is not treated as an operator.
const VERBATIM_BUILTINS: [&str; 1] = ["alias"];

/// Split a trailing `&` off a trimmed line.
pub fn strip_background(line: &str) -> (&str, bool) {
    let line = line.trim();
    match line.strip_suffix('&') {
        // `|&` is a pipe operator, not a background marker
        Some(rest) if !rest.ends_with('|') => (rest.trim_end(), true),
        _ => (line, false),
    }
}

/// Classify one line. Returns `None` for a blank line.
///
/// A `|` anywhere makes a pipeline split at the first one; otherwise the
/// first `>` or `>>` makes a redirection; otherwise the first word decides
/// between a builtin and an external program.
pub fn parse_line(line: &str, interpreter: &str) -> TshResult<Option<Command>> {
    let (text, background) = strip_background(line);
    if text.is_empty() {
        if background {
            return Err(TshError::Syntax("missing command before '&'".to_string()));
        }
        return Ok(None);
    }

    let mut command = classify(text, interpreter)?;
    command.background = background;
    debug!("parsed {:?} background:{}", command.text, background);
    Ok(Some(command))
}

fn classify(text: &str, interpreter: &str) -> TshResult<Command> {
    let text = text.trim();
    let first_word = text.split_whitespace().next().unwrap_or_default();

    if VERBATIM_BUILTINS.contains(&first_word) {
        return Ok(builtin(text));
    }
    if let Some(idx) = text.find('|') {
        return classify_pipeline(text, idx, interpreter);
    }
    if let Some(idx) = text.find('>') {
        return classify_redirection(text, idx, interpreter);
    }
    if tsh_builtin::is_builtin(first_word) {
        return Ok(builtin(text));
    }
    let program = Program::from_command_line(text, interpreter)
        .ok_or_else(|| TshError::Syntax("empty command".to_string()))?;
    Ok(Command::new(text, CommandKind::External { program }))
}

fn builtin(text: &str) -> Command {
    let argv = text.split_whitespace().map(|s| s.to_string()).collect();
    Command::new(text, CommandKind::Builtin { argv })
}

fn classify_pipeline(text: &str, idx: usize, interpreter: &str) -> TshResult<Command> {
    let left_text = text[..idx].trim();
    let rest = &text[idx + 1..];
    let (stream, right_text) = match rest.strip_prefix('&') {
        Some(right) => (PipeStream::Stderr, right.trim()),
        None => (PipeStream::Stdout, rest.trim()),
    };

    if left_text.is_empty() {
        return Err(TshError::Syntax("missing command before '|'".to_string()));
    }
    if right_text.is_empty() {
        return Err(TshError::Syntax("missing command after '|'".to_string()));
    }

    let left = classify(left_text, interpreter)?;
    let right = classify(right_text, interpreter)?;
    Ok(Command::new(
        text,
        CommandKind::Pipeline {
            left: Box::new(left),
            right: Box::new(right),
            stream,
        },
    ))
}

fn classify_redirection(text: &str, idx: usize, interpreter: &str) -> TshResult<Command> {
    let inner_text = text[..idx].trim();
    let rest = &text[idx + 1..];
    let (append, target) = match rest.strip_prefix('>') {
        Some(target) => (true, target.trim()),
        None => (false, rest.trim()),
    };

    if inner_text.is_empty() {
        return Err(TshError::Syntax("missing command before '>'".to_string()));
    }
    if target.is_empty() || target.contains('>') {
        return Err(TshError::Syntax("missing redirection target".to_string()));
    }

    let redirect = if append {
        Redirect::Append(target.to_string())
    } else {
        Redirect::Truncate(target.to_string())
    };
    let inner = classify(inner_text, interpreter)?;
    Ok(Command::new(
        text,
        CommandKind::Redirection {
            inner: Box::new(inner),
            redirect,
        },
    ))
}

//! Shell quoting and path validation for remote command strings.
//!
//! Every remote command is assembled by string interpolation and handed to a
//! POSIX shell on the build host. Values that originate outside this crate
//! (configuration, provider responses, user paths) must pass through
//! [`escape_argument`] or [`validate_path`] before they are embedded.

use std::borrow::Cow;

use camino::{Utf8Component, Utf8Path};
use shell_escape::unix::escape;
use thiserror::Error;

/// Characters that may never appear in a path embedded in a remote command.
const FORBIDDEN_PATH_CHARS: [char; 12] = [
    '\0', ';', '|', '&', '$', '`', '\n', '\r', '(', ')', '<', '>',
];

/// Raised when a path contains traversal segments or shell metacharacters.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("invalid path: contains path traversal or shell metacharacters")]
pub struct InvalidPath;

/// Quotes `value` so a POSIX shell reads it back as exactly one word.
///
/// Empty input becomes `''`; embedded single quotes are closed, escaped and
/// reopened, so newlines and metacharacters survive byte-for-byte.
///
/// # Examples
///
/// ```
/// use blackbsd::shell::escape_argument;
///
/// assert_eq!(escape_argument(""), "''");
/// assert_eq!(escape_argument("it's"), "'it'\\''s'");
/// ```
#[must_use]
pub fn escape_argument(value: &str) -> String {
    escape(Cow::Borrowed(value)).into_owned()
}

/// Rejects paths that are unsafe to interpolate into a remote command.
///
/// Refuses empty strings, `..` segments (raw or after lexical
/// normalisation), NUL bytes, line breaks, backticks and the metacharacters
/// `;`, `|`, `&`, `$`, `(`, `)`, `<` and `>`.
///
/// # Errors
///
/// Returns [`InvalidPath`] for any violation.
pub fn validate_path(path: &str) -> Result<(), InvalidPath> {
    if path.is_empty() {
        return Err(InvalidPath);
    }

    if path.contains(&FORBIDDEN_PATH_CHARS[..]) {
        return Err(InvalidPath);
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(InvalidPath);
    }

    if Utf8Path::new(path)
        .components()
        .any(|component| matches!(component, Utf8Component::ParentDir))
    {
        return Err(InvalidPath);
    }

    Ok(())
}

/// Validates `path` and returns it quoted for the remote shell.
///
/// # Errors
///
/// Returns [`InvalidPath`] when [`validate_path`] rejects the input.
pub fn escape_path(path: &str) -> Result<String, InvalidPath> {
    validate_path(path)?;
    Ok(escape_argument(path))
}

#[cfg(test)]
mod tests;

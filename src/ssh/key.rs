//! Private key loading.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use super::SshError;

/// Expands a leading `~/` prefix to the user's home directory.
///
/// The input is returned unchanged when `HOME` is unset.
///
/// # Examples
///
/// ```
/// # use blackbsd::ssh::expand_tilde;
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Reads the key at `path` and checks that it holds a PEM or OpenSSH
/// private key, returning the expanded path.
pub(super) fn load_private_key(path: &str) -> Result<Utf8PathBuf, SshError> {
    let reject = |message: String| SshError::Key {
        path: path.to_owned(),
        message,
    };

    if path.trim().is_empty() {
        return Err(reject(String::from("no key path configured")));
    }

    let expanded = Utf8PathBuf::from(expand_tilde(path));
    let contents = read_to_string_ambient(&expanded).map_err(reject)?;
    if !looks_like_private_key(&contents) {
        return Err(reject(String::from("file does not contain a private key")));
    }
    Ok(expanded)
}

fn looks_like_private_key(contents: &str) -> bool {
    let mut lines = contents.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    first.starts_with("-----BEGIN ")
        && first.ends_with("PRIVATE KEY-----")
        && contents.contains("-----END ")
}

pub(crate) fn read_to_string_ambient(path: &Utf8Path) -> Result<String, String> {
    let (dir_path, file_name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_str().is_empty() => (parent, name),
        (_, Some(name)) => (Utf8Path::new("."), name),
        (_, None) => return Err(format!("path has no file name: {path}")),
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

//! Build identity.
//!
//! [`BuildInfo::current`] is computed from compile-time values and never
//! changes while the process runs. The display form condenses a
//! `git describe` string: a clean tag prints as the tag, anything past a tag
//! prints as `<tag>-<sha>-<commits since tag>`.

use std::fmt;

const SHORT_COMMIT_LEN: usize = 7;

/// Version, commit, and build date of this binary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BuildInfo {
    /// Version or `git describe` output.
    pub version: &'static str,
    /// Full commit hash, or `none`.
    pub commit: &'static str,
    /// Build timestamp, or `unknown`.
    pub build_date: &'static str,
}

impl BuildInfo {
    /// Identity baked in at compile time.
    ///
    /// `BLACKBSD_VERSION`, `BLACKBSD_COMMIT`, and `BLACKBSD_BUILD_DATE` are
    /// read from the build environment; the version falls back to the crate
    /// version.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            version: match option_env!("BLACKBSD_VERSION") {
                Some(version) => version,
                None => env!("CARGO_PKG_VERSION"),
            },
            commit: match option_env!("BLACKBSD_COMMIT") {
                Some(commit) => commit,
                None => "none",
            },
            build_date: match option_env!("BLACKBSD_BUILD_DATE") {
                Some(date) => date,
                None => "unknown",
            },
        }
    }

    /// Human-readable version string.
    #[must_use]
    pub fn display_version(&self) -> String {
        format_display_version(self.version, self.commit)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_version())
    }
}

#[derive(Debug, Default, Eq, PartialEq)]
struct Describe<'a> {
    base: &'a str,
    count: &'a str,
    sha: &'a str,
    dirty: bool,
}

fn parse_describe(version: &str) -> Describe<'_> {
    if version.is_empty() {
        return Describe::default();
    }
    let dirty = version.ends_with("-dirty");
    let core = match version.strip_suffix("-dirty") {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => version,
    };

    if let Some((head, sha)) = core.rsplit_once("-g")
        && !sha.is_empty()
        && sha.bytes().all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
        && let Some((base, count)) = head.rsplit_once('-')
        && !base.is_empty()
        && !count.is_empty()
        && count.bytes().all(|byte| byte.is_ascii_digit())
    {
        return Describe {
            base,
            count,
            sha,
            dirty,
        };
    }

    Describe {
        base: core,
        dirty,
        ..Describe::default()
    }
}

fn short_commit(commit: &str) -> String {
    commit.chars().take(SHORT_COMMIT_LEN).collect()
}

/// Formats `version` (possibly `git describe` output) for display.
///
/// # Examples
///
/// ```
/// # use blackbsd::version::format_display_version;
/// assert_eq!(format_display_version("v1.2.0", "none"), "v1.2.0");
/// assert_eq!(format_display_version("v1.2.0-3-gabc1234", "none"), "v1.2.0-abc1234-3");
/// ```
#[must_use]
pub fn format_display_version(version: &str, commit: &str) -> String {
    let parsed = parse_describe(version);
    let base = if parsed.base.is_empty() {
        "dev"
    } else {
        parsed.base
    };
    if !parsed.dirty && parsed.count.is_empty() {
        return base.to_owned();
    }
    let sha = if parsed.sha.is_empty() {
        short_commit(commit)
    } else {
        parsed.sha.to_owned()
    };
    if sha.is_empty() || sha == "none" {
        return base.to_owned();
    }
    let count = if parsed.count.is_empty() {
        "0"
    } else {
        parsed.count
    };
    format!("{base}-{sha}-{count}")
}

//! Unit tests for shell quoting and path validation.

use std::process::Command;

use proptest::prelude::*;
use rstest::rstest;

use super::*;

/// Runs `printf %s <escaped>` through `/bin/sh` and returns what it printed.
fn shell_round_trip(value: &str) -> String {
    let script = format!("printf %s {}", escape_argument(value));
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(&script)
        .output()
        .unwrap_or_else(|err| panic!("spawn /bin/sh: {err}"));
    assert!(output.status.success(), "sh rejected script: {script}");
    String::from_utf8(output.stdout).unwrap_or_else(|err| panic!("utf8: {err}"))
}

#[rstest]
#[case("", "''")]
#[case("it's", "'it'\\''s'")]
#[case("hello world", "'hello world'")]
#[case("foo; rm -rf /", "'foo; rm -rf /'")]
#[case("$HOME", "'$HOME'")]
#[case("`whoami`", "'`whoami`'")]
#[case("line1\nline2", "'line1\nline2'")]
fn escape_argument_quotes_unsafe_input(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(escape_argument(input), expected);
}

#[rstest]
#[case("")]
#[case("it's a 'test'")]
#[case("line1\nline2")]
#[case("$(whoami) & `id` | cat > /etc/passwd")]
#[case("tab\there\r\u{1}")]
#[case("!history")]
#[case("Welcome to BlackBSD 100%\\n")]
fn escape_argument_round_trips_through_sh(#[case] input: &str) {
    assert_eq!(shell_round_trip(input), input);
}

#[rstest]
#[case("/tmp/image.raw.xz")]
#[case("output/image.raw.xz")]
#[case("/dev/sda")]
#[case("/dev/nvme0n1")]
#[case("/mnt/iso")]
#[case("/tmp/netbsd..iso")]
fn validate_path_accepts_plain_paths(#[case] path: &str) {
    assert_eq!(validate_path(path), Ok(()));
}

#[rstest]
#[case("")]
#[case("/tmp/../etc/passwd")]
#[case("../../etc/shadow")]
#[case("..")]
#[case("/tmp/foo; rm -rf /")]
#[case("/tmp/foo | cat /etc/passwd")]
#[case("/tmp/foo & whoami")]
#[case("/tmp/$HOME")]
#[case("/tmp/`whoami`")]
#[case("/tmp/foo\nrm -rf /")]
#[case("/tmp/foo\rbar")]
#[case("/tmp/$(whoami)")]
#[case("/tmp/foo < /etc/passwd")]
#[case("/tmp/foo > /etc/passwd")]
#[case("/tmp/nul\0byte")]
fn validate_path_rejects_unsafe_paths(#[case] path: &str) {
    assert_eq!(validate_path(path), Err(InvalidPath));
}

#[test]
fn escape_path_quotes_after_validation() {
    assert_eq!(escape_path("/tmp/my image.iso"), Ok(String::from("'/tmp/my image.iso'")));
    assert_eq!(escape_path("/tmp/$(id)"), Err(InvalidPath));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn escaped_words_survive_posix_shell(value in "[^\u{0}]{0,24}") {
        prop_assert_eq!(shell_round_trip(&value), value);
    }

    #[test]
    fn traversal_segments_are_always_rejected(
        prefix in "[a-z/]{0,8}",
        suffix in "[a-z/]{0,8}",
    ) {
        let path = format!("{prefix}/../{suffix}");
        prop_assert_eq!(validate_path(&path), Err(InvalidPath));
    }

    #[test]
    fn plain_segments_are_accepted(segments in prop::collection::vec("[a-z0-9_.-]{1,8}", 1..5)) {
        prop_assume!(segments.iter().all(|segment| segment != ".."));
        let path = format!("/{}", segments.join("/"));
        prop_assert_eq!(validate_path(&path), Ok(()));
    }
}

//! Key loading, argument construction, and exit-status interpretation.

use std::ffi::OsString;

use rstest::rstest;

use super::{key_file, valid_key};
use crate::remote::RemoteRunner;
use crate::ssh::{SshClient, SshError, SshSettings, expand_tilde};
use crate::test_support::ScriptedProcessRunner;

fn client(runner: &ScriptedProcessRunner, key: &str) -> SshClient<ScriptedProcessRunner> {
    let settings = SshSettings {
        port: 2222,
        ..SshSettings::default()
    };
    SshClient::with_runner("203.0.113.9", key, settings, runner.clone()).expect("key should load")
}

#[test]
fn connect_rejects_missing_key() {
    let err = SshClient::connect("203.0.113.9", "/nonexistent/blackbsd/key", 22)
        .expect_err("missing key should fail");
    assert!(matches!(err, SshError::Key { .. }), "got {err:?}");
}

#[test]
fn connect_rejects_files_without_private_key() {
    let (_dir, path) = key_file("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAA user@host\n");
    let err = SshClient::connect("203.0.113.9", path.as_str(), 22)
        .expect_err("public key should be rejected");
    assert!(
        matches!(err, SshError::Key { ref message, .. } if message.contains("private key")),
        "got {err:?}"
    );
}

#[test]
fn connect_rejects_empty_key_path() {
    let err = SshClient::connect("203.0.113.9", "  ", 22).expect_err("empty path should fail");
    assert!(matches!(err, SshError::Key { .. }));
}

#[test]
fn connect_accepts_private_key() {
    let (_dir, path) = valid_key();
    let ssh = SshClient::connect("203.0.113.9", path.as_str(), 22).expect("key should load");
    assert_eq!(ssh.host(), "203.0.113.9");
    assert_eq!(ssh.settings().port, 22);
}

#[test]
fn ssh_args_disable_host_key_pinning() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    let ssh = client(&runner, path.as_str());

    let args = ssh.ssh_args("uname -a", false);

    let rendered: Vec<String> = args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    let expected_prefix = vec![
        String::from("-p"),
        String::from("2222"),
        String::from("-i"),
        path.to_string(),
        String::from("-o"),
        String::from("BatchMode=yes"),
        String::from("-o"),
        String::from("StrictHostKeyChecking=no"),
        String::from("-o"),
        String::from("UserKnownHostsFile=/dev/null"),
    ];
    assert_eq!(rendered.get(..expected_prefix.len()), Some(expected_prefix.as_slice()));
    assert_eq!(
        rendered.get(rendered.len().saturating_sub(2)..),
        Some([String::from("root@203.0.113.9"), String::from("uname -a")].as_slice())
    );
    assert!(!rendered.iter().any(|arg| arg == "-tt"));
}

#[tokio::test]
async fn exec_reports_non_zero_exit_as_result() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(Some(127), "", "sh: nope: not found\n");
    let ssh = client(&runner, path.as_str());

    let result = RemoteRunner::exec(&ssh, "nope")
        .await
        .expect("non-zero exit is not a transport error");

    assert_eq!(result.exit_code, 127);
    assert!(!result.is_success());
    assert_eq!(result.stderr, "sh: nope: not found\n");
    let invocation = runner.invocations().pop().expect("one invocation");
    assert_eq!(invocation.program, "ssh");
    assert_eq!(invocation.args.last(), Some(&OsString::from("nope")));
}

#[tokio::test]
async fn exec_captures_stdout_on_success() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(Some(0), "NetBSD\n", "");
    let ssh = client(&runner, path.as_str());

    let result = ssh.exec("uname").await.expect("exec should succeed");

    assert!(result.is_success());
    assert_eq!(result.stdout, "NetBSD\n");
}

#[rstest]
#[case::connection_failure(Some(255))]
#[case::killed(None)]
#[tokio::test]
async fn exec_maps_client_failures_to_errors(#[case] code: Option<i32>) {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(code, "", "ssh: connect to host 203.0.113.9 port 2222: Connection refused\n");
    let ssh = client(&runner, path.as_str());

    let err = ssh.exec("true").await.expect_err("client failure should error");

    match code {
        Some(_) => assert_eq!(
            err,
            SshError::Connectivity {
                host: String::from("203.0.113.9"),
                message: String::from(
                    "ssh: connect to host 203.0.113.9 port 2222: Connection refused"
                ),
            }
        ),
        None => assert_eq!(
            err,
            SshError::Terminated {
                host: String::from("203.0.113.9")
            }
        ),
    }
}

#[tokio::test]
async fn exec_reports_spawn_failures() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    let ssh = client(&runner, path.as_str());

    let err = ssh.exec("true").await.expect_err("spawn failure should error");

    assert!(matches!(err, SshError::Spawn { ref program, .. } if program == "ssh"));
}

#[tokio::test]
async fn exec_interactive_allocates_tty_and_streams_input() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(Some(0), "installed\n", "");
    let ssh = client(&runner, path.as_str());
    let mut input: &[u8] = b"a\nx\n";

    let result = ssh
        .exec_interactive("qemu-system-x86_64 -nographic", &mut input)
        .await
        .expect("interactive exec should succeed");

    assert!(result.is_success());
    let invocation = runner.invocations().pop().expect("one invocation");
    assert!(invocation.args.contains(&OsString::from("-tt")));
    assert_eq!(invocation.stdin.as_deref(), Some("a\nx\n"));
}

#[test]
fn expand_tilde_leaves_other_paths_alone() {
    assert_eq!(expand_tilde("relative/key"), "relative/key");
    assert_eq!(expand_tilde("/etc/ssh/key"), "/etc/ssh/key");
}

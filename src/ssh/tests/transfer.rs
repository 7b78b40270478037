//! File transfer argument construction and failure mapping.

use camino::Utf8Path;

use super::valid_key;
use crate::shell::InvalidPath;
use crate::ssh::{SshClient, SshError, SshSettings};
use crate::test_support::ScriptedProcessRunner;

fn rendered(args: &[std::ffi::OsString]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn upload_uses_scp_with_port_flag() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(Some(0), "", "");
    let ssh = SshClient::with_runner("203.0.113.9", path.as_str(), SshSettings::default(), runner.clone())
        .expect("key should load");

    ssh.upload_file(Utf8Path::new("/tmp/answers.txt"), "/root/answers.txt")
        .await
        .expect("upload should succeed");

    let invocation = runner.invocations().pop().expect("one invocation");
    assert_eq!(invocation.program, "scp");
    let args = rendered(&invocation.args);
    assert_eq!(args.first().map(String::as_str), Some("-P"));
    assert_eq!(
        args.get(args.len().saturating_sub(2)..),
        Some(
            [
                String::from("/tmp/answers.txt"),
                String::from("root@203.0.113.9:/root/answers.txt")
            ]
            .as_slice()
        )
    );
}

#[tokio::test]
async fn download_brackets_ipv6_hosts() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(Some(0), "", "");
    let ssh = SshClient::with_runner("2001:db8::1", path.as_str(), SshSettings::default(), runner.clone())
        .expect("key should load");

    ssh.download_file("/tmp/netbsd.iso", Utf8Path::new("out/netbsd.iso"))
        .await
        .expect("download should succeed");

    let args = rendered(&runner.invocations().pop().expect("one invocation").args);
    assert!(args.contains(&String::from("root@[2001:db8::1]:/tmp/netbsd.iso")));
}

#[tokio::test]
async fn transfer_rejects_unsafe_remote_paths_before_running() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    let ssh = SshClient::with_runner("203.0.113.9", path.as_str(), SshSettings::default(), runner.clone())
        .expect("key should load");

    let err = ssh
        .upload_file(Utf8Path::new("local"), "/tmp/$(reboot)")
        .await
        .expect_err("unsafe path should be rejected");

    assert_eq!(err, SshError::InvalidPath(InvalidPath));
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn failed_transfer_reports_exit_code() {
    let (_dir, path) = valid_key();
    let runner = ScriptedProcessRunner::new();
    runner.push_output(Some(1), "", "scp: /tmp/missing: No such file or directory\n");
    let ssh = SshClient::with_runner("203.0.113.9", path.as_str(), SshSettings::default(), runner)
        .expect("key should load");

    let err = ssh
        .download_file("/tmp/missing", Utf8Path::new("missing"))
        .await
        .expect_err("failed transfer should error");

    assert_eq!(
        err,
        SshError::Transfer {
            operation: "download",
            path: String::from("/tmp/missing"),
            host: String::from("203.0.113.9"),
            exit_code: 1,
            stderr: String::from("scp: /tmp/missing: No such file or directory"),
        }
    );
}

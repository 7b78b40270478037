use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::remote::{CommandResult, RemoteFuture, RemoteRunner};
use crate::ssh::{SshError, StdinSource};
use crate::test_support::RecordingRunner;

#[fixture]
fn release() -> NetbsdRelease {
    NetbsdRelease {
        version: String::from("10.1"),
        arch: String::from("amd64"),
    }
}

#[rstest]
fn iso_url_points_at_serial_console_image(release: NetbsdRelease) {
    assert_eq!(
        release.iso_url(),
        "https://cdn.netbsd.org/pub/NetBSD/NetBSD-10.1/amd64/installation/cdrom/boot-com.iso"
    );
}

#[rstest]
#[tokio::test]
async fn download_fetches_iso_into_destination(release: NetbsdRelease) {
    let runner = RecordingRunner::new();

    let path = Installer::new(&runner, release)
        .download_iso("/tmp/")
        .await
        .expect("download should succeed");

    assert_eq!(path, "/tmp/netbsd-10.1-amd64.iso");
    assert_eq!(
        runner.commands(),
        vec![String::from(
            "wget -O /tmp/netbsd-10.1-amd64.iso 'https://cdn.netbsd.org/pub/NetBSD/NetBSD-10.1/amd64/installation/cdrom/boot-com.iso'"
        )]
    );
}

#[rstest]
#[tokio::test]
async fn download_rejects_unsafe_destination(release: NetbsdRelease) {
    let runner = RecordingRunner::new();

    let err = Installer::new(&runner, release)
        .download_iso("/tmp/`id`")
        .await
        .expect_err("unsafe destination should fail");

    assert!(matches!(err, StepError::InvalidPath { .. }), "got {err:?}");
    assert!(runner.commands().is_empty());
}

#[rstest]
#[tokio::test]
async fn qemu_boots_iso_against_target_disk(release: NetbsdRelease) {
    let runner = RecordingRunner::new();

    Installer::new(&runner, release)
        .install_via_qemu("/tmp/netbsd-10.1-amd64.iso", "/dev/sda", None)
        .await
        .expect("install should succeed");

    assert_eq!(
        runner.commands(),
        vec![String::from(
            "qemu-system-x86_64 -enable-kvm -m 4G -smp 4 -cdrom /tmp/netbsd-10.1-amd64.iso \
             -boot d -drive file=/dev/sda,format=raw -nographic -serial mon:stdio"
        )]
    );
    assert!(runner.interactive_inputs().is_empty());
}

#[rstest]
#[tokio::test]
async fn qemu_streams_answers_to_the_console(release: NetbsdRelease) {
    let runner = RecordingRunner::new();

    Installer::new(&runner, release)
        .install_via_qemu("/tmp/netbsd.iso", "/dev/nvme0n1", Some("a\nb\nx\n"))
        .await
        .expect("install should succeed");

    assert_eq!(runner.interactive_inputs(), vec![String::from("a\nb\nx\n")]);
}

#[rstest]
#[tokio::test]
async fn interactive_failures_carry_exit_code(release: NetbsdRelease) {
    let runner = RecordingRunner::new();
    runner.push_result(1, "", "Could not access KVM kernel module\n");

    let err = Installer::new(&runner, release)
        .install_via_qemu("/tmp/netbsd.iso", "/dev/sda", Some("x\n"))
        .await
        .expect_err("qemu failure should abort");

    assert_eq!(
        err.to_string(),
        "run qemu install failed with exit code 1: Could not access KVM kernel module"
    );
}

/// Runner whose commands never finish.
struct HangingRunner;

impl RemoteRunner for HangingRunner {
    fn exec<'a>(&'a self, _command: &'a str) -> RemoteFuture<'a> {
        Box::pin(async {
            std::future::pending::<()>().await;
            Ok::<_, SshError>(CommandResult::default())
        })
    }
}

impl InteractiveRunner for HangingRunner {
    fn exec_interactive<'a>(
        &'a self,
        command: &'a str,
        _input: StdinSource<'a>,
    ) -> RemoteFuture<'a> {
        self.exec(command)
    }

    fn host(&self) -> &str {
        "198.51.100.7"
    }
}

#[rstest]
#[tokio::test]
async fn installer_is_bounded_by_its_timeout(release: NetbsdRelease) {
    let err = Installer::new(&HangingRunner, release)
        .with_timeout(Duration::from_millis(20))
        .install_via_qemu("/tmp/netbsd.iso", "/dev/sda", None)
        .await
        .expect_err("hung installer should time out");

    assert!(
        matches!(err, StepError::DeadlineExceeded { ref operation, .. } if operation == "run qemu install"),
        "got {err:?}"
    );
    assert_eq!(
        err.to_string(),
        "run qemu install on 198.51.100.7 did not finish within 0s (last state: installer still running)"
    );
}

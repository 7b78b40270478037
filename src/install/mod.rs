//! NetBSD installation from the rescue system.
//!
//! The rescue host downloads the serial-console boot ISO and boots it under
//! QEMU with the target disk attached, so the installer writes straight to
//! the server's own block device.

use std::time::Duration;

use tokio::time::timeout;
use tracing::info;

use crate::remote::{InteractiveRunner, StepError, run_checked};
use crate::shell::{escape_argument, escape_path};

/// Upper bound on a single QEMU installer run.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// NetBSD release to install.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetbsdRelease {
    /// Release version, e.g. `10.1`.
    pub version: String,
    /// Machine architecture, e.g. `amd64`.
    pub arch: String,
}

impl NetbsdRelease {
    /// CDN URL of the serial-console boot ISO.
    #[must_use]
    pub fn iso_url(&self) -> String {
        format!(
            "https://cdn.netbsd.org/pub/NetBSD/NetBSD-{}/{}/installation/cdrom/boot-com.iso",
            self.version, self.arch
        )
    }

    /// File name the ISO is stored under on the rescue host.
    #[must_use]
    pub fn iso_file_name(&self) -> String {
        format!("netbsd-{}-{}.iso", self.version, self.arch)
    }
}

/// Drives the NetBSD installer through an [`InteractiveRunner`].
#[derive(Debug)]
pub struct Installer<'r, R: ?Sized> {
    runner: &'r R,
    release: NetbsdRelease,
    install_timeout: Duration,
}

impl<'r, R: InteractiveRunner + ?Sized> Installer<'r, R> {
    /// Creates an installer for `release`.
    #[must_use]
    pub const fn new(runner: &'r R, release: NetbsdRelease) -> Self {
        Self {
            runner,
            release,
            install_timeout: INSTALL_TIMEOUT,
        }
    }

    /// Overrides the installer time budget.
    #[must_use]
    pub const fn with_timeout(mut self, install_timeout: Duration) -> Self {
        self.install_timeout = install_timeout;
        self
    }

    /// Downloads the boot ISO into `dest_dir`, returning its remote path.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidPath`] when `dest_dir` fails validation
    /// and [`StepError::Command`] when `wget` fails.
    pub async fn download_iso(&self, dest_dir: &str) -> Result<String, StepError> {
        let operation = "download iso";
        let iso_path = format!(
            "{}/{}",
            dest_dir.trim_end_matches('/'),
            self.release.iso_file_name()
        );
        let escaped_path =
            escape_path(&iso_path).map_err(|_| StepError::invalid_path(operation, &iso_path))?;
        let url = self.release.iso_url();
        let escaped_url = escape_argument(&url);
        run_checked(
            self.runner,
            operation,
            &format!("wget -O {escaped_path} {escaped_url}"),
            &[],
        )
        .await?;
        info!(path = %iso_path, %url, "installer iso downloaded");
        Ok(iso_path)
    }

    /// Boots `iso_path` under QEMU with `device` as the target disk.
    ///
    /// When `answers` is given it is streamed to the serial console to drive
    /// the installer menus.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::DeadlineExceeded`] when the installer runs past
    /// its time budget, [`StepError::InvalidPath`] for unsafe paths, and
    /// [`StepError::Command`] when QEMU exits non-zero.
    pub async fn install_via_qemu(
        &self,
        iso_path: &str,
        device: &str,
        answers: Option<&str>,
    ) -> Result<(), StepError> {
        let operation = "run qemu install";
        let iso = escape_path(iso_path).map_err(|_| StepError::invalid_path(operation, iso_path))?;
        let disk = escape_path(device).map_err(|_| StepError::invalid_path(operation, device))?;
        let command = format!(
            "qemu-system-x86_64 -enable-kvm -m 4G -smp 4 -cdrom {iso} -boot d \
             -drive file={disk},format=raw -nographic -serial mon:stdio"
        );

        info!(device, iso = iso_path, "starting installer");
        let run = async {
            match answers {
                Some(script) => {
                    let mut input = script.as_bytes();
                    self.runner
                        .exec_interactive(&command, &mut input)
                        .await
                        .map_err(|source| StepError::Exec {
                            operation: operation.to_owned(),
                            source,
                        })
                }
                None => run_checked(self.runner, operation, &command, &[]).await,
            }
        };

        let result = timeout(self.install_timeout, run)
            .await
            .map_err(|_| StepError::DeadlineExceeded {
                operation: operation.to_owned(),
                host: self.runner.host().to_owned(),
                timeout_secs: self.install_timeout.as_secs(),
                last_state: String::from("installer still running"),
            })??;
        if !result.is_success() {
            return Err(StepError::Command {
                operation: operation.to_owned(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_owned(),
            });
        }
        info!(device, "installation finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests;

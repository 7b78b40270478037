//! Artifact extraction from the installed disk.
//!
//! The artifact stays on the rescue host; size and checksum are computed
//! remotely.

use tracing::info;

use crate::remote::{RemoteRunner, StepError, run_checked};
use crate::shell::escape_path;

/// Extracted image on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildArtifact {
    /// Remote path of the image.
    pub remote_path: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 digest.
    pub checksum: String,
}

/// Artifact formats the extractor can produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArtifactKind {
    /// `xz`-compressed copy of the whole block device.
    RawImage,
    /// Bootable ISO built from the first partition.
    Iso,
}

impl ArtifactKind {
    /// File name the artifact is written under.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::RawImage => "blackbsd.img.xz",
            Self::Iso => "blackbsd.iso",
        }
    }
}

/// Returns the path of partition `number` on `device`.
///
/// Devices whose name ends in a digit take a `p` separator.
///
/// # Examples
///
/// ```
/// # use blackbsd::extract::partition_path;
/// assert_eq!(partition_path("/dev/sda", 1), "/dev/sda1");
/// assert_eq!(partition_path("/dev/nvme0n1", 1), "/dev/nvme0n1p1");
/// ```
#[must_use]
pub fn partition_path(device: &str, number: u32) -> String {
    if device.chars().next_back().is_some_and(|ch| ch.is_ascii_digit()) {
        format!("{device}p{number}")
    } else {
        format!("{device}{number}")
    }
}

fn safe_path(operation: &str, path: &str) -> Result<String, StepError> {
    escape_path(path).map_err(|_| StepError::invalid_path(operation, path))
}

/// Produces artifacts from a target block device.
#[derive(Debug)]
pub struct Extractor<'r, R: ?Sized> {
    runner: &'r R,
    device: String,
}

impl<'r, R: RemoteRunner + ?Sized> Extractor<'r, R> {
    /// Creates an extractor reading from `device`.
    #[must_use]
    pub fn new(runner: &'r R, device: impl Into<String>) -> Self {
        Self {
            runner,
            device: device.into(),
        }
    }

    /// Returns the device this extractor reads from.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Writes an `xz`-compressed copy of the device to `output_path`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidPath`] when either path fails validation
    /// and [`StepError::Command`] when either side of the pipeline exits
    /// non-zero.
    pub async fn extract_raw_image(&self, output_path: &str) -> Result<(), StepError> {
        let operation = "extract raw image";
        let device = safe_path(operation, &self.device)?;
        let output = safe_path(operation, output_path)?;
        let command =
            format!("set -o pipefail; dd if={device} bs=4M status=progress | xz -T0 -9 > {output}");
        run_checked(self.runner, operation, &command, &[]).await?;
        info!(device = %self.device, output = output_path, "raw image extracted");
        Ok(())
    }

    /// Mounts the first partition read-only at `mount_point`, builds a
    /// bootable ISO at `output_path`, and unmounts.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidPath`] when any path fails validation and
    /// [`StepError::Command`] naming the failing step otherwise.
    pub async fn extract_iso(&self, mount_point: &str, output_path: &str) -> Result<(), StepError> {
        let partition = safe_path("mount device", &partition_path(&self.device, 1))?;
        let mount = safe_path("mount device", mount_point)?;
        let output = safe_path("create ISO", output_path)?;

        run_checked(
            self.runner,
            "mount device",
            &format!("mount -r {partition} {mount}"),
            &[],
        )
        .await?;
        run_checked(
            self.runner,
            "create ISO",
            &format!("xorriso -as mkisofs -o {output} -b boot/cdboot -no-emul-boot {mount}"),
            &[],
        )
        .await?;
        run_checked(self.runner, "unmount device", &format!("umount {mount}"), &[]).await?;

        info!(device = %self.device, output = output_path, "iso extracted");
        Ok(())
    }

    /// Returns the size of a remote file in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Parse`] when `stat` prints something other than
    /// an integer.
    pub async fn image_size(&self, image_path: &str) -> Result<u64, StepError> {
        let operation = "get image size";
        let path = safe_path(operation, image_path)?;
        let result = run_checked(self.runner, operation, &format!("stat -c %s {path}"), &[]).await?;
        let trimmed = result.stdout.trim();
        trimmed.parse().map_err(|_| StepError::Parse {
            operation: operation.to_owned(),
            output: trimmed.to_owned(),
        })
    }

    /// Returns the SHA-256 digest of a remote file.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Parse`] when `sha256sum` prints nothing.
    pub async fn checksum(&self, image_path: &str) -> Result<String, StepError> {
        let operation = "compute checksum";
        let path = safe_path(operation, image_path)?;
        let result = run_checked(self.runner, operation, &format!("sha256sum {path}"), &[]).await?;
        result
            .stdout
            .split_whitespace()
            .next()
            .map(str::to_owned)
            .ok_or_else(|| StepError::Parse {
                operation: operation.to_owned(),
                output: result.stdout.clone(),
            })
    }

    /// Extracts an artifact of `kind` to `output_path` and measures it.
    ///
    /// # Errors
    ///
    /// Returns the first [`StepError`] from extraction or measurement.
    pub async fn extract(
        &self,
        kind: ArtifactKind,
        mount_point: &str,
        output_path: &str,
    ) -> Result<BuildArtifact, StepError> {
        match kind {
            ArtifactKind::RawImage => self.extract_raw_image(output_path).await?,
            ArtifactKind::Iso => self.extract_iso(mount_point, output_path).await?,
        }
        let size_bytes = self.image_size(output_path).await?;
        let checksum = self.checksum(output_path).await?;
        info!(path = output_path, size_bytes, checksum = %checksum, "artifact measured");
        Ok(BuildArtifact {
            remote_path: output_path.to_owned(),
            size_bytes,
            checksum,
        })
    }
}

//! Whole-file transfer through `scp`.

use std::ffi::OsString;

use camino::Utf8Path;
use tracing::info;

use crate::shell::validate_path;

use super::{ProcessRunner, SshClient, SshError};

impl<R: ProcessRunner> SshClient<R> {
    fn scp_args(&self, source: OsString, destination: OsString) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-P"),
            OsString::from(self.settings.port.to_string()),
        ];
        args.extend(self.common_options());
        args.push(source);
        args.push(destination);
        args
    }

    fn remote_spec(&self, remote_path: &str) -> OsString {
        OsString::from(format!(
            "{}@{}:{remote_path}",
            self.settings.user,
            self.scp_host()
        ))
    }

    async fn transfer(
        &self,
        operation: &'static str,
        remote_path: &str,
        args: Vec<OsString>,
    ) -> Result<(), SshError> {
        let output = self
            .runner
            .run(&self.settings.scp_bin, &args, None)
            .await
            .map_err(|err| self.spawn_error(&self.settings.scp_bin, &err))?;
        match output.code {
            Some(0) => {
                info!(host = %self.host, path = remote_path, operation, "file transferred");
                Ok(())
            }
            Some(exit_code) => Err(SshError::Transfer {
                operation,
                path: remote_path.to_owned(),
                host: self.host.clone(),
                exit_code,
                stderr: output.stderr.trim().to_owned(),
            }),
            None => Err(SshError::Terminated {
                host: self.host.clone(),
            }),
        }
    }

    /// Copies `local_path` to `remote_path`, overwriting the destination.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidPath`] before any connection when
    /// `remote_path` fails validation, and [`SshError::Transfer`] when
    /// `scp` exits non-zero.
    pub async fn upload_file(&self, local_path: &Utf8Path, remote_path: &str) -> Result<(), SshError> {
        validate_path(remote_path)?;
        let args = self.scp_args(
            OsString::from(local_path.as_str()),
            self.remote_spec(remote_path),
        );
        self.transfer("upload", remote_path, args).await
    }

    /// Copies `remote_path` to `local_path`, overwriting the destination.
    ///
    /// # Errors
    ///
    /// Returns [`SshError::InvalidPath`] before any connection when
    /// `remote_path` fails validation, and [`SshError::Transfer`] when
    /// `scp` exits non-zero.
    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Utf8Path,
    ) -> Result<(), SshError> {
        validate_path(remote_path)?;
        let args = self.scp_args(
            self.remote_spec(remote_path),
            OsString::from(local_path.as_str()),
        );
        self.transfer("download", remote_path, args).await
    }
}

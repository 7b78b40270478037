//! Local process execution behind a substitutable runner.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Boxed future returned by [`ProcessRunner::run`].
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = io::Result<ProcessOutput>> + Send + 'a>>;

/// Reader streamed to a child's standard input.
pub type StdinSource<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Captured outcome of a local process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Runs local programs such as `ssh` and `scp`.
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args`, optionally streaming `stdin` to it, and
    /// captures its output.
    ///
    /// Dropping the returned future must stop the child process.
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [OsString],
        stdin: Option<StdinSource<'a>>,
    ) -> ProcessFuture<'a>;
}

/// [`ProcessRunner`] spawning real processes through Tokio.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [OsString],
        stdin: Option<StdinSource<'a>>,
    ) -> ProcessFuture<'a> {
        Box::pin(async move {
            let mut command = Command::new(program);
            command
                .args(args)
                .stdin(if stdin.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = command.spawn()?;
            let stdin_pipe = child.stdin.take();
            let feed = async move {
                let (Some(source), Some(mut pipe)) = (stdin, stdin_pipe) else {
                    return;
                };
                if let Err(err) = tokio::io::copy(source, &mut pipe).await {
                    debug!(program, error = %err, "stdin stream closed early");
                }
                if let Err(err) = pipe.shutdown().await {
                    debug!(program, error = %err, "failed to close stdin");
                }
            };
            let ((), waited) = tokio::join!(feed, child.wait_with_output());
            let output = waited?;

            Ok::<_, io::Error>(ProcessOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        })
    }
}

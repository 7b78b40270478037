//! Binary entry point for the BlackBSD builder.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use blackbsd::config::{BuildConfig, CONFIG_PATH_ENV_VAR, ConfigError};
use blackbsd::{
    BuildInfo, BuildPipeline, HetznerClient, HetznerError, Janitor, JanitorError, PipelineError,
    SshConnector, logging,
};

mod cli;

use cli::{BuildCommand, Cli, Command};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] HetznerError),
    #[error(transparent)]
    Janitor(#[from] JanitorError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("{failed} server(s) could not be destroyed")]
    DestroyIncomplete { failed: usize },
    #[error("interrupted")]
    Interrupted,
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(path) = &cli.config {
        // SAFETY: the runtime is not running yet, so no other thread reads
        // the environment.
        unsafe { env::set_var(CONFIG_PATH_ENV_VAR, path) };
    }

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
        .and_then(|runtime| runtime.block_on(dispatch(cli.command)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    if let Command::Version = command {
        return print_version(&mut io::stdout().lock());
    }

    let config = BuildConfig::load_without_cli_args()?;
    logging::init(&config.log_level);

    match command {
        Command::Status => interruptible(status(&config)).await,
        Command::Destroy => interruptible(destroy(&config)).await,
        Command::Build(args) => build(&config, &args).await,
        Command::Version => Ok(()),
    }
}

fn print_version(out: &mut impl Write) -> Result<(), CliError> {
    writeln!(out, "{}", BuildInfo::current())?;
    Ok(())
}

async fn interruptible<F>(work: F) -> Result<(), CliError>
where
    F: Future<Output = Result<(), CliError>>,
{
    tokio::select! {
        outcome = work => outcome,
        () = shutdown_signal() => Err(CliError::Interrupted),
    }
}

async fn status(config: &BuildConfig) -> Result<(), CliError> {
    let token = config.require_token()?;
    let janitor = Janitor::new(HetznerClient::new(token)?);
    janitor.print_status(&mut io::stdout()).await?;
    Ok(())
}

async fn destroy(config: &BuildConfig) -> Result<(), CliError> {
    let token = config.require_token()?;
    let janitor = Janitor::new(HetznerClient::new(token)?);
    let summary = janitor.destroy_all(&mut io::stdout()).await?;
    if summary.is_clean() {
        Ok(())
    } else {
        Err(CliError::DestroyIncomplete {
            failed: summary.failed,
        })
    }
}

async fn build(config: &BuildConfig, args: &BuildCommand) -> Result<(), CliError> {
    config.validate()?;
    let plan = config.build_plan(args.keep_server)?;
    let connector = SshConnector::new(
        config.private_key_path().into_string(),
        config.ssh_settings(),
    );
    let pipeline = BuildPipeline::new(
        HetznerClient::new(config.require_token()?)?,
        connector,
        plan,
    );

    let report = pipeline.run_until(shutdown_signal()).await?;
    info!(server_id = report.server_id, destroyed = report.destroyed, "build complete");

    let mut out = io::stdout().lock();
    writeln!(out, "Built on {} ({}).", report.server_name, report.server_id)?;
    for artifact in &report.artifacts {
        writeln!(
            out,
            "  {}  {} bytes  sha256:{}",
            artifact.remote_path, artifact.size_bytes, artifact.checksum
        )?;
    }
    if !report.destroyed {
        writeln!(out, "Server kept; remove it with `blackbsd destroy`.")?;
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            let _interrupt = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _interrupt = tokio::signal::ctrl_c().await;
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
    if let CliError::Pipeline(pipeline) = err
        && let Some(server_id) = pipeline.server_id()
    {
        writeln!(
            target,
            "server {server_id} was left in place; inspect it or run `blackbsd destroy`"
        )
        .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbsd::pipeline::Stage;

    #[test]
    fn version_prints_display_version() {
        let mut buf = Vec::new();
        print_version(&mut buf).expect("version should print");
        let rendered = String::from_utf8(buf).expect("utf8");
        assert_eq!(rendered, format!("{}\n", BuildInfo::current().display_version()));
    }

    #[test]
    fn write_error_points_at_leftover_server() {
        let mut buf = Vec::new();
        let err = CliError::Pipeline(PipelineError::Cancelled {
            stage: Stage::Install,
            server_id: Some(42),
        });
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.starts_with("build cancelled during install stage\n"));
        assert!(rendered.contains("server 42 was left in place"), "rendered: {rendered}");
    }

    #[test]
    fn write_error_without_server_is_single_line() {
        let mut buf = Vec::new();
        write_error(&mut buf, &CliError::DestroyIncomplete { failed: 2 });
        let rendered = String::from_utf8(buf).expect("utf8");
        assert_eq!(rendered, "2 server(s) could not be destroyed\n");
    }

    #[test]
    fn cli_parses_build_flags_and_config() {
        let cli = Cli::try_parse_from(["blackbsd", "-c", "custom.toml", "build", "--keep-server"])
            .expect("arguments should parse");
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        assert!(matches!(
            cli.command,
            Command::Build(BuildCommand { keep_server: true })
        ));
    }
}

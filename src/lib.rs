//! Core library for the BlackBSD image builder.
//!
//! A build provisions an ephemeral Hetzner Cloud server, boots it into the
//! rescue system, installs NetBSD onto its disk under QEMU, customizes the
//! result, and extracts a raw or ISO image before deleting the server.
//!
//! Every remote command is a string built through [`shell`], executed over
//! the system `ssh` client by [`ssh::SshClient`], and consumed by the
//! install, customize, and extract steps only through
//! [`remote::RemoteRunner`].

pub mod config;
pub mod customize;
pub mod extract;
pub mod hetzner;
pub mod install;
pub mod janitor;
pub mod logging;
pub mod pipeline;
pub mod remote;
pub mod retry;
pub mod shell;
pub mod ssh;
pub mod test_support;
pub mod version;

pub use config::{BuildConfig, ConfigError};
pub use customize::{Branding, Customizer};
pub use extract::{ArtifactKind, BuildArtifact, Extractor};
pub use hetzner::{CloudApi, HetznerClient, HetznerError, HttpCloudApi, ManagedServer};
pub use install::{Installer, NetbsdRelease};
pub use janitor::{DestroySummary, Janitor, JanitorError};
pub use pipeline::{
    BuildPipeline, BuildPlan, BuildReport, Connector, PipelineError, RemoteSession, SshConnector,
    Stage,
};
pub use remote::{CommandResult, InteractiveRunner, RemoteRunner, StepError};
pub use retry::{Backoff, RetryError};
pub use shell::{InvalidPath, escape_argument, validate_path};
pub use ssh::{SshClient, SshError};
pub use version::BuildInfo;

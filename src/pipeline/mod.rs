//! Build pipeline sequencer.
//!
//! A build walks one server through a fixed sequence of stages:
//!
//! 1. `provision`: register the SSH key and create the server.
//! 2. `await-running`: poll until the server reports `running`.
//! 3. `enable-rescue`: enable rescue mode, reset into it, and wait for SSH.
//! 4. `install`: download the NetBSD ISO and run the installer under QEMU.
//! 5. `customize`: mount the installed root, then apply branding,
//!    networking, and optional packages inside it.
//! 6. `extract`: write each requested artifact and measure it.
//! 7. `destroy`: delete the server unless the plan keeps it.
//!
//! Every stage is fatal. A failure stops the build and leaves the server in
//! place for inspection; teardown is only ever the explicit final stage or
//! the `destroy` command.

mod session;

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::customize::{Branding, Customizer};
use crate::extract::{ArtifactKind, BuildArtifact, Extractor, partition_path};
use crate::hetzner::{
    CloudApi, HetznerClient, HetznerError, ManagedServer, ServerSpec, ServerStatus,
};
use crate::install::{INSTALL_TIMEOUT, Installer, NetbsdRelease};
use crate::remote::StepError;
use crate::ssh::SshError;

pub use session::{Connector, ReadyFuture, RemoteSession, SshConnector};

/// Stages of a build, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Stage {
    /// Create the server.
    Provision,
    /// Wait for the server to run.
    AwaitRunning,
    /// Boot into rescue mode and wait for SSH.
    EnableRescue,
    /// Install NetBSD onto the target disk.
    Install,
    /// Apply branding, networking, and packages.
    Customize,
    /// Produce and measure artifacts.
    Extract,
    /// Delete the server.
    Destroy,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Self; 7] = [
        Self::Provision,
        Self::AwaitRunning,
        Self::EnableRescue,
        Self::Install,
        Self::Customize,
        Self::Extract,
        Self::Destroy,
    ];

    /// Returns the stage name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::AwaitRunning => "await-running",
            Self::EnableRescue => "enable-rescue",
            Self::Install => "install",
            Self::Customize => "customize",
            Self::Extract => "extract",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageFailure {
    /// The cloud provider call failed.
    #[error(transparent)]
    Provider(#[from] HetznerError),
    /// The SSH session could not be prepared or reached.
    #[error(transparent)]
    Connection(#[from] SshError),
    /// A remote step failed.
    #[error(transparent)]
    Step(#[from] StepError),
}

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that failed.
        stage: Stage,
        /// Server created by this build, if any.
        server_id: Option<u64>,
        /// Cause of the failure.
        #[source]
        source: Box<StageFailure>,
    },
    /// The build was cancelled before it finished.
    #[error("build cancelled during {stage} stage")]
    Cancelled {
        /// Stage that was running when the build was cancelled.
        stage: Stage,
        /// Server created by this build, if any.
        server_id: Option<u64>,
    },
}

impl PipelineError {
    /// Returns the stage the build stopped in.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Stage { stage, .. } | Self::Cancelled { stage, .. } => *stage,
        }
    }

    /// Returns the server left behind by the build, if one was created.
    #[must_use]
    pub const fn server_id(&self) -> Option<u64> {
        match self {
            Self::Stage { server_id, .. } | Self::Cancelled { server_id, .. } => *server_id,
        }
    }
}

/// Everything a build needs to know about the image it produces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildPlan {
    /// Server to create. SSH key IDs are filled in during provisioning.
    pub server: ServerSpec,
    /// Name under which the public key is registered with the provider.
    pub ssh_key_name: String,
    /// OpenSSH public key authorised on the rescue system.
    pub ssh_public_key: String,
    /// NetBSD release to install.
    pub release: NetbsdRelease,
    /// Console input streamed to the installer, if any.
    pub install_answers: Option<String>,
    /// Identity applied to the installed system.
    pub branding: Branding,
    /// Packages installed after branding.
    pub packages: Vec<String>,
    /// Block device the system is installed onto.
    pub target_device: String,
    /// Mount point used while building the ISO.
    pub mount_point: String,
    /// Mount point of the installed system during customization.
    pub target_root: String,
    /// Remote directory holding downloads and artifacts.
    pub work_dir: String,
    /// Artifacts to produce.
    pub outputs: Vec<ArtifactKind>,
    /// Leave the server running after a successful build.
    pub keep_server: bool,
}

impl BuildPlan {
    /// Remote path an artifact of `kind` is written to.
    #[must_use]
    pub fn output_path(&self, kind: ArtifactKind) -> String {
        format!("{}/{}", self.work_dir.trim_end_matches('/'), kind.file_name())
    }
}

/// Result of a completed build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildReport {
    /// Server the build ran on.
    pub server_id: u64,
    /// Name of that server.
    pub server_name: String,
    /// Artifacts left on the server's rescue filesystem.
    pub artifacts: Vec<BuildArtifact>,
    /// Whether the server was deleted at the end of the build.
    pub destroyed: bool,
}

#[derive(Clone, Copy, Debug)]
struct Progress {
    stage: Stage,
    server_id: Option<u64>,
}

/// Shared view of how far a build got, readable after cancellation.
#[derive(Debug)]
struct Tracker(Mutex<Progress>);

impl Tracker {
    const fn new() -> Self {
        Self(Mutex::new(Progress {
            stage: Stage::Provision,
            server_id: None,
        }))
    }

    fn get(&self) -> Progress {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, stage: Stage) {
        let mut progress = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        progress.stage = stage;
        info!(stage = %stage, server_id = ?progress.server_id, "stage started");
    }

    fn record_server(&self, server_id: u64) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .server_id = Some(server_id);
    }

    fn fail(&self, source: impl Into<StageFailure>) -> PipelineError {
        let progress = self.get();
        PipelineError::Stage {
            stage: progress.stage,
            server_id: progress.server_id,
            source: Box::new(source.into()),
        }
    }
}

/// Runs builds against a cloud API and an SSH connector.
#[derive(Debug)]
pub struct BuildPipeline<A: CloudApi, C> {
    client: HetznerClient<A>,
    connector: C,
    plan: BuildPlan,
    install_timeout: Duration,
}

impl<A: CloudApi, C: Connector> BuildPipeline<A, C> {
    /// Creates a pipeline for `plan`.
    #[must_use]
    pub const fn new(client: HetznerClient<A>, connector: C, plan: BuildPlan) -> Self {
        Self {
            client,
            connector,
            plan,
            install_timeout: INSTALL_TIMEOUT,
        }
    }

    /// Overrides the installer time budget.
    #[must_use]
    pub const fn with_install_timeout(mut self, install_timeout: Duration) -> Self {
        self.install_timeout = install_timeout;
        self
    }

    /// Returns the plan this pipeline executes.
    #[must_use]
    pub const fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Stage`] naming the first stage that failed.
    pub async fn run(&self) -> Result<BuildReport, PipelineError> {
        self.run_stages(&Tracker::new()).await
    }

    /// Runs every stage in order, aborting when `cancel` resolves.
    ///
    /// Cancellation drops the in-flight stage, which terminates any running
    /// `ssh`/`scp` process and abandons pending provider requests.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] when `cancel` wins, otherwise the
    /// same errors as [`BuildPipeline::run`].
    pub async fn run_until<F>(&self, cancel: F) -> Result<BuildReport, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let tracker = Tracker::new();
        tokio::select! {
            biased;
            () = cancel => {
                let progress = tracker.get();
                warn!(stage = %progress.stage, server_id = ?progress.server_id, "build cancelled");
                Err(PipelineError::Cancelled {
                    stage: progress.stage,
                    server_id: progress.server_id,
                })
            }
            outcome = self.run_stages(&tracker) => outcome,
        }
    }

    async fn run_stages(&self, tracker: &Tracker) -> Result<BuildReport, PipelineError> {
        tracker.enter(Stage::Provision);
        let (server, ssh_key_ids) = self.provision(tracker).await?;

        tracker.enter(Stage::AwaitRunning);
        let running = self
            .client
            .wait_for_server_status(server.id, ServerStatus::Running)
            .await
            .map_err(|err| tracker.fail(err))?;

        tracker.enter(Stage::EnableRescue);
        let session = self
            .enter_rescue(&running, &ssh_key_ids)
            .await
            .map_err(|err| tracker.fail(err))?;

        tracker.enter(Stage::Install);
        self.install(&session).await.map_err(|err| tracker.fail(err))?;

        tracker.enter(Stage::Customize);
        self.customize(&session).await.map_err(|err| tracker.fail(err))?;

        tracker.enter(Stage::Extract);
        let artifacts = self.extract(&session).await.map_err(|err| tracker.fail(err))?;

        tracker.enter(Stage::Destroy);
        let destroyed = if self.plan.keep_server {
            info!(server_id = running.id, "keeping server");
            false
        } else {
            self.client
                .delete_server(&running)
                .await
                .map_err(|err| tracker.fail(err))?
        };

        info!(server_id = running.id, artifacts = artifacts.len(), "build finished");
        Ok(BuildReport {
            server_id: running.id,
            server_name: running.name,
            artifacts,
            destroyed,
        })
    }

    async fn provision(&self, tracker: &Tracker) -> Result<(ManagedServer, Vec<u64>), PipelineError> {
        let key = self
            .client
            .ensure_ssh_key(&self.plan.ssh_key_name, &self.plan.ssh_public_key)
            .await
            .map_err(|err| tracker.fail(err))?;
        let mut spec = self.plan.server.clone();
        if !spec.ssh_key_ids.contains(&key.id) {
            spec.ssh_key_ids.push(key.id);
        }
        let server = self
            .client
            .create_server(&spec)
            .await
            .map_err(|err| tracker.fail(err))?;
        tracker.record_server(server.id);
        Ok((server, spec.ssh_key_ids))
    }

    async fn enter_rescue(
        &self,
        server: &ManagedServer,
        ssh_key_ids: &[u64],
    ) -> Result<C::Session, StageFailure> {
        let credentials = self
            .client
            .enable_rescue(server, ssh_key_ids)
            .await
            .into_result()?;
        self.client.wait_for_action(&credentials.action).await?;
        let reset = self.client.reset(server).await?;
        self.client.wait_for_action(&reset).await?;

        let rescued = self
            .client
            .get_server(server.id)
            .await?
            .ok_or(HetznerError::ServerNotFound {
                server_id: server.id,
            })?;
        let address = rescued.require_ipv4()?;
        let session = self.connector.connect(&address.to_string())?;
        session.wait_for_ready().await?;
        info!(server_id = server.id, host = %address, "rescue system reachable");
        Ok(session)
    }

    async fn install(&self, session: &C::Session) -> Result<(), StepError> {
        let installer = Installer::new(session, self.plan.release.clone())
            .with_timeout(self.install_timeout);
        let iso = installer.download_iso(&self.plan.work_dir).await?;
        installer
            .install_via_qemu(&iso, &self.plan.target_device, self.plan.install_answers.as_deref())
            .await
    }

    async fn customize(&self, session: &C::Session) -> Result<(), StepError> {
        let customizer = Customizer::new(session, self.plan.target_root.as_str());
        customizer
            .mount_target(&partition_path(&self.plan.target_device, 1))
            .await?;
        customizer.apply_branding(&self.plan.branding).await?;
        customizer.configure_networking().await?;
        customizer.install_packages(&self.plan.packages).await?;
        customizer.unmount_target().await
    }

    async fn extract(&self, session: &C::Session) -> Result<Vec<BuildArtifact>, StepError> {
        let extractor = Extractor::new(session, self.plan.target_device.as_str());
        let mut artifacts = Vec::with_capacity(self.plan.outputs.len());
        for kind in &self.plan.outputs {
            let path = self.plan.output_path(*kind);
            artifacts.push(
                extractor
                    .extract(*kind, &self.plan.mount_point, &path)
                    .await?,
            );
        }
        Ok(artifacts)
    }
}

//! Layered build configuration via `ortho-config`.
//!
//! Values merge defaults, `blackbsd.toml` (found through the usual discovery
//! order or `BLACKBSD_CONFIG_PATH`), and `BLACKBSD_*` environment variables.
//! `HCLOUD_TOKEN` overrides the configured API token.

use std::env;
use std::ffi::OsString;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::customize::{Branding, DEFAULT_SECURITY_TOOLS};
use crate::extract::ArtifactKind;
use crate::hetzner::{ServerSpec, generate_server_name};
use crate::install::NetbsdRelease;
use crate::pipeline::BuildPlan;
use crate::shell::validate_path;
use crate::ssh::{SshSettings, expand_tilde, read_to_string_ambient};

/// Environment variable overriding the configured API token.
pub const TOKEN_ENV_VAR: &str = "HCLOUD_TOKEN";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "BLACKBSD_CONFIG_PATH";

/// Hetzner locations a build may run in.
pub const VALID_LOCATIONS: [&str; 6] = ["fsn1", "nbg1", "hel1", "ash", "hil", "sin"];

/// Build settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BLACKBSD",
    discovery(
        app_name = "blackbsd",
        env_var = "BLACKBSD_CONFIG_PATH",
        config_file_name = "blackbsd.toml",
        dotfile_name = ".blackbsd.toml",
        project_file_name = "blackbsd.toml"
    )
)]
pub struct BuildConfig {
    /// Hetzner Cloud API token. `HCLOUD_TOKEN` takes precedence.
    #[ortho_config(default = String::new())]
    pub hcloud_token: String,
    /// Private key used for the rescue system. Supports `~/`.
    #[ortho_config(default = String::new())]
    pub ssh_key_path: String,
    /// Public half of the key; defaults to `<ssh_key_path>.pub`.
    pub ssh_public_key_path: Option<String>,
    /// Name the public key is registered under at the provider.
    #[ortho_config(default = "blackbsd".to_owned())]
    pub ssh_key_name: String,
    /// Hetzner server type.
    #[ortho_config(default = "cpx31".to_owned())]
    pub server_type: String,
    /// Hetzner location.
    #[ortho_config(default = "fsn1".to_owned())]
    pub location: String,
    /// Image the server boots before rescue mode.
    #[ortho_config(default = "ubuntu-24.04".to_owned())]
    pub image: String,
    /// Produce a bootable ISO. Unset means yes; see [`Self::wants_iso`].
    pub output_iso: Option<bool>,
    /// Produce an `xz`-compressed raw disk image.
    #[ortho_config(default = false)]
    pub output_raw: bool,
    /// Hostname of the built system.
    #[ortho_config(default = "blackbsd".to_owned())]
    pub hostname: String,
    /// Message of the day of the built system.
    #[ortho_config(default = "Welcome to BlackBSD".to_owned())]
    pub motd: String,
    /// Account created in the `wheel` group.
    #[ortho_config(default = "security".to_owned())]
    pub default_user: String,
    /// NetBSD release version.
    #[ortho_config(default = "10.1".to_owned())]
    pub netbsd_version: String,
    /// NetBSD machine architecture.
    #[ortho_config(default = "amd64".to_owned())]
    pub netbsd_arch: String,
    /// Local file streamed to the installer console.
    pub install_answers_path: Option<String>,
    /// Install the default security tool set.
    #[ortho_config(default = false)]
    pub install_security_tools: bool,
    /// Block device NetBSD is installed onto.
    #[ortho_config(default = "/dev/sda".to_owned())]
    pub target_device: String,
    /// Mount point used while building the ISO.
    #[ortho_config(default = "/mnt/iso".to_owned())]
    pub mount_point: String,
    /// Mount point of the installed system while it is customized.
    #[ortho_config(default = "/mnt/target".to_owned())]
    pub target_root: String,
    /// Remote directory for downloads and artifacts.
    #[ortho_config(default = "/tmp".to_owned())]
    pub work_dir: String,
    /// SSH port of the rescue system.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Log level used when `RUST_LOG` is unset.
    #[ortho_config(default = "info".to_owned())]
    pub log_level: String,
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A field holds a value the build cannot use.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
    /// A referenced local file could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying error message.
        message: String,
    },
    /// The `ortho-config` loader failed.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl BuildConfig {
    /// Loads configuration without parsing CLI arguments and applies the
    /// `HCLOUD_TOKEN` override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        let loaded = Self::load_from_iter([OsString::from("blackbsd")])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        Ok(loaded.with_token_override(env::var(TOKEN_ENV_VAR).ok()))
    }

    /// Replaces the token with `token` when it is non-empty.
    #[must_use]
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(value) = token.filter(|value| !value.trim().is_empty()) {
            self.hcloud_token = value;
        }
        self
    }

    /// Returns the API token, which every provider call needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the token is blank.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        let token = self.hcloud_token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "hcloud_token: set {TOKEN_ENV_VAR} or add hcloud_token to blackbsd.toml"
            )));
        }
        Ok(token)
    }

    /// Checks that the configuration can drive a build.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for an empty token or key path
    /// and [`ConfigError::Invalid`] for an unknown location, no enabled
    /// output, an unsafe remote path, or a missing key file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.require_token()?;
        if self.ssh_key_path.trim().is_empty() {
            return Err(ConfigError::MissingField(String::from(
                "ssh_key_path: set BLACKBSD_SSH_KEY_PATH or add ssh_key_path to blackbsd.toml",
            )));
        }
        if read_to_string_ambient(&self.private_key_path()).is_err() {
            return Err(ConfigError::Invalid {
                field: "ssh_key_path",
                message: format!("file does not exist: {}", self.ssh_key_path),
            });
        }
        if !VALID_LOCATIONS.contains(&self.location.as_str()) {
            return Err(ConfigError::Invalid {
                field: "location",
                message: format!(
                    "must be a valid Hetzner datacenter: {}",
                    VALID_LOCATIONS.join(", ")
                ),
            });
        }
        if !self.wants_iso() && !self.output_raw {
            return Err(ConfigError::Invalid {
                field: "output_iso/output_raw",
                message: String::from("at least one output format must be enabled"),
            });
        }
        for (field, path) in [
            ("target_device", &self.target_device),
            ("mount_point", &self.mount_point),
            ("target_root", &self.target_root),
            ("work_dir", &self.work_dir),
        ] {
            if validate_path(path).is_err() {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("unsafe remote path: {path:?}"),
                });
            }
        }
        Ok(())
    }

    /// Expanded path of the private key.
    #[must_use]
    pub fn private_key_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(expand_tilde(self.ssh_key_path.trim()))
    }

    /// Expanded path of the public key.
    #[must_use]
    pub fn public_key_path(&self) -> Utf8PathBuf {
        match &self.ssh_public_key_path {
            Some(path) => Utf8PathBuf::from(expand_tilde(path.trim())),
            None => Utf8PathBuf::from(format!("{}.pub", self.private_key_path())),
        }
    }

    /// SSH client settings for the rescue system.
    #[must_use]
    pub fn ssh_settings(&self) -> SshSettings {
        SshSettings {
            port: self.ssh_port,
            ssh_bin: self.ssh_bin.clone(),
            scp_bin: self.scp_bin.clone(),
            ..SshSettings::default()
        }
    }

    /// Whether a bootable ISO is produced; an unset `output_iso` means yes.
    #[must_use]
    pub const fn wants_iso(&self) -> bool {
        !matches!(self.output_iso, Some(false))
    }

    /// Artifacts the build produces, raw image first.
    #[must_use]
    pub fn outputs(&self) -> Vec<ArtifactKind> {
        let mut outputs = Vec::with_capacity(2);
        if self.output_raw {
            outputs.push(ArtifactKind::RawImage);
        }
        if self.wants_iso() {
            outputs.push(ArtifactKind::Iso);
        }
        outputs
    }

    /// Builds the plan for one build, reading the local key and answer
    /// files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the public key or answer file cannot
    /// be read.
    pub fn build_plan(&self, keep_server: bool) -> Result<BuildPlan, ConfigError> {
        let public_key_path = self.public_key_path();
        let ssh_public_key =
            read_to_string_ambient(&public_key_path).map_err(|message| ConfigError::Io {
                path: public_key_path.to_string(),
                message,
            })?;
        let install_answers = match &self.install_answers_path {
            Some(path) => {
                let answers_path = Utf8PathBuf::from(expand_tilde(path.trim()));
                Some(
                    read_to_string_ambient(&answers_path).map_err(|message| ConfigError::Io {
                        path: answers_path.to_string(),
                        message,
                    })?,
                )
            }
            None => None,
        };
        let packages = if self.install_security_tools {
            DEFAULT_SECURITY_TOOLS.map(str::to_owned).to_vec()
        } else {
            Vec::new()
        };

        Ok(BuildPlan {
            server: ServerSpec {
                name: generate_server_name(),
                server_type: self.server_type.clone(),
                image: self.image.clone(),
                location: self.location.clone(),
                ssh_key_ids: Vec::new(),
            },
            ssh_key_name: self.ssh_key_name.clone(),
            ssh_public_key: ssh_public_key.trim().to_owned(),
            release: NetbsdRelease {
                version: self.netbsd_version.clone(),
                arch: self.netbsd_arch.clone(),
            },
            install_answers,
            branding: Branding {
                hostname: self.hostname.clone(),
                motd: self.motd.clone(),
                default_user: self.default_user.clone(),
            },
            packages,
            target_device: self.target_device.clone(),
            mount_point: self.mount_point.clone(),
            target_root: self.target_root.clone(),
            work_dir: self.work_dir.clone(),
            outputs: self.outputs(),
            keep_server,
        })
    }
}


//! Post-install customization of the NetBSD target: branding, networking,
//! and packages.

use tracing::info;

use crate::remote::{RemoteRunner, StepError, run_checked};
use crate::shell::{escape_argument, escape_path};

/// Exit status `useradd` returns when the account already exists.
///
/// This is specific to the NetBSD `useradd` shipped with the target release;
/// other tools or versions may report the condition differently.
pub const USER_EXISTS_EXIT_CODE: i32 = 9;

/// Mount options for the installed root file system (NetBSD FFSv2).
pub const TARGET_MOUNT_OPTIONS: &str = "ufstype=ufs2,rw";

const RESOLVERS: &str = "nameserver 1.1.1.1\nnameserver 8.8.8.8\n";

/// Security tools installed when the build enables them.
pub const DEFAULT_SECURITY_TOOLS: [&str; 10] = [
    "nmap",
    "wireshark",
    "metasploit",
    "aircrack-ng",
    "snort",
    "hydra",
    "john",
    "tcpdump",
    "netcat",
    "socat",
];

/// Identity applied to the installed system.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Branding {
    /// Hostname written to `/etc/rc.conf`.
    pub hostname: String,
    /// Message of the day.
    pub motd: String,
    /// Account created in the `wheel` group.
    pub default_user: String,
}

/// Applies customizations to the installed system mounted at a target root.
///
/// Files are written below the root; `useradd` and `pkg_add` run inside it
/// through `chroot`.
#[derive(Debug)]
pub struct Customizer<'r, R: ?Sized> {
    runner: &'r R,
    root: String,
}

impl<'r, R: RemoteRunner + ?Sized> Customizer<'r, R> {
    /// Creates a customizer for the system mounted at `root`.
    #[must_use]
    pub fn new(runner: &'r R, root: impl Into<String>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    /// Returns the target root.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    fn escaped_root(&self, operation: &str) -> Result<String, StepError> {
        escape_path(&self.root).map_err(|_| StepError::invalid_path(operation, &self.root))
    }

    fn target_file(&self, operation: &str, relative: &str) -> Result<String, StepError> {
        self.escaped_root(operation)?;
        let path = format!("{}{relative}", self.root.trim_end_matches('/'));
        escape_path(&path).map_err(|_| StepError::invalid_path(operation, &path))
    }

    /// Mounts the installed root `partition` read-write at the target root.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidPath`] for an unsafe device or root and
    /// [`StepError::Command`] when the mount fails.
    pub async fn mount_target(&self, partition: &str) -> Result<(), StepError> {
        let operation = "mount target";
        let device =
            escape_path(partition).map_err(|_| StepError::invalid_path(operation, partition))?;
        let root = self.escaped_root(operation)?;
        let command =
            format!("mkdir -p {root} && mount -t ufs -o {TARGET_MOUNT_OPTIONS} {device} {root}");
        run_checked(self.runner, operation, &command, &[]).await?;
        info!(partition, root = %self.root, "target mounted");
        Ok(())
    }

    /// Unmounts the target root.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Command`] when `umount` fails.
    pub async fn unmount_target(&self) -> Result<(), StepError> {
        let operation = "unmount target";
        let root = self.escaped_root(operation)?;
        run_checked(self.runner, operation, &format!("umount {root}"), &[]).await?;
        Ok(())
    }

    /// Sets the hostname, writes the message of the day, and creates the
    /// default user.
    ///
    /// An existing user is accepted.
    ///
    /// # Errors
    ///
    /// Returns the first [`StepError`] encountered; later steps are skipped.
    pub async fn apply_branding(&self, branding: &Branding) -> Result<(), StepError> {
        let rc_conf = self.target_file("set hostname", "/etc/rc.conf")?;
        let hostname = format!(
            "echo hostname={} >> {rc_conf}",
            escape_argument(&branding.hostname)
        );
        run_checked(self.runner, "set hostname", &hostname, &[]).await?;

        let motd_file = self.target_file("write motd", "/etc/motd")?;
        let motd = format!(
            "printf %s {} > {motd_file}",
            escape_argument(&branding.motd)
        );
        run_checked(self.runner, "write motd", &motd, &[]).await?;

        let operation = format!("create user {}", branding.default_user);
        let root = self.escaped_root(&operation)?;
        let user = format!(
            "chroot {root} useradd -m -G wheel {}",
            escape_argument(&branding.default_user)
        );
        let result = run_checked(self.runner, &operation, &user, &[USER_EXISTS_EXIT_CODE]).await?;
        if result.exit_code == USER_EXISTS_EXIT_CODE {
            info!(user = %branding.default_user, "default user already exists");
        }

        info!(hostname = %branding.hostname, "branding applied");
        Ok(())
    }

    /// Enables DHCP and writes a static resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`StepError`] encountered.
    pub async fn configure_networking(&self) -> Result<(), StepError> {
        let rc_conf = self.target_file("enable dhcp", "/etc/rc.conf")?;
        run_checked(
            self.runner,
            "enable dhcp",
            &format!(r#"echo "dhcpcd=YES" >> {rc_conf}"#),
            &[],
        )
        .await?;
        let resolv_conf = self.target_file("write resolv.conf", "/etc/resolv.conf")?;
        let resolvers = format!("cat > {resolv_conf} << 'RESOLVEOF'\n{RESOLVERS}RESOLVEOF");
        run_checked(self.runner, "write resolv.conf", &resolvers, &[]).await?;
        info!("networking configured");
        Ok(())
    }

    /// Installs each package with its own `pkg_add` call, stopping at the
    /// first failure.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] naming the package that failed.
    pub async fn install_packages<S: AsRef<str>>(&self, packages: &[S]) -> Result<(), StepError> {
        if packages.is_empty() {
            return Ok(());
        }
        let root = self.escaped_root("install packages")?;
        for package in packages {
            let name = package.as_ref();
            let command = format!("chroot {root} pkg_add -v {}", escape_argument(name));
            run_checked(self.runner, &format!("install package {name}"), &command, &[]).await?;
            info!(package = name, "package installed");
        }
        Ok(())
    }
}

//! Configuration loading, validation, and build-plan derivation.

use blackbsd::config::{BuildConfig, ConfigError};
use blackbsd::extract::ArtifactKind;
use blackbsd::test_support::{EnvGuard, TEST_PRIVATE_KEY};
use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};
use rstest::*;
use tempfile::TempDir;

struct KeyPair {
    _dir: TempDir,
    private: Utf8PathBuf,
}

#[fixture]
fn key_pair() -> KeyPair {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path");
    let handle = Dir::open_ambient_dir(&root, ambient_authority()).expect("open temp dir");
    handle
        .write("id_ed25519", TEST_PRIVATE_KEY)
        .expect("write private key");
    handle
        .write("id_ed25519.pub", "ssh-ed25519 AAAAC3Nza builder@example\n")
        .expect("write public key");
    KeyPair {
        _dir: dir,
        private: root.join("id_ed25519"),
    }
}

fn valid_config(keys: &KeyPair) -> BuildConfig {
    BuildConfig {
        hcloud_token: String::from("token"),
        ssh_key_path: keys.private.to_string(),
        ssh_public_key_path: None,
        ssh_key_name: String::from("blackbsd"),
        server_type: String::from("cpx31"),
        location: String::from("fsn1"),
        image: String::from("ubuntu-24.04"),
        output_iso: None,
        output_raw: false,
        hostname: String::from("blackbsd"),
        motd: String::from("Welcome to BlackBSD"),
        default_user: String::from("security"),
        netbsd_version: String::from("10.1"),
        netbsd_arch: String::from("amd64"),
        install_answers_path: None,
        install_security_tools: false,
        target_device: String::from("/dev/sda"),
        mount_point: String::from("/mnt/iso"),
        target_root: String::from("/mnt/target"),
        work_dir: String::from("/tmp"),
        ssh_port: 22,
        ssh_bin: String::from("ssh"),
        scp_bin: String::from("scp"),
        log_level: String::from("info"),
    }
}

#[rstest]
fn valid_configuration_passes(key_pair: KeyPair) {
    assert_eq!(valid_config(&key_pair).validate(), Ok(()));
}

#[rstest]
fn missing_token_mentions_environment_variable(key_pair: KeyPair) {
    let cfg = BuildConfig {
        hcloud_token: String::from("  "),
        ..valid_config(&key_pair)
    };

    let err = cfg.validate().expect_err("token is required");
    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField, got {err:?}");
    };
    assert!(message.contains("HCLOUD_TOKEN"), "message: {message}");
}

#[rstest]
fn missing_key_path_is_rejected(key_pair: KeyPair) {
    let cfg = BuildConfig {
        ssh_key_path: String::new(),
        ..valid_config(&key_pair)
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::MissingField(_))));
}

#[rstest]
fn absent_key_file_is_rejected(key_pair: KeyPair) {
    let cfg = BuildConfig {
        ssh_key_path: key_pair.private.with_file_name("missing").to_string(),
        ..valid_config(&key_pair)
    };
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::Invalid {
            field: "ssh_key_path",
            ..
        })
    ));
}

#[rstest]
#[case("fsn1", true)]
#[case("ash", true)]
#[case("sin", true)]
#[case("fra1", false)]
#[case("", false)]
fn location_must_be_known(key_pair: KeyPair, #[case] location: &str, #[case] accepted: bool) {
    let cfg = BuildConfig {
        location: location.to_owned(),
        ..valid_config(&key_pair)
    };
    assert_eq!(cfg.validate().is_ok(), accepted);
}

#[rstest]
fn at_least_one_output_is_required(key_pair: KeyPair) {
    let cfg = BuildConfig {
        output_iso: Some(false),
        output_raw: false,
        ..valid_config(&key_pair)
    };
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::Invalid {
            field: "output_iso/output_raw",
            ..
        })
    ));
}

#[rstest]
#[case::device_injection("target_device")]
#[case::mount_traversal("mount_point")]
#[case::target_root_traversal("target_root")]
#[case::work_dir_substitution("work_dir")]
fn unsafe_remote_paths_are_rejected(key_pair: KeyPair, #[case] field: &'static str) {
    let mut cfg = valid_config(&key_pair);
    match field {
        "target_device" => cfg.target_device = String::from("/dev/sda; reboot"),
        "mount_point" => cfg.mount_point = String::from("/mnt/../etc"),
        "target_root" => cfg.target_root = String::from("/mnt/target/../../etc"),
        _ => cfg.work_dir = String::from("/tmp/$(whoami)"),
    }

    let err = cfg.validate().expect_err("unsafe path should fail");
    assert!(
        matches!(err, ConfigError::Invalid { field: got, .. } if got == field),
        "unexpected error: {err:?}"
    );
}

#[rstest]
fn token_override_wins_only_when_non_empty(key_pair: KeyPair) {
    let cfg = valid_config(&key_pair);
    assert_eq!(
        cfg.clone()
            .with_token_override(Some(String::from("from-env")))
            .hcloud_token,
        "from-env"
    );
    assert_eq!(
        cfg.clone().with_token_override(Some(String::new())).hcloud_token,
        "token"
    );
    assert_eq!(cfg.with_token_override(None).hcloud_token, "token");
}

#[rstest]
fn outputs_follow_toggles(key_pair: KeyPair) {
    let cfg = BuildConfig {
        output_raw: true,
        ..valid_config(&key_pair)
    };
    assert_eq!(cfg.outputs(), vec![ArtifactKind::RawImage, ArtifactKind::Iso]);
}

#[rstest]
#[case::unset(None, true)]
#[case::enabled(Some(true), true)]
#[case::disabled(Some(false), false)]
fn iso_output_defaults_to_enabled(
    key_pair: KeyPair,
    #[case] output_iso: Option<bool>,
    #[case] expected: bool,
) {
    let cfg = BuildConfig {
        output_iso,
        ..valid_config(&key_pair)
    };
    assert_eq!(cfg.wants_iso(), expected);
    assert_eq!(cfg.validate().is_ok(), expected);
}

#[rstest]
fn build_plan_reads_public_key_and_generates_name(key_pair: KeyPair) {
    let cfg = BuildConfig {
        install_security_tools: true,
        ..valid_config(&key_pair)
    };

    let plan = cfg.build_plan(true).expect("plan should build");

    assert_eq!(plan.ssh_public_key, "ssh-ed25519 AAAAC3Nza builder@example");
    assert!(plan.server.name.starts_with("blackbsd-builder-"));
    assert_eq!(plan.server.location, "fsn1");
    assert_eq!(plan.packages.len(), 10);
    assert!(plan.keep_server);
    assert_eq!(plan.install_answers, None);
    assert_eq!(plan.outputs, vec![ArtifactKind::Iso]);
}

#[rstest]
fn build_plan_reports_missing_public_key(key_pair: KeyPair) {
    let cfg = BuildConfig {
        ssh_public_key_path: Some(key_pair.private.with_file_name("absent.pub").to_string()),
        ..valid_config(&key_pair)
    };

    let err = cfg.build_plan(false).expect_err("public key is required");
    assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("absent.pub")));
}

#[rstest]
fn ssh_settings_carry_port_and_binaries(key_pair: KeyPair) {
    let cfg = BuildConfig {
        ssh_port: 2222,
        ssh_bin: String::from("/usr/bin/ssh"),
        ..valid_config(&key_pair)
    };
    let settings = cfg.ssh_settings();
    assert_eq!(settings.port, 2222);
    assert_eq!(settings.ssh_bin, "/usr/bin/ssh");
    assert_eq!(settings.user, "root");
}

#[tokio::test]
async fn load_applies_defaults_environment_and_token_override() {
    let _guard = EnvGuard::set_vars(&[
        ("BLACKBSD_CONFIG_PATH", None),
        ("BLACKBSD_SERVER_TYPE", Some("cx22")),
        ("BLACKBSD_HCLOUD_TOKEN", Some("from-config")),
        ("HCLOUD_TOKEN", Some("from-env")),
    ])
    .await;

    let cfg = BuildConfig::load_without_cli_args().expect("config should load");

    assert_eq!(cfg.server_type, "cx22");
    assert_eq!(cfg.hcloud_token, "from-env");
    assert_eq!(cfg.location, "fsn1");
    assert_eq!(cfg.motd, "Welcome to BlackBSD");
    assert_eq!(cfg.output_iso, None);
    assert!(cfg.wants_iso());
    assert!(!cfg.output_raw);
    assert_eq!(cfg.outputs(), vec![ArtifactKind::Iso]);
    assert_eq!(cfg.ssh_port, 22);
    assert_eq!(cfg.target_root, "/mnt/target");
}

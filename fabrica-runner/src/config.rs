//! Runner configuration
//!
//! Fixed command tables, the in-container environment and the few tunables
//! of a build run. A `RunnerConfig` is built once at startup and shared by
//! every run; nothing in it changes while builds are executing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// SSH client defaults pushed into every container
///
/// Keeps connections to git vendors alive over flaky container networking.
pub const DEFAULT_SSH_CONFIG: &str = "\
Host *
    StrictHostKeyChecking accept-new
    ServerAliveInterval 30
    ServerAliveCountMax 6
    TCPKeepAlive yes
    ConnectTimeout 60
";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Product prefix for image aliases and container names
    pub image_prefix: String,

    /// Local directory under which each build stages its artifact
    pub build_root: PathBuf,

    /// Retain the container of a failed build for inspection
    pub debug: bool,

    /// Default working directory inside the container
    pub home_dir: String,

    /// Environment injected into every in-container command
    pub environment: BTreeMap<String, String>,

    /// Commands run, in order, before cloning the repository
    pub prerequisites: Vec<Vec<String>>,

    /// Build tool invocation, run from the cloned repository
    pub build_command: Vec<String>,

    /// Connectivity probe repeated until the network is up
    pub network_check: Vec<String>,

    /// Substring of the probe output that proves connectivity
    pub network_marker: String,

    /// Line prefix the build tool uses to report the artifact filename
    pub artifact_marker: String,

    /// Contents of the container's `~/.ssh/config`
    pub ssh_config: String,

    /// Distros whose images are expected to be available
    pub distros: Vec<String>,
}

impl RunnerConfig {
    /// Creates a configuration with the standard command tables
    pub fn new(image_prefix: String, build_root: PathBuf) -> Self {
        Self {
            image_prefix,
            build_root,
            debug: false,
            home_dir: "/root".to_string(),
            environment: default_environment(),
            prerequisites: default_prerequisites(),
            build_command: vec!["snapcraft".to_string()],
            network_check: args(&["ping", "-c1", "8.8.8.8"]),
            network_marker: "PING".to_string(),
            artifact_marker: "Snapped ".to_string(),
            ssh_config: DEFAULT_SSH_CONFIG.to_string(),
            distros: args(&["xenial", "bionic", "focal"]),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables:
    /// - FABRICA_IMAGE_PREFIX (optional, default: fabrica)
    /// - FABRICA_BUILD_ROOT (optional, default: /var/lib/fabrica/builds)
    /// - FABRICA_DEBUG (optional, true/false/1/0, default: false)
    /// - FABRICA_SSH_CONFIG (optional, path of a file replacing the SSH defaults)
    /// - FABRICA_DISTROS (optional, comma-separated, default: xenial,bionic,focal)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let image_prefix = lookup("FABRICA_IMAGE_PREFIX").unwrap_or(defaults.image_prefix.clone());

        let build_root = lookup("FABRICA_BUILD_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.build_root.clone());

        let debug = match lookup("FABRICA_DEBUG") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                anyhow::anyhow!("FABRICA_DEBUG must be true or false, got '{}'", value)
            })?,
            None => false,
        };

        let ssh_config = match lookup("FABRICA_SSH_CONFIG") {
            Some(path) => std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read SSH config {}: {}", path, e))?,
            None => defaults.ssh_config.clone(),
        };

        let distros = match lookup("FABRICA_DISTROS") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.distros.clone(),
        };

        Ok(Self {
            image_prefix,
            build_root,
            debug,
            ssh_config,
            distros,
            ..defaults
        })
    }

    /// Enables or disables container retention on failure
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.image_prefix.is_empty() {
            anyhow::bail!("image_prefix cannot be empty");
        }

        if !self.home_dir.starts_with('/') {
            anyhow::bail!("home_dir must be an absolute path");
        }

        if self.build_command.is_empty() {
            anyhow::bail!("build_command cannot be empty");
        }

        if self.network_check.is_empty() || self.network_marker.is_empty() {
            anyhow::bail!("network_check and network_marker must be set");
        }

        if self.artifact_marker.trim().is_empty() {
            anyhow::bail!("artifact_marker cannot be empty");
        }

        if self.distros.is_empty() {
            anyhow::bail!("at least one distro must be configured");
        }

        Ok(())
    }

    /// Image alias the runtime resolves for a distro, e.g. `fabrica-focal`
    pub fn image_alias(&self, distro: &str) -> String {
        format!("{}-{}", self.image_prefix, distro)
    }

    /// Generates a container name unique to one run
    ///
    /// The build name is reduced to lowercase alphanumerics and dashes, and a
    /// random suffix keeps concurrent builds of the same project apart.
    pub fn container_name(&self, name: &str) -> String {
        let sanitized: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        let sanitized = sanitized.trim_matches('-');
        let suffix = Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", self.image_prefix, sanitized, &suffix[..8])
    }

    /// Local directory owned by one build
    pub fn artifact_dir(&self, build_id: Uuid) -> PathBuf {
        self.build_root.join(build_id.to_string())
    }

    /// Directory the repository is cloned into inside the container
    pub fn project_dir(&self, name: &str) -> String {
        Path::new(&self.home_dir)
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(
            "fabrica".to_string(),
            PathBuf::from("/var/lib/fabrica/builds"),
        )
    }
}

fn default_environment() -> BTreeMap<String, String> {
    [
        ("FLASH_KERNEL_SKIP", "true"),
        ("DEBIAN_FRONTEND", "noninteractive"),
        ("TERM", "xterm"),
        ("SNAPCRAFT_BUILD_ENVIRONMENT", "host"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_prerequisites() -> Vec<Vec<String>> {
    vec![
        args(&["apt", "update"]),
        args(&["apt", "-y", "upgrade"]),
        args(&["apt", "-y", "install", "build-essential"]),
        args(&["apt", "-y", "clean"]),
        args(&["snap", "install", "snapcraft", "--classic"]),
    ]
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

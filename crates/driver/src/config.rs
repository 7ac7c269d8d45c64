use crate::mounter::MounterType;
use mount_utils::FuseOptions;
use serde::Deserialize;
use std::{
  path::{Path, PathBuf},
  time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Failed to read config file {}: {1}", .0.display())]
  ReadError(PathBuf, String),

  #[error("Failed to parse config: {0}")]
  ParseError(String),

  #[error("Invalid config: {0}")]
  ValidationError(String),
}

/// Settings shared by the controller and the node plugin.
///
/// Every field has a default so an empty document is a valid config, apart
/// from `node_id` which a node plugin must set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriverConfig {
  /// Plugin name reported by `GetPluginInfo`.
  #[serde(default = "default_name")]
  pub name: String,

  #[serde(default = "default_version")]
  pub version: String,

  #[serde(default)]
  pub node_id: String,

  /// Region used when the request secrets do not name one. Also the only
  /// region CreateVolume can satisfy topology requirements for.
  #[serde(default = "default_region")]
  pub region: String,

  /// Endpoint used when the request secrets do not name one. Unset means
  /// the public AWS endpoint of `region`.
  #[serde(default)]
  pub endpoint: Option<String>,

  /// Used when a volume does not pick a mounter through its parameters.
  #[serde(default = "default_mounter")]
  pub default_mounter: MounterType,

  /// Where credential files for s3fs and s3backer are written.
  #[serde(default = "default_credentials_dir")]
  pub credentials_dir: PathBuf,

  /// Upper bound for every object store call.
  #[serde(default = "default_backend_timeout")]
  #[serde(with = "humantime_serde")]
  pub backend_timeout: Duration,

  #[serde(default = "default_poll_interval")]
  #[serde(with = "humantime_serde")]
  pub poll_interval: Duration,

  /// How long a FUSE target may take to show up as a mount point.
  #[serde(default = "default_mount_timeout")]
  #[serde(with = "humantime_serde")]
  pub mount_timeout: Duration,

  /// Mount helpers running longer than this are killed.
  #[serde(default = "default_command_timeout")]
  #[serde(with = "humantime_serde")]
  pub command_timeout: Option<Duration>,
}

fn default_name() -> String {
  "s3.csi.k8s.io".to_string()
}

fn default_version() -> String {
  env!("CARGO_PKG_VERSION").to_string()
}

fn default_region() -> String {
  "us-east-1".to_string()
}

fn default_mounter() -> MounterType {
  MounterType::S3fs
}

fn default_credentials_dir() -> PathBuf {
  PathBuf::from("/tmp/s3-csi")
}

fn default_backend_timeout() -> Duration {
  Duration::from_secs(10)
}

fn default_poll_interval() -> Duration {
  Duration::from_millis(10)
}

fn default_mount_timeout() -> Duration {
  Duration::from_secs(10)
}

fn default_command_timeout() -> Option<Duration> {
  Some(Duration::from_secs(30))
}

impl Default for DriverConfig {
  fn default() -> Self {
    DriverConfig {
      name: default_name(),
      version: default_version(),
      node_id: String::new(),
      region: default_region(),
      endpoint: None,
      default_mounter: default_mounter(),
      credentials_dir: default_credentials_dir(),
      backend_timeout: default_backend_timeout(),
      poll_interval: default_poll_interval(),
      mount_timeout: default_mount_timeout(),
      command_timeout: default_command_timeout(),
    }
  }
}

impl DriverConfig {
  /// Load configuration from a YAML file
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)
      .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

    Self::from_str(&content)
  }

  /// Parse configuration from a YAML string
  #[allow(clippy::should_implement_trait)]
  pub fn from_str(content: &str) -> Result<Self, ConfigError> {
    let config: DriverConfig =
      serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.is_empty() {
      return Err(ConfigError::ValidationError(
        "name must not be empty".to_string(),
      ));
    }

    if self.name.len() > 63 {
      return Err(ConfigError::ValidationError(format!(
        "name {:?} is longer than 63 characters",
        self.name
      )));
    }

    if self.poll_interval.as_nanos() == 0 {
      return Err(ConfigError::ValidationError(
        "poll_interval must be greater than zero".to_string(),
      ));
    }

    if self.mount_timeout < self.poll_interval {
      return Err(ConfigError::ValidationError(format!(
        "mount_timeout ({:?}) is shorter than poll_interval ({:?})",
        self.mount_timeout, self.poll_interval
      )));
    }

    Ok(())
  }

  /// Bounds handed to every FUSE mount.
  pub fn fuse_options(&self) -> FuseOptions {
    FuseOptions {
      poll_interval: self.poll_interval,
      mount_timeout: self.mount_timeout,
      command_timeout: self.command_timeout,
    }
  }
}

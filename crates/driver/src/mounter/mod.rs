//! FUSE backends that turn a bucket prefix into a local filesystem.

mod goofys;
mod rclone;
mod s3backer;
mod s3fs;

pub use goofys::GoofysMounter;
pub use rclone::RcloneMounter;
pub use s3backer::S3backerMounter;
pub use s3fs::S3fsMounter;

use crate::{meta::FsMeta, s3::S3Config};
use async_trait::async_trait;
use mount_utils::{FuseCommand, FuseOptions, HostMounter, MountError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use std::{
  fmt, fs,
  io::{self, Write},
  os::unix::{
    ffi::OsStrExt,
    fs::{OpenOptionsExt, PermissionsExt},
  },
  path::{Path, PathBuf},
  str::FromStr,
};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MounterType {
  S3fs,
  Goofys,
  S3backer,
  Rclone,
}

impl MounterType {
  pub const ALL: [MounterType; 4] = [
    MounterType::S3fs,
    MounterType::Goofys,
    MounterType::S3backer,
    MounterType::Rclone,
  ];

  /// Key used in storage class parameters and in [`FsMeta`].
  pub fn as_str(self) -> &'static str {
    match self {
      MounterType::S3fs => "s3fs",
      MounterType::Goofys => "goofys",
      MounterType::S3backer => "s3backer",
      MounterType::Rclone => "rclone",
    }
  }

  /// Parses an optional key, `None` and empty keys select `default`.
  pub fn from_key(key: Option<&str>, default: MounterType) -> Result<Self, MounterError> {
    match key.map(str::trim).filter(|key| !key.is_empty()) {
      None => Ok(default),
      Some(key) => key.parse(),
    }
  }
}

impl fmt::Display for MounterType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for MounterType {
  type Err = MounterError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    MounterType::ALL
      .iter()
      .copied()
      .find(|t| t.as_str() == s)
      .ok_or_else(|| MounterError::UnknownType(s.to_string()))
  }
}

#[derive(Debug, Error)]
pub enum MounterError {
  #[error("Unknown mounter type {0:?}")]
  UnknownType(String),

  #[error("Invalid mounter configuration: {0}")]
  InvalidConfig(String),

  #[error("Failed to write credentials to {}: {source}", .path.display())]
  Credentials { path: PathBuf, source: io::Error },

  #[error(transparent)]
  Mount(#[from] MountError),
}

impl From<MounterError> for tonic::Status {
  fn from(value: MounterError) -> Self {
    let code = match &value {
      MounterError::UnknownType(_) | MounterError::InvalidConfig(_) => tonic::Code::InvalidArgument,
      MounterError::Mount(MountError::Timeout { .. })
      | MounterError::Mount(MountError::CommandTimeout { .. }) => tonic::Code::DeadlineExceeded,
      MounterError::Credentials { .. } | MounterError::Mount(_) => tonic::Code::Internal,
    };

    tonic::Status::new(code, value.to_string())
  }
}

/// s3fs password file.
pub(crate) const PASSWD_EXTENSION: &str = "passwd";
/// s3backer access file.
pub(crate) const ACCESS_FILE_EXTENSION: &str = "s3backer";

const CREDENTIAL_EXTENSIONS: [&str; 2] = [PASSWD_EXTENSION, ACCESS_FILE_EXTENSION];

/// Credential file of `volume_id` mounted at `target`. Volumes sharing a
/// bucket, and targets sharing a volume, each get their own file.
pub fn credentials_path(
  credentials_dir: &Path,
  volume_id: &str,
  target: &Path,
  extension: &str,
) -> PathBuf {
  let target_digest = hex::encode(Sha224::digest(target.as_os_str().as_bytes()));
  credentials_dir.join(format!(
    "{}-{}.{}",
    volume_id.replace('/', "_"),
    &target_digest[..16],
    extension
  ))
}

/// Removes every credential file written for `volume_id` at `target`.
pub(crate) async fn remove_credentials_files(
  credentials_dir: &Path,
  volume_id: &str,
  target: &Path,
) -> Result<(), MounterError> {
  for extension in CREDENTIAL_EXTENSIONS.iter() {
    let path = credentials_path(credentials_dir, volume_id, target, extension);
    match tokio::fs::remove_file(&path).await {
      Ok(()) => debug!(path = %path.display(), "Removed credentials file"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => (),
      Err(source) => return Err(MounterError::Credentials { path, source }),
    }
  }
  Ok(())
}

/// Everything a mounter needs for one operation. Built fresh from the
/// volume, the request secrets and the driver config.
#[derive(Debug, Clone)]
pub struct MounterConfig {
  pub volume_id: String,
  pub meta: FsMeta,
  pub s3: S3Config,
  pub mounter: MounterType,
  /// Directory for credential files handed to s3fs and s3backer.
  pub credentials_dir: PathBuf,
  pub fuse: FuseOptions,
}

impl MounterConfig {
  pub fn bucket(&self) -> &str {
    &self.meta.bucket_name
  }

  /// Object key prefix the filesystem lives under.
  pub fn fs_root(&self) -> String {
    self.meta.fs_root()
  }

  /// Writes `accessKey:secretKey` to a file only the owner can read. The
  /// file is replaced whole, a helper never sees it half written.
  pub(crate) fn write_credentials_file(
    &self,
    target: &Path,
    extension: &str,
  ) -> Result<PathBuf, MounterError> {
    let path = credentials_path(&self.credentials_dir, &self.volume_id, target, extension);
    let content = format!("{}:{}", self.s3.access_key_id, self.s3.secret_access_key);
    write_private(&path, &content).map_err(|source| MounterError::Credentials {
      path: path.clone(),
      source,
    })?;
    Ok(path)
  }

  /// Credentials as environment variables for helpers that read them from
  /// there.
  pub(crate) fn credential_envs(&self, command: FuseCommand) -> FuseCommand {
    if !self.s3.has_credentials() {
      return command;
    }

    command
      .env("AWS_ACCESS_KEY_ID", &self.s3.access_key_id)
      .env("AWS_SECRET_ACCESS_KEY", &self.s3.secret_access_key)
  }
}

fn write_private(path: &Path, content: &str) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }

  let mut staged = path.as_os_str().to_owned();
  staged.push(".tmp");
  let staged = PathBuf::from(staged);

  let mut file = fs::OpenOptions::new()
    .write(true)
    .create(true)
    .truncate(true)
    .mode(0o600)
    .open(&staged)?;
  // The mode above only applies to new files.
  file.set_permissions(fs::Permissions::from_mode(0o600))?;
  file.write_all(content.as_bytes())?;
  file.sync_all()?;
  fs::rename(&staged, path)
}

/// A FUSE backend.
///
/// Staging prepares a volume once per node, mounting exposes it at a
/// publish target. Backends without a staging step mount straight onto the
/// target.
#[async_trait]
pub trait Mounter: Send + Sync + fmt::Debug {
  async fn stage(&self, stage_path: &Path) -> Result<(), MounterError>;

  async fn unstage(&self, stage_path: &Path) -> Result<(), MounterError>;

  /// `source` is the staging path, empty when the volume was not staged.
  async fn mount(&self, source: &Path, target: &Path) -> Result<(), MounterError>;
}

/// The mounter for `config.mounter`.
pub fn new_mounter(config: MounterConfig, host: HostMounter) -> Result<Box<dyn Mounter>, MounterError> {
  if config.bucket().is_empty() {
    return Err(MounterError::InvalidConfig("bucket name is empty".to_string()));
  }

  Ok(match config.mounter {
    MounterType::S3fs => Box::new(S3fsMounter::new(config, host)),
    MounterType::Goofys => Box::new(GoofysMounter::new(config, host)),
    MounterType::S3backer => Box::new(S3backerMounter::new(config, host)),
    MounterType::Rclone => Box::new(RcloneMounter::new(config, host)),
  })
}

/// Runs a FUSE helper and waits for `target` to show up as a mount point.
pub(crate) async fn fuse_mount(
  host: &HostMounter,
  command: FuseCommand,
  target: &Path,
  options: FuseOptions,
) -> Result<(), MounterError> {
  let program = command.program().to_string();
  host
    .fuse_mount(command, target, options)
    .await
    .map_err(|e| {
      error!(program = %program, target = %target.display(), "Mount failed: {}", e);
      e.into()
    })
}

pub(crate) async fn fuse_unmount(host: &HostMounter, target: &Path) -> Result<(), MounterError> {
  host.fuse_unmount(target).await?;
  Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use mount_utils::FakeMounter;
  use std::{sync::Arc, time::Duration};

  pub fn config(mounter: MounterType, credentials_dir: &Path) -> MounterConfig {
    MounterConfig {
      volume_id: "bucket/pvc-1".into(),
      meta: FsMeta {
        bucket_name: "bucket".into(),
        prefix: "pvc-1".into(),
        use_prefix: false,
        mounter: mounter.to_string(),
        fs_path: "csi-fs".into(),
        capacity_bytes: 2 << 30,
      },
      s3: S3Config {
        access_key_id: "AKIA".into(),
        secret_access_key: "hunter2".into(),
        region: "eu-west-1".into(),
        endpoint: Some("https://minio.example.com".into()),
      },
      mounter,
      credentials_dir: credentials_dir.to_path_buf(),
      fuse: FuseOptions {
        poll_interval: Duration::from_millis(1),
        mount_timeout: Duration::from_millis(50),
        command_timeout: None,
      },
    }
  }

  pub fn host() -> (HostMounter, Arc<FakeMounter>) {
    let fake = Arc::new(FakeMounter::new());
    (HostMounter::new(fake.clone()), fake)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mount_utils::FakeMounter;
  use std::sync::Arc;
  use test_case::test_case;

  #[test_case(None => MounterType::Rclone ; "missing key")]
  #[test_case(Some("") => MounterType::Rclone ; "empty key")]
  #[test_case(Some("s3fs") => MounterType::S3fs ; "s3fs")]
  #[test_case(Some("goofys") => MounterType::Goofys ; "goofys")]
  #[test_case(Some("s3backer") => MounterType::S3backer ; "s3backer")]
  #[test_case(Some("rclone") => MounterType::Rclone ; "rclone")]
  fn parses_keys(key: Option<&str>) -> MounterType {
    MounterType::from_key(key, MounterType::Rclone).unwrap()
  }

  #[test]
  fn unknown_key_is_rejected() {
    let err = MounterType::from_key(Some("fuse-nfs"), MounterType::S3fs).unwrap_err();
    assert!(matches!(err, MounterError::UnknownType(_)), "{:?}", err);
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::InvalidArgument
    );
  }

  #[test]
  fn timeouts_map_to_deadline_exceeded() {
    let err = MounterError::from(MountError::Timeout {
      target: "/mnt".into(),
      after: std::time::Duration::from_secs(1),
    });
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::DeadlineExceeded
    );

    let err = MounterError::from(MountError::Command {
      program: "s3fs".into(),
      args: "bucket:/ /mnt".into(),
      reason: "exited with status 1".into(),
    });
    assert_eq!(tonic::Status::from(err).code(), tonic::Code::Internal);
  }

  #[test]
  fn credentials_file_is_private() {
    let dir = tempfile::tempdir().unwrap();
    let config = testing::config(MounterType::S3fs, &dir.path().join("creds"));

    let path = config
      .write_credentials_file(Path::new("/mnt/target"), PASSWD_EXTENSION)
      .unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "AKIA:hunter2");
    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    // Rewrites replace the file and leave nothing staged behind.
    let mut config = config;
    config.s3.secret_access_key = "swordfish".into();
    let rewritten = config
      .write_credentials_file(Path::new("/mnt/target"), PASSWD_EXTENSION)
      .unwrap();
    assert_eq!(rewritten, path);
    assert_eq!(fs::read_to_string(&path).unwrap(), "AKIA:swordfish");
    assert_eq!(fs::read_dir(dir.path().join("creds")).unwrap().count(), 1);
  }

  #[test]
  fn credential_files_are_per_volume_and_target() {
    let dir = Path::new("/creds");
    let target = Path::new("/mnt/a");
    let path = credentials_path(dir, "shared/pvc-1", target, PASSWD_EXTENSION);

    assert_eq!(path.parent(), Some(dir));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("shared_pvc-1-"), "{}", name);
    assert!(name.ends_with(".passwd"), "{}", name);

    assert_ne!(
      path,
      credentials_path(dir, "shared/pvc-2", target, PASSWD_EXTENSION)
    );
    assert_ne!(
      path,
      credentials_path(dir, "shared/pvc-1", Path::new("/mnt/b"), PASSWD_EXTENSION)
    );
    assert_eq!(
      path,
      credentials_path(dir, "shared/pvc-1", target, PASSWD_EXTENSION)
    );
  }

  #[tokio::test]
  async fn removing_credentials_tolerates_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = testing::config(MounterType::S3backer, dir.path());
    let target = Path::new("/var/lib/stage");
    let access_file = config
      .write_credentials_file(target, ACCESS_FILE_EXTENSION)
      .unwrap();

    remove_credentials_files(dir.path(), "bucket/pvc-1", target)
      .await
      .unwrap();
    assert!(!access_file.exists());
    remove_credentials_files(dir.path(), "bucket/pvc-1", target)
      .await
      .unwrap();
  }

  #[test]
  fn every_type_has_a_mounter() {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeMounter::new());

    for &mounter in MounterType::ALL.iter() {
      let config = testing::config(mounter, dir.path());
      assert!(new_mounter(config, HostMounter::new(fake.clone())).is_ok());
    }
    assert!(fake.log().is_empty());
  }

  #[test]
  fn empty_bucket_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = testing::config(MounterType::Goofys, dir.path());
    config.meta.bucket_name.clear();

    let (host, _) = testing::host();
    let err = new_mounter(config, host).unwrap_err();
    assert!(matches!(err, MounterError::InvalidConfig(_)), "{:?}", err);
  }

  #[test]
  fn secrets_are_not_printed() {
    let dir = tempfile::tempdir().unwrap();
    let config = testing::config(MounterType::Goofys, dir.path());
    let command = config.credential_envs(FuseCommand::new("goofys"));

    assert!(!format!("{:?}", config).contains("hunter2"));
    assert!(!format!("{:?}", command).contains("hunter2"));
  }
}

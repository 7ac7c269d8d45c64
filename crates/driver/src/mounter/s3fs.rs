use super::{fuse_mount, Mounter, MounterConfig, MounterError, PASSWD_EXTENSION};
use async_trait::async_trait;
use mount_utils::{FuseCommand, HostMounter};
use std::path::Path;

const S3FS_COMMAND: &str = "s3fs";

/// Mounts through s3fs-fuse. Credentials go through a password file.
#[derive(Debug)]
pub struct S3fsMounter {
  config: MounterConfig,
  host: HostMounter,
}

impl S3fsMounter {
  pub fn new(config: MounterConfig, host: HostMounter) -> Self {
    S3fsMounter { config, host }
  }

  fn command(&self, target: &Path, passwd_file: &Path) -> FuseCommand {
    let config = &self.config;
    FuseCommand::new(S3FS_COMMAND)
      .arg(format!("{}:/{}", config.bucket(), config.fs_root()))
      .arg(target.display().to_string())
      .args(vec![
        "-o".to_string(),
        "use_path_request_style".to_string(),
        "-o".to_string(),
        format!("url={}", config.s3.endpoint_url()),
        "-o".to_string(),
        format!("endpoint={}", config.s3.region),
        "-o".to_string(),
        "allow_other".to_string(),
        "-o".to_string(),
        "mp_umask=000".to_string(),
        "-o".to_string(),
        format!("passwd_file={}", passwd_file.display()),
      ])
  }
}

#[async_trait]
impl Mounter for S3fsMounter {
  async fn stage(&self, _stage_path: &Path) -> Result<(), MounterError> {
    Ok(())
  }

  async fn unstage(&self, _stage_path: &Path) -> Result<(), MounterError> {
    Ok(())
  }

  async fn mount(&self, _source: &Path, target: &Path) -> Result<(), MounterError> {
    let passwd_file = self.config.write_credentials_file(target, PASSWD_EXTENSION)?;
    let command = self.command(target, &passwd_file);
    fuse_mount(&self.host, command, target, self.config.fuse).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mounter::{credentials_path, testing, MounterType};
  use mount_utils::FuseCommandRecord;

  #[tokio::test]
  async fn mounts_with_password_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    std::fs::create_dir(&target).unwrap();
    let (host, fake) = testing::host();
    let config = testing::config(MounterType::S3fs, &dir.path().join("creds"));
    let mounter = S3fsMounter::new(config, host);

    mounter.mount(Path::new(""), &target).await.unwrap();

    let passwd_file = credentials_path(
      &dir.path().join("creds"),
      "bucket/pvc-1",
      &target,
      PASSWD_EXTENSION,
    );
    assert_eq!(
      fake.commands(),
      vec![FuseCommandRecord {
        program: "s3fs".into(),
        args: vec![
          "bucket:/pvc-1/csi-fs".to_string(),
          target.display().to_string(),
          "-o".into(),
          "use_path_request_style".into(),
          "-o".into(),
          "url=https://minio.example.com".into(),
          "-o".into(),
          "endpoint=eu-west-1".into(),
          "-o".into(),
          "allow_other".into(),
          "-o".into(),
          "mp_umask=000".into(),
          "-o".into(),
          format!("passwd_file={}", passwd_file.display()),
        ],
      }]
    );
    assert_eq!(
      std::fs::read_to_string(passwd_file).unwrap(),
      "AKIA:hunter2"
    );
    assert!(fake.is_mounted(&target));
  }

  #[tokio::test]
  async fn staging_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let (host, fake) = testing::host();
    let mounter = S3fsMounter::new(testing::config(MounterType::S3fs, dir.path()), host);

    mounter.stage(dir.path()).await.unwrap();
    mounter.unstage(dir.path()).await.unwrap();
    assert!(fake.log().is_empty());
  }
}

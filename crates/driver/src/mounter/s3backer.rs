use super::{
  fuse_mount, fuse_unmount, Mounter, MounterConfig, MounterError, ACCESS_FILE_EXTENSION,
};
use crate::capacity::GIB;
use async_trait::async_trait;
use mount_utils::{FuseCommand, HostMounter};
use std::path::Path;
use tracing::{info, warn};

const S3BACKER_COMMAND: &str = "s3backer";
const S3BACKER_FS_TYPE: &str = "xfs";
/// The block device file s3backer exposes inside its mount.
const S3BACKER_DEVICE: &str = "file";
const S3BACKER_BLOCK_SIZE: u64 = GIB;

/// Exposes the prefix as a block device file, formats it as xfs and mounts
/// that onto the publish targets. Needs a staging step.
#[derive(Debug)]
pub struct S3backerMounter {
  config: MounterConfig,
  host: HostMounter,
}

impl S3backerMounter {
  pub fn new(mut config: MounterConfig, host: HostMounter) -> Self {
    // s3backer can not serve empty devices.
    if config.meta.capacity_bytes == 0 {
      config.meta.capacity_bytes = S3BACKER_BLOCK_SIZE;
    }

    S3backerMounter { config, host }
  }

  fn command(&self, stage_path: &Path, access_file: &Path) -> FuseCommand {
    let config = &self.config;
    let mut command = FuseCommand::new(S3BACKER_COMMAND)
      .arg(format!("--blockSize={}", S3BACKER_BLOCK_SIZE))
      .arg(format!("--size={}", config.meta.capacity_bytes));

    let fs_root = config.fs_root();
    if !fs_root.is_empty() {
      command = command.arg(format!("--prefix={}/", fs_root));
    }
    command = command.arg("--listBlocks");

    command = match &config.s3.endpoint {
      Some(endpoint) => command.arg(format!("--baseURL={}/", endpoint.trim_end_matches('/'))),
      None => command.arg(format!("--region={}", config.s3.region)),
    };
    if config.s3.endpoint_url().starts_with("https://") {
      command = command.arg("--ssl");
    }

    command
      .arg(format!("--accessFile={}", access_file.display()))
      .arg(config.bucket())
      .arg(stage_path.display().to_string())
  }
}

#[async_trait]
impl Mounter for S3backerMounter {
  async fn stage(&self, stage_path: &Path) -> Result<(), MounterError> {
    let access_file = self
      .config
      .write_credentials_file(stage_path, ACCESS_FILE_EXTENSION)?;
    let command = self.command(stage_path, &access_file);
    fuse_mount(&self.host, command, stage_path, self.config.fuse).await?;

    let device = stage_path.join(S3BACKER_DEVICE);
    match self.host.ensure_formatted(&device, S3BACKER_FS_TYPE).await {
      Ok(true) => {
        info!(device = %device.display(), "Formatted s3backer device");
        Ok(())
      }
      Ok(false) => Ok(()),
      Err(e) => {
        if let Err(unmount_error) = fuse_unmount(&self.host, stage_path).await {
          warn!(
            "Failed to unmount {} after format failure: {}",
            stage_path.display(),
            unmount_error
          );
        }
        Err(e.into())
      }
    }
  }

  async fn unstage(&self, stage_path: &Path) -> Result<(), MounterError> {
    fuse_unmount(&self.host, stage_path).await
  }

  async fn mount(&self, source: &Path, target: &Path) -> Result<(), MounterError> {
    if source.as_os_str().is_empty() {
      return Err(MounterError::InvalidConfig(
        "s3backer volumes must be staged before they are mounted".to_string(),
      ));
    }

    let device = source.join(S3BACKER_DEVICE);
    let result = self
      .host
      .mount(device, target, S3BACKER_FS_TYPE, Vec::new())
      .await;

    if let Err(e) = result {
      if let Err(unmount_error) = fuse_unmount(&self.host, target).await {
        warn!(
          "Failed to unmount {} after mount failure: {}",
          target.display(),
          unmount_error
        );
      }
      return Err(e.into());
    }

    Ok(())
  }
}

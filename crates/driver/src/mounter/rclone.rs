use super::{fuse_mount, Mounter, MounterConfig, MounterError};
use crate::volume_id::join_key;
use async_trait::async_trait;
use mount_utils::{FuseCommand, HostMounter};
use std::path::Path;

const RCLONE_COMMAND: &str = "rclone";

#[derive(Debug)]
pub struct RcloneMounter {
  config: MounterConfig,
  host: HostMounter,
}

impl RcloneMounter {
  pub fn new(config: MounterConfig, host: HostMounter) -> Self {
    RcloneMounter { config, host }
  }

  fn command(&self, target: &Path) -> FuseCommand {
    let config = &self.config;
    let remote = join_key(&[config.bucket(), &config.fs_root()]);

    let command = FuseCommand::new(RCLONE_COMMAND)
      .arg("mount")
      .arg(format!(":s3:{}", remote))
      .arg(target.display().to_string())
      .arg("--daemon")
      .arg("--s3-provider=AWS")
      .arg("--s3-env-auth=true")
      .arg(format!("--s3-region={}", config.s3.region))
      .arg(format!("--s3-endpoint={}", config.s3.endpoint_url()))
      .arg("--allow-other")
      .arg("--vfs-cache-mode=writes");

    config.credential_envs(command)
  }
}

#[async_trait]
impl Mounter for RcloneMounter {
  async fn stage(&self, _stage_path: &Path) -> Result<(), MounterError> {
    Ok(())
  }

  async fn unstage(&self, _stage_path: &Path) -> Result<(), MounterError> {
    Ok(())
  }

  async fn mount(&self, _source: &Path, target: &Path) -> Result<(), MounterError> {
    fuse_mount(&self.host, self.command(target), target, self.config.fuse).await
  }
}

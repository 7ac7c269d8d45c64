use super::{fuse_mount, Mounter, MounterConfig, MounterError};
use async_trait::async_trait;
use mount_utils::{FuseCommand, HostMounter};
use std::path::Path;

const GOOFYS_COMMAND: &str = "goofys";

#[derive(Debug)]
pub struct GoofysMounter {
  config: MounterConfig,
  host: HostMounter,
}

impl GoofysMounter {
  pub fn new(config: MounterConfig, host: HostMounter) -> Self {
    GoofysMounter { config, host }
  }

  fn command(&self, target: &Path) -> FuseCommand {
    let config = &self.config;
    let mut command = FuseCommand::new(GOOFYS_COMMAND)
      .arg("--endpoint")
      .arg(config.s3.endpoint_url());

    if !config.s3.region.is_empty() {
      command = command.arg("--region").arg(config.s3.region.as_str());
    }

    let fs_root = config.fs_root();
    let source = if fs_root.is_empty() {
      config.bucket().to_string()
    } else {
      format!("{}:{}", config.bucket(), fs_root)
    };

    let command = command
      .args(vec![
        "-o",
        "allow_other",
        "--dir-mode",
        "0777",
        "--file-mode",
        "0666",
      ])
      .arg(source)
      .arg(target.display().to_string());

    config.credential_envs(command)
  }
}

#[async_trait]
impl Mounter for GoofysMounter {
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

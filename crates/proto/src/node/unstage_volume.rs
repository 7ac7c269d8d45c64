use crate::{
  proto,
  utils::{absolute_path, required},
};
use std::{
  convert::TryFrom,
  path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct NodeUnstageVolumeRequest {
  volume_id: String,
  staging_target_path: PathBuf,
}

impl NodeUnstageVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  #[inline]
  pub fn staging_target_path(&self) -> &Path {
    &self.staging_target_path
  }
}

impl TryFrom<proto::NodeUnstageVolumeRequest> for NodeUnstageVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::NodeUnstageVolumeRequest) -> Result<Self, Self::Error> {
    Ok(NodeUnstageVolumeRequest {
      volume_id: required(value.volume_id, "NodeUnstageVolumeRequest.volume_id")?,
      staging_target_path: absolute_path(
        value.staging_target_path,
        "NodeUnstageVolumeRequest.staging_target_path",
      )?,
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeUnstageVolumeError {
  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<NodeUnstageVolumeError> for tonic::Status {
  fn from(value: NodeUnstageVolumeError) -> Self {
    match value {
      NodeUnstageVolumeError::Other(v) => v,
    }
  }
}

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
pub struct NodeUnpublishVolumeRequest {
  volume_id: String,
  target_path: PathBuf,
}

impl NodeUnpublishVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  #[inline]
  pub fn target_path(&self) -> &Path {
    &self.target_path
  }
}

impl TryFrom<proto::NodeUnpublishVolumeRequest> for NodeUnpublishVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::NodeUnpublishVolumeRequest) -> Result<Self, Self::Error> {
    Ok(NodeUnpublishVolumeRequest {
      volume_id: required(value.volume_id, "NodeUnpublishVolumeRequest.volume_id")?,
      target_path: absolute_path(value.target_path, "NodeUnpublishVolumeRequest.target_path")?,
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeUnpublishVolumeError {
  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<NodeUnpublishVolumeError> for tonic::Status {
  fn from(value: NodeUnpublishVolumeError) -> Self {
    match value {
      NodeUnpublishVolumeError::Other(v) => v,
    }
  }
}

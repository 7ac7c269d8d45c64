use super::{Secrets, VolumeCapability};
use crate::{
  proto,
  utils::{absolute_path, required},
};
use std::{
  collections::HashMap,
  convert::TryFrom,
  path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct NodeStageVolumeRequest {
  volume_id: String,
  publish_context: HashMap<String, String>,
  staging_target_path: PathBuf,
  volume_capability: VolumeCapability,
  secrets: Secrets,
  volume_context: HashMap<String, String>,
}

impl NodeStageVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  #[inline]
  pub fn publish_context(&self) -> &HashMap<String, String> {
    &self.publish_context
  }

  /// Absolute directory the volume is staged under. One per volume.
  #[inline]
  pub fn staging_target_path(&self) -> &Path {
    &self.staging_target_path
  }

  #[inline]
  pub fn volume_capability(&self) -> &VolumeCapability {
    &self.volume_capability
  }

  #[inline]
  pub fn secrets(&self) -> &Secrets {
    &self.secrets
  }

  /// The context `CreateVolume` returned for this volume.
  #[inline]
  pub fn volume_context(&self) -> &HashMap<String, String> {
    &self.volume_context
  }
}

impl TryFrom<proto::NodeStageVolumeRequest> for NodeStageVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::NodeStageVolumeRequest) -> Result<Self, Self::Error> {
    let volume_id = required(value.volume_id, "NodeStageVolumeRequest.volume_id")?;
    let staging_target_path = absolute_path(
      value.staging_target_path,
      "NodeStageVolumeRequest.staging_target_path",
    )?;

    let volume_capability = match value.volume_capability {
      None => {
        return Err(tonic::Status::invalid_argument(
          "NodeStageVolumeRequest.volume_capability is missing",
        ))
      }
      Some(v) => v.into(),
    };

    Ok(NodeStageVolumeRequest {
      volume_id,
      publish_context: value.publish_context,
      staging_target_path,
      volume_capability,
      secrets: value.secrets.into(),
      volume_context: value.volume_context,
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeStageVolumeError {
  /// The volume context or secrets do not describe a stageable volume.
  #[error("Invalid volume: {0}")]
  InvalidVolume(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<NodeStageVolumeError> for tonic::Status {
  fn from(value: NodeStageVolumeError) -> Self {
    use tonic::{Code, Status};

    match value {
      NodeStageVolumeError::Other(v) => v,
      value => {
        let code = match &value {
          NodeStageVolumeError::InvalidVolume(_) => Code::InvalidArgument,
          NodeStageVolumeError::Other(_) => unreachable!(),
        };

        Status::new(code, value.to_string())
      }
    }
  }
}

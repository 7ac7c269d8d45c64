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
pub struct NodePublishVolumeRequest {
  volume_id: String,
  publish_context: HashMap<String, String>,
  staging_target_path: Option<PathBuf>,
  target_path: PathBuf,
  volume_capability: VolumeCapability,
  readonly: bool,
  secrets: Secrets,
  volume_context: HashMap<String, String>,
}

impl NodePublishVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  #[inline]
  pub fn publish_context(&self) -> &HashMap<String, String> {
    &self.publish_context
  }

  /// Where `NodeStageVolume` staged the volume. Set whenever the plugin
  /// reports `STAGE_UNSTAGE_VOLUME`.
  #[inline]
  pub fn staging_target_path(&self) -> Option<&Path> {
    self.staging_target_path.as_deref()
  }

  /// Absolute path the volume is published at.
  #[inline]
  pub fn target_path(&self) -> &Path {
    &self.target_path
  }

  #[inline]
  pub fn volume_capability(&self) -> &VolumeCapability {
    &self.volume_capability
  }

  #[inline]
  pub fn readonly(&self) -> bool {
    self.readonly
  }

  #[inline]
  pub fn secrets(&self) -> &Secrets {
    &self.secrets
  }

  #[inline]
  pub fn volume_context(&self) -> &HashMap<String, String> {
    &self.volume_context
  }
}

impl TryFrom<proto::NodePublishVolumeRequest> for NodePublishVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::NodePublishVolumeRequest) -> Result<Self, Self::Error> {
    let volume_id = required(value.volume_id, "NodePublishVolumeRequest.volume_id")?;

    let staging_target_path = match value.staging_target_path {
      v if v.is_empty() => None,
      v => Some(absolute_path(
        v,
        "NodePublishVolumeRequest.staging_target_path",
      )?),
    };

    let target_path = absolute_path(value.target_path, "NodePublishVolumeRequest.target_path")?;

    let volume_capability = match value.volume_capability {
      None => {
        return Err(tonic::Status::invalid_argument(
          "NodePublishVolumeRequest.volume_capability is missing",
        ))
      }
      Some(v) => v.into(),
    };

    Ok(NodePublishVolumeRequest {
      volume_id,
      publish_context: value.publish_context,
      staging_target_path,
      target_path,
      volume_capability,
      readonly: value.readonly,
      secrets: value.secrets.into(),
      volume_context: value.volume_context,
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodePublishVolumeError {
  /// The volume context or secrets do not describe a mountable volume.
  #[error("Invalid volume: {0}")]
  InvalidVolume(String),

  /// The plugin stages volumes but the CO did not pass a staging path.
  #[error("Staging target path not set: {0}")]
  StagingTargetPathNotSet(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<NodePublishVolumeError> for tonic::Status {
  fn from(value: NodePublishVolumeError) -> Self {
    use tonic::{Code, Status};

    match value {
      NodePublishVolumeError::Other(v) => v,
      value => {
        let code = match &value {
          NodePublishVolumeError::InvalidVolume(_) => Code::InvalidArgument,
          NodePublishVolumeError::StagingTargetPathNotSet(_) => Code::FailedPrecondition,
          NodePublishVolumeError::Other(_) => unreachable!(),
        };

        Status::new(code, value.to_string())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::volume::AccessMode;

  fn request() -> proto::NodePublishVolumeRequest {
    proto::NodePublishVolumeRequest {
      volume_id: "bucket/pvc".into(),
      target_path: "/var/lib/kubelet/pods/1/volumes/pvc/mount".into(),
      volume_capability: Some(VolumeCapability::mount(AccessMode::SingleNodeWriter).into()),
      ..Default::default()
    }
  }

  #[test]
  fn empty_staging_path_means_unstaged() {
    let request = NodePublishVolumeRequest::try_from(request()).unwrap();
    assert!(request.staging_target_path().is_none());
  }

  #[test]
  fn relative_target_is_rejected() {
    let status = NodePublishVolumeRequest::try_from(proto::NodePublishVolumeRequest {
      target_path: "mount".into(),
      ..request()
    })
    .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
  }

  #[test]
  fn missing_capability_is_rejected() {
    let status = NodePublishVolumeRequest::try_from(proto::NodePublishVolumeRequest {
      volume_capability: None,
      ..request()
    })
    .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
  }

  #[test]
  fn staging_path_error_is_failed_precondition() {
    let status: tonic::Status =
      NodePublishVolumeError::StagingTargetPathNotSet("bucket/pvc".into()).into();
    assert_eq!(status.code(), tonic::Code::FailedPrecondition);
  }
}

use super::Volume;
use crate::{proto, utils::required};
use std::convert::{TryFrom, TryInto};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ControllerGetVolumeRequest {
  volume_id: String,
}

impl ControllerGetVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }
}

impl TryFrom<proto::ControllerGetVolumeRequest> for ControllerGetVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::ControllerGetVolumeRequest) -> Result<Self, Self::Error> {
    Ok(ControllerGetVolumeRequest {
      volume_id: required(value.volume_id, "ControllerGetVolumeRequest.volume_id")?,
    })
  }
}

impl TryFrom<Volume> for proto::ControllerGetVolumeResponse {
  type Error = tonic::Status;

  fn try_from(value: Volume) -> Result<Self, Self::Error> {
    Ok(proto::ControllerGetVolumeResponse {
      volume: Some(value.try_into()?),
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ControllerGetVolumeError {
  #[error("Volume does not exist: {0}")]
  VolumeNotFound(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<ControllerGetVolumeError> for tonic::Status {
  fn from(value: ControllerGetVolumeError) -> Self {
    use tonic::{Code, Status};

    match value {
      ControllerGetVolumeError::VolumeNotFound(v) => Status::new(Code::NotFound, v),
      ControllerGetVolumeError::Other(v) => v,
    }
  }
}

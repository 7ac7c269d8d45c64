use super::{CapacityRange, Secrets, VolumeCapability};
use crate::{proto, utils::required};
use std::{
  convert::{TryFrom, TryInto},
  num::NonZeroU64,
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ControllerExpandVolumeRequest {
  volume_id: String,
  capacity_range: CapacityRange,
  secrets: Secrets,
  volume_capability: Option<VolumeCapability>,
}

impl ControllerExpandVolumeRequest {
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  /// The size the volume should be expanded to.
  #[inline]
  pub fn capacity_range(&self) -> &CapacityRange {
    &self.capacity_range
  }

  #[inline]
  pub fn secrets(&self) -> &Secrets {
    &self.secrets
  }

  #[inline]
  pub fn volume_capability(&self) -> Option<&VolumeCapability> {
    self.volume_capability.as_ref()
  }
}

impl TryFrom<proto::ControllerExpandVolumeRequest> for ControllerExpandVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::ControllerExpandVolumeRequest) -> Result<Self, Self::Error> {
    let volume_id = required(value.volume_id, "ControllerExpandVolumeRequest.volume_id")?;

    let capacity_range = match value.capacity_range {
      None => {
        return Err(tonic::Status::invalid_argument(
          "ControllerExpandVolumeRequest.capacity_range is missing",
        ))
      }
      Some(v) => v.try_into()?,
    };

    Ok(ControllerExpandVolumeRequest {
      volume_id,
      capacity_range,
      secrets: value.secrets.into(),
      volume_capability: value.volume_capability.map(Into::into),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerExpandVolumeResponse {
  capacity_bytes: NonZeroU64,
  node_expansion_required: bool,
}

impl ControllerExpandVolumeResponse {
  pub fn new(capacity_bytes: NonZeroU64, node_expansion_required: bool) -> Self {
    ControllerExpandVolumeResponse {
      capacity_bytes,
      node_expansion_required,
    }
  }
}

impl TryFrom<ControllerExpandVolumeResponse> for proto::ControllerExpandVolumeResponse {
  type Error = tonic::Status;

  fn try_from(value: ControllerExpandVolumeResponse) -> Result<Self, Self::Error> {
    let capacity_bytes = i64::try_from(value.capacity_bytes.get()).map_err(|_| {
      tonic::Status::out_of_range("ControllerExpandVolumeResponse.capacity_bytes overflows int64")
    })?;

    Ok(proto::ControllerExpandVolumeResponse {
      capacity_bytes,
      node_expansion_required: value.node_expansion_required,
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ControllerExpandVolumeError {
  #[error("Volume does not exist: {0}")]
  VolumeNotFound(String),

  #[error("Unsupported capacity_range: {0}")]
  UnsupportedCapacityRange(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<ControllerExpandVolumeError> for tonic::Status {
  fn from(value: ControllerExpandVolumeError) -> Self {
    use tonic::{Code, Status};

    match value {
      ControllerExpandVolumeError::VolumeNotFound(v) => Status::new(Code::NotFound, v),
      ControllerExpandVolumeError::UnsupportedCapacityRange(v) => Status::new(Code::OutOfRange, v),
      ControllerExpandVolumeError::Other(v) => v,
    }
  }
}

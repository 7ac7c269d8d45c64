use super::{CapacityRange, Secrets, TopologyRequirement, VolumeCapability, VolumeContentSource};
use crate::{proto, utils::required};
use std::{
  collections::HashMap,
  convert::{TryFrom, TryInto},
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CreateVolumeRequest {
  name: String,
  capacity_range: Option<CapacityRange>,
  volume_capabilities: Vec<VolumeCapability>,
  parameters: HashMap<String, String>,
  secrets: Secrets,
  volume_content_source: Option<VolumeContentSource>,
  accessibility_requirements: Option<TopologyRequirement>,
}

impl CreateVolumeRequest {
  /// Suggested name for the volume. Replays of the same request carry the
  /// same name, which is what makes provisioning idempotent.
  #[inline]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[inline]
  pub fn capacity_range(&self) -> Option<&CapacityRange> {
    self.capacity_range.as_ref()
  }

  /// Always holds at least one entry.
  #[inline]
  pub fn volume_capabilities(&self) -> &[VolumeCapability] {
    &self.volume_capabilities
  }

  /// Opaque parameters from the storage class.
  #[inline]
  pub fn parameters(&self) -> &HashMap<String, String> {
    &self.parameters
  }

  #[inline]
  pub fn secrets(&self) -> &Secrets {
    &self.secrets
  }

  #[inline]
  pub fn volume_content_source(&self) -> Option<&VolumeContentSource> {
    self.volume_content_source.as_ref()
  }

  #[inline]
  pub fn accessibility_requirements(&self) -> Option<&TopologyRequirement> {
    self.accessibility_requirements.as_ref()
  }
}

impl TryFrom<proto::CreateVolumeRequest> for CreateVolumeRequest {
  type Error = tonic::Status;

  fn try_from(value: proto::CreateVolumeRequest) -> Result<Self, Self::Error> {
    let name = required(value.name, "CreateVolumeRequest.name")?;

    let capacity_range = value.capacity_range.map(TryInto::try_into).transpose()?;

    if value.volume_capabilities.is_empty() {
      return Err(tonic::Status::invalid_argument(
        "CreateVolumeRequest.volume_capabilities is empty",
      ));
    }
    let volume_capabilities = value
      .volume_capabilities
      .into_iter()
      .map(VolumeCapability::from)
      .collect();

    let volume_content_source = match value.volume_content_source {
      None => None,
      Some(v) => v.try_into()?,
    };

    Ok(CreateVolumeRequest {
      name,
      capacity_range,
      volume_capabilities,
      parameters: value.parameters,
      secrets: value.secrets.into(),
      volume_content_source,
      accessibility_requirements: value.accessibility_requirements.map(Into::into),
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CreateVolumeError {
  /// The request is malformed or asks for something the plugin never does.
  #[error("Invalid request: {0}")]
  InvalidArgument(String),

  /// The requested capacity cannot be honoured.
  #[error("Unsupported capacity_range: {0}")]
  UnsupportedCapacityRange(String),

  /// No topology in the requirements can be served.
  #[error("Unsatisfiable accessibility requirements: {0}")]
  UnsatisfiableTopology(String),

  /// A volume with the same name exists but is incompatible with the request.
  #[error("Incompatible volume exists: {0}")]
  IncompatibleVolumeExists(String),

  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<CreateVolumeError> for tonic::Status {
  fn from(value: CreateVolumeError) -> Self {
    use tonic::{Code, Status};

    match value {
      CreateVolumeError::InvalidArgument(v) => Status::new(Code::InvalidArgument, v),
      CreateVolumeError::UnsupportedCapacityRange(v) => Status::new(Code::OutOfRange, v),
      CreateVolumeError::UnsatisfiableTopology(v) => Status::new(Code::ResourceExhausted, v),
      CreateVolumeError::IncompatibleVolumeExists(v) => Status::new(Code::AlreadyExists, v),
      CreateVolumeError::Other(v) => v,
    }
  }
}

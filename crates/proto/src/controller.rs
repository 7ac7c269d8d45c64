mod capabilities;
mod create_volume;
mod delete_volume;
mod expand_volume;
mod get_volume;
mod validate_volume_capabilities;

use crate::{
  proto,
  utils::{record_request, Record},
  IdentityService,
};
use async_trait::async_trait;
use std::{convert::TryInto, sync::Arc};
use tracing::instrument;

pub use crate::secrets::Secrets;
pub use crate::volume::*;
pub use capabilities::*;
pub use create_volume::*;
pub use delete_volume::*;
pub use expand_volume::*;
pub use get_volume::*;
pub use validate_volume_capabilities::*;

#[async_trait]
pub trait ControllerService: IdentityService {
  /// The set of controller RPCs this plugin serves.
  #[inline]
  fn capabilities(&self) -> ControllerCapabilities {
    ControllerCapabilities::empty()
  }

  /// Provisions a new volume, or returns the existing one when a volume
  /// with the same name is already provisioned and compatible.
  ///
  /// Must be idempotent: the CO retries on any failure, and a retry must be
  /// able to pick up from whatever the previous attempt left behind.
  #[allow(unused_variables)]
  async fn create_volume(&self, request: CreateVolumeRequest) -> Result<Volume, CreateVolumeError> {
    unsupported!("CreateVolume")
  }

  /// Deprovisions a volume. Deleting a volume that no longer exists succeeds.
  #[allow(unused_variables)]
  async fn delete_volume(&self, request: DeleteVolumeRequest) -> Result<(), DeleteVolumeError> {
    unsupported!("DeleteVolume")
  }

  /// Checks whether an existing volume supports every requested capability.
  /// Confirms only when all of them are supported.
  async fn validate_volume_capabilities(
    &self,
    request: ValidateVolumeCapabilitiesRequest,
  ) -> Result<ValidateVolumeCapabilitiesResponse, ValidateVolumeCapabilitiesError>;

  #[allow(unused_variables)]
  async fn controller_expand_volume(
    &self,
    request: ControllerExpandVolumeRequest,
  ) -> Result<ControllerExpandVolumeResponse, ControllerExpandVolumeError> {
    unsupported!("ControllerExpandVolume")
  }

  #[allow(unused_variables)]
  async fn controller_get_volume(
    &self,
    request: ControllerGetVolumeRequest,
  ) -> Result<Volume, ControllerGetVolumeError> {
    unsupported!("ControllerGetVolume")
  }
}

/// Handles the `csi.v1.Controller` RPCs by converting the wire messages and
/// delegating to a [`ControllerService`].
pub struct Controller<T: ControllerService>(Arc<T>);

impl<T: ControllerService> Clone for Controller<T> {
  fn clone(&self) -> Self {
    Controller(self.0.clone())
  }
}

impl<T: ControllerService> Controller<T> {
  pub fn new(inner: Arc<T>) -> Self {
    Controller(inner)
  }

  #[instrument(
    name = "controller.create_volume",
    skip(self, request),
    fields(request, response)
  )]
  pub async fn create_volume(
    &self,
    request: tonic::Request<proto::CreateVolumeRequest>,
  ) -> Result<tonic::Response<proto::CreateVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = self
      .0
      .create_volume(request)
      .await?
      .record_response()
      .try_into()?;
    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "controller.delete_volume",
    skip(self, request),
    fields(request)
  )]
  pub async fn delete_volume(
    &self,
    request: tonic::Request<proto::DeleteVolumeRequest>,
  ) -> Result<tonic::Response<proto::DeleteVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    self.0.delete_volume(request).await?;
    Ok(tonic::Response::new(proto::DeleteVolumeResponse {}))
  }

  #[instrument(
    name = "controller.validate_volume_capabilities",
    skip(self, request),
    fields(request, response)
  )]
  pub async fn validate_volume_capabilities(
    &self,
    request: tonic::Request<proto::ValidateVolumeCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::ValidateVolumeCapabilitiesResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = self
      .0
      .validate_volume_capabilities(request)
      .await?
      .record_response()
      .try_into()?;
    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "controller.controller_get_capabilities",
    skip(self, _request),
    fields(response)
  )]
  pub async fn controller_get_capabilities(
    &self,
    _request: tonic::Request<proto::ControllerGetCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::ControllerGetCapabilitiesResponse>, tonic::Status> {
    let response = self.0.capabilities().record_response().try_into()?;
    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "controller.controller_expand_volume",
    skip(self, request),
    fields(request, response)
  )]
  pub async fn controller_expand_volume(
    &self,
    request: tonic::Request<proto::ControllerExpandVolumeRequest>,
  ) -> Result<tonic::Response<proto::ControllerExpandVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = self
      .0
      .controller_expand_volume(request)
      .await?
      .record_response()
      .try_into()?;
    Ok(tonic::Response::new(response))
  }

  #[instrument(
    name = "controller.controller_get_volume",
    skip(self, request),
    fields(request, response)
  )]
  pub async fn controller_get_volume(
    &self,
    request: tonic::Request<proto::ControllerGetVolumeRequest>,
  ) -> Result<tonic::Response<proto::ControllerGetVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    let response = self
      .0
      .controller_get_volume(request)
      .await?
      .record_response()
      .try_into()?;
    Ok(tonic::Response::new(response))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Minimal;

  impl IdentityService for Minimal {
    fn name(&self) -> &str {
      "minimal"
    }

    fn version(&self) -> &str {
      "0.0.0"
    }
  }

  #[async_trait]
  impl ControllerService for Minimal {
    async fn validate_volume_capabilities(
      &self,
      request: ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, ValidateVolumeCapabilitiesError> {
      Ok(ValidateVolumeCapabilitiesResponse::Message(format!(
        "nothing is supported for {}",
        request.volume_id()
      )))
    }
  }

  #[tokio::test]
  async fn default_methods_report_unimplemented() {
    let controller = Controller::new(Arc::new(Minimal));

    let status = controller
      .controller_get_volume(tonic::Request::new(proto::ControllerGetVolumeRequest {
        volume_id: "vol".into(),
      }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unimplemented);

    let status = controller
      .controller_expand_volume(tonic::Request::new(proto::ControllerExpandVolumeRequest {
        volume_id: "vol".into(),
        capacity_range: Some(proto::CapacityRange {
          required_bytes: 1,
          limit_bytes: 0,
        }),
        ..Default::default()
      }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unimplemented);
  }

  #[tokio::test]
  async fn malformed_requests_never_reach_the_service() {
    let controller = Controller::new(Arc::new(Minimal));

    let status = controller
      .validate_volume_capabilities(tonic::Request::new(
        proto::ValidateVolumeCapabilitiesRequest {
          volume_id: "vol".into(),
          ..Default::default()
        },
      ))
      .await
      .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
  }

  #[tokio::test]
  async fn message_responses_leave_confirmed_unset() {
    let controller = Controller::new(Arc::new(Minimal));

    let response = controller
      .validate_volume_capabilities(tonic::Request::new(
        proto::ValidateVolumeCapabilitiesRequest {
          volume_id: "vol".into(),
          volume_capabilities: vec![VolumeCapability::mount(AccessMode::SingleNodeWriter).into()],
          ..Default::default()
        },
      ))
      .await
      .unwrap()
      .into_inner();
    assert!(response.confirmed.is_none());
    assert_eq!(response.message, "nothing is supported for vol");
  }
}

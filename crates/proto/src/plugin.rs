use crate::{proto, utils::Record, IdentityService};
use std::sync::Arc;
use tracing::{debug, instrument};

fn service_capability(
  r#type: proto::plugin_capability::service::Type,
) -> proto::PluginCapability {
  proto::PluginCapability {
    r#type: Some(proto::plugin_capability::Type::Service(
      proto::plugin_capability::Service {
        r#type: r#type.into(),
      },
    )),
  }
}

pub(crate) fn get_capabilities(
  s: &impl IdentityService,
  controller_service: bool,
) -> proto::GetPluginCapabilitiesResponse {
  use proto::plugin_capability::service::Type;

  let mut response = proto::GetPluginCapabilitiesResponse::default();
  if controller_service {
    response
      .capabilities
      .push(service_capability(Type::ControllerService));
  }

  let volume_accessibility_constraints_support = s.volume_accessibility_constraints_support();
  if volume_accessibility_constraints_support {
    response
      .capabilities
      .push(service_capability(Type::VolumeAccessibilityConstraints));
  }

  debug!(controller_service, volume_accessibility_constraints_support);
  response
}

/// Handles the `csi.v1.Identity` RPCs for a plugin.
pub struct Identity<T: IdentityService> {
  inner: Arc<T>,
  controller_service: bool,
}

impl<T: IdentityService> Clone for Identity<T> {
  fn clone(&self) -> Self {
    Identity {
      inner: self.inner.clone(),
      controller_service: self.controller_service,
    }
  }
}

impl<T: IdentityService> Identity<T> {
  /// Identity of a node-only plugin.
  pub fn new(inner: Arc<T>) -> Self {
    Identity {
      inner,
      controller_service: false,
    }
  }

  /// Identity of a plugin that also serves the controller RPCs.
  pub fn with_controller(inner: Arc<T>) -> Self {
    Identity {
      inner,
      controller_service: true,
    }
  }

  #[instrument(
    name = "identity.get_plugin_info",
    skip(self, _request),
    fields(name, vendor_version)
  )]
  pub async fn get_plugin_info(
    &self,
    _request: tonic::Request<proto::GetPluginInfoRequest>,
  ) -> Result<tonic::Response<proto::GetPluginInfoResponse>, tonic::Status> {
    let response = proto::GetPluginInfoResponse {
      name: self.inner.name().record_field("name").into(),
      vendor_version: self.inner.version().record_field("vendor_version").into(),
      manifest: self.inner.manifest().clone(),
    };

    Ok(tonic::Response::new(response))
  }

  #[instrument(name = "identity.get_plugin_capabilities", skip(self, _request))]
  pub async fn get_plugin_capabilities(
    &self,
    _request: tonic::Request<proto::GetPluginCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::GetPluginCapabilitiesResponse>, tonic::Status> {
    let response = get_capabilities(&*self.inner, self.controller_service);
    Ok(tonic::Response::new(response))
  }

  #[instrument(name = "identity.probe", skip(self, _request), fields(ready))]
  pub async fn probe(
    &self,
    _request: tonic::Request<proto::ProbeRequest>,
  ) -> Result<tonic::Response<proto::ProbeResponse>, tonic::Status> {
    let ready = self.inner.probe().await.record_field("ready");
    let response = proto::ProbeResponse { ready: Some(ready) };

    Ok(tonic::Response::new(response))
  }
}

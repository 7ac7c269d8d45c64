mod capabilities;
mod get_info;
mod publish_volume;
mod stage_volume;
mod unpublish_volume;
mod unstage_volume;

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
pub use get_info::*;
pub use publish_volume::*;
pub use stage_volume::*;
pub use unpublish_volume::*;
pub use unstage_volume::*;

#[async_trait]
pub trait NodeService: IdentityService {
  /// The set of node RPCs this plugin serves.
  #[inline]
  fn capabilities(&self) -> NodeCapabilities {
    NodeCapabilities::empty()
  }

  /// Prepares a volume on this node so that it can later be published to
  /// one or more targets. Called once per volume per node when the plugin
  /// reports `STAGE_UNSTAGE_VOLUME`.
  #[allow(unused_variables)]
  async fn node_stage_volume(
    &self,
    request: NodeStageVolumeRequest,
  ) -> Result<(), NodeStageVolumeError> {
    unsupported!("NodeStageVolume")
  }

  /// Reverse of [`NodeService::node_stage_volume`]. Succeeds when nothing
  /// is staged.
  #[allow(unused_variables)]
  async fn node_unstage_volume(
    &self,
    request: NodeUnstageVolumeRequest,
  ) -> Result<(), NodeUnstageVolumeError> {
    unsupported!("NodeUnstageVolume")
  }

  /// Makes the volume available at the target path. Publishing an already
  /// published target succeeds.
  async fn node_publish_volume(
    &self,
    request: NodePublishVolumeRequest,
  ) -> Result<(), NodePublishVolumeError>;

  async fn node_unpublish_volume(
    &self,
    request: NodeUnpublishVolumeRequest,
  ) -> Result<(), NodeUnpublishVolumeError>;

  async fn node_get_info(&self) -> Result<NodeGetInfoResponse, NodeGetInfoError>;
}

/// Handles the `csi.v1.Node` RPCs by converting the wire messages and
/// delegating to a [`NodeService`].
pub struct Node<T: NodeService>(Arc<T>);

impl<T: NodeService> Clone for Node<T> {
  fn clone(&self) -> Self {
    Node(self.0.clone())
  }
}

impl<T: NodeService> Node<T> {
  pub fn new(inner: Arc<T>) -> Self {
    Node(inner)
  }

  #[instrument(name = "node.node_stage_volume", skip(self, request), fields(request))]
  pub async fn node_stage_volume(
    &self,
    request: tonic::Request<proto::NodeStageVolumeRequest>,
  ) -> Result<tonic::Response<proto::NodeStageVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    self.0.node_stage_volume(request).await?;
    Ok(tonic::Response::new(proto::NodeStageVolumeResponse {}))
  }

  #[instrument(name = "node.node_unstage_volume", skip(self, request), fields(request))]
  pub async fn node_unstage_volume(
    &self,
    request: tonic::Request<proto::NodeUnstageVolumeRequest>,
  ) -> Result<tonic::Response<proto::NodeUnstageVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    self.0.node_unstage_volume(request).await?;
    Ok(tonic::Response::new(proto::NodeUnstageVolumeResponse {}))
  }

  #[instrument(name = "node.node_publish_volume", skip(self, request), fields(request))]
  pub async fn node_publish_volume(
    &self,
    request: tonic::Request<proto::NodePublishVolumeRequest>,
  ) -> Result<tonic::Response<proto::NodePublishVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    self.0.node_publish_volume(request).await?;
    Ok(tonic::Response::new(proto::NodePublishVolumeResponse {}))
  }

  #[instrument(name = "node.node_unpublish_volume", skip(self, request), fields(request))]
  pub async fn node_unpublish_volume(
    &self,
    request: tonic::Request<proto::NodeUnpublishVolumeRequest>,
  ) -> Result<tonic::Response<proto::NodeUnpublishVolumeResponse>, tonic::Status> {
    let request = record_request(request.into_inner().try_into()?);
    self.0.node_unpublish_volume(request).await?;
    Ok(tonic::Response::new(proto::NodeUnpublishVolumeResponse {}))
  }

  #[instrument(name = "node.node_get_capabilities", skip(self, _request), fields(response))]
  pub async fn node_get_capabilities(
    &self,
    _request: tonic::Request<proto::NodeGetCapabilitiesRequest>,
  ) -> Result<tonic::Response<proto::NodeGetCapabilitiesResponse>, tonic::Status> {
    let response = self.0.capabilities().record_response().try_into()?;
    Ok(tonic::Response::new(response))
  }

  #[instrument(name = "node.node_get_info", skip(self, _request), fields(response))]
  pub async fn node_get_info(
    &self,
    _request: tonic::Request<proto::NodeGetInfoRequest>,
  ) -> Result<tonic::Response<proto::NodeGetInfoResponse>, tonic::Status> {
    let response = self
      .0
      .node_get_info()
      .await?
      .record_response()
      .try_into()?;
    Ok(tonic::Response::new(response))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Stateless;

  impl IdentityService for Stateless {
    fn name(&self) -> &str {
      "stateless"
    }

    fn version(&self) -> &str {
      "0.0.0"
    }
  }

  #[async_trait]
  impl NodeService for Stateless {
    async fn node_publish_volume(
      &self,
      _request: NodePublishVolumeRequest,
    ) -> Result<(), NodePublishVolumeError> {
      Ok(())
    }

    async fn node_unpublish_volume(
      &self,
      _request: NodeUnpublishVolumeRequest,
    ) -> Result<(), NodeUnpublishVolumeError> {
      Ok(())
    }

    async fn node_get_info(&self) -> Result<NodeGetInfoResponse, NodeGetInfoError> {
      Ok(NodeGetInfoResponse::new("node-1"))
    }
  }

  #[tokio::test]
  async fn stage_defaults_to_unimplemented() {
    let node = Node::new(Arc::new(Stateless));
    let status = node
      .node_stage_volume(tonic::Request::new(proto::NodeStageVolumeRequest {
        volume_id: "vol".into(),
        staging_target_path: "/stage".into(),
        volume_capability: Some(VolumeCapability::mount(AccessMode::SingleNodeWriter).into()),
        ..Default::default()
      }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unimplemented);
  }

  #[tokio::test]
  async fn get_info_reports_node_id() {
    let node = Node::new(Arc::new(Stateless));
    let info = node
      .node_get_info(tonic::Request::new(proto::NodeGetInfoRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(info.node_id, "node-1");
    assert_eq!(info.max_volumes_per_node, 0);
    assert!(info.accessible_topology.is_none());
  }

  #[tokio::test]
  async fn no_capabilities_by_default() {
    let node = Node::new(Arc::new(Stateless));
    let caps = node
      .node_get_capabilities(tonic::Request::new(proto::NodeGetCapabilitiesRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert!(caps.capabilities.is_empty());
  }
}

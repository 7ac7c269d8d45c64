use super::Topology;
use crate::proto;
use std::{convert::TryFrom, num::NonZeroU64};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGetInfoResponse {
  node_id: String,
  max_volumes_per_node: Option<NonZeroU64>,
  accessible_topology: Option<Topology>,
}

impl NodeGetInfoResponse {
  /// `node_id` identifies this node to the CO and is at most 192 bytes.
  pub fn new(node_id: impl Into<String>) -> Self {
    NodeGetInfoResponse {
      node_id: node_id.into(),
      max_volumes_per_node: None,
      accessible_topology: None,
    }
  }

  pub fn with_max_volumes(mut self, max_volumes_per_node: NonZeroU64) -> Self {
    self.max_volumes_per_node = Some(max_volumes_per_node);
    self
  }

  pub fn with_topology(mut self, topology: Topology) -> Self {
    self.accessible_topology = Some(topology);
    self
  }

  #[inline]
  pub fn node_id(&self) -> &str {
    &self.node_id
  }
}

impl TryFrom<NodeGetInfoResponse> for proto::NodeGetInfoResponse {
  type Error = tonic::Status;

  fn try_from(value: NodeGetInfoResponse) -> Result<Self, Self::Error> {
    let max_volumes_per_node = match value.max_volumes_per_node {
      None => 0,
      Some(v) => i64::try_from(v.get()).map_err(|_| {
        tonic::Status::out_of_range("NodeGetInfoResponse.max_volumes_per_node overflows int64")
      })?,
    };

    Ok(proto::NodeGetInfoResponse {
      node_id: value.node_id,
      max_volumes_per_node,
      accessible_topology: value
        .accessible_topology
        .map(|segments| proto::Topology { segments }),
    })
  }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum NodeGetInfoError {
  #[error(transparent)]
  #[doc(hidden)]
  Other(#[from] tonic::Status),
}

impl From<NodeGetInfoError> for tonic::Status {
  fn from(value: NodeGetInfoError) -> Self {
    match value {
      NodeGetInfoError::Other(v) => v,
    }
  }
}

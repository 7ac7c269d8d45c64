use std::convert::TryFrom;

use bitflags::bitflags;

use crate::proto;

#[rustfmt::skip]
bitflags! {
  pub struct NodeCapabilities: u32 {
    /// The CO calls `NodeStageVolume` before publishing.
    const STAGE_UNSTAGE_VOLUME = 0b_0001;
    const GET_VOLUME_STATS     = 0b_0010;
    const EXPAND_VOLUME        = 0b_0100;
  }
}

use proto::node_service_capability::rpc::Type;

const RPC_TYPES: &[(NodeCapabilities, Type)] = &[
  (NodeCapabilities::STAGE_UNSTAGE_VOLUME, Type::StageUnstageVolume),
  (NodeCapabilities::GET_VOLUME_STATS, Type::GetVolumeStats),
  (NodeCapabilities::EXPAND_VOLUME, Type::ExpandVolume),
];

impl TryFrom<NodeCapabilities> for proto::NodeGetCapabilitiesResponse {
  type Error = tonic::Status;

  fn try_from(value: NodeCapabilities) -> Result<Self, Self::Error> {
    let capabilities = RPC_TYPES
      .iter()
      .filter(|(flag, _)| value.contains(*flag))
      .map(|(_, rpc)| proto::NodeServiceCapability {
        r#type: Some(proto::node_service_capability::Type::Rpc(
          proto::node_service_capability::Rpc {
            r#type: *rpc as i32,
          },
        )),
      })
      .collect();

    Ok(proto::NodeGetCapabilitiesResponse { capabilities })
  }
}

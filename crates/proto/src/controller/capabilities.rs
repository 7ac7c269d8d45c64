use std::convert::TryFrom;

use bitflags::bitflags;

use crate::proto;

#[rustfmt::skip]
bitflags! {
  pub struct ControllerCapabilities: u32 {
    const CREATE_DELETE_VOLUME     = 0b_0000_0001;
    const PUBLISH_UNPUBLISH_VOLUME = 0b_0000_0010;
    const LIST_VOLUMES             = 0b_0000_0100;
    const GET_CAPACITY             = 0b_0000_1000;

    /// See `ControllerService::controller_expand_volume`.
    const EXPAND_VOLUME            = 0b_0001_0000;

    /// Indicates the plugin serves `ControllerGetVolume`.
    const GET_VOLUME               = 0b_0010_0000;
  }
}

use proto::controller_service_capability::rpc::Type;

const RPC_TYPES: &[(ControllerCapabilities, Type)] = &[
  (ControllerCapabilities::CREATE_DELETE_VOLUME, Type::CreateDeleteVolume),
  (ControllerCapabilities::PUBLISH_UNPUBLISH_VOLUME, Type::PublishUnpublishVolume),
  (ControllerCapabilities::LIST_VOLUMES, Type::ListVolumes),
  (ControllerCapabilities::GET_CAPACITY, Type::GetCapacity),
  (ControllerCapabilities::EXPAND_VOLUME, Type::ExpandVolume),
  (ControllerCapabilities::GET_VOLUME, Type::GetVolume),
];

impl TryFrom<ControllerCapabilities> for proto::ControllerGetCapabilitiesResponse {
  type Error = tonic::Status;

  fn try_from(value: ControllerCapabilities) -> Result<Self, Self::Error> {
    let capabilities = RPC_TYPES
      .iter()
      .filter(|(flag, _)| value.contains(*flag))
      .map(|(_, rpc)| proto::ControllerServiceCapability {
        r#type: Some(proto::controller_service_capability::Type::Rpc(
          proto::controller_service_capability::Rpc {
            r#type: *rpc as i32,
          },
        )),
      })
      .collect();

    Ok(proto::ControllerGetCapabilitiesResponse { capabilities })
  }
}

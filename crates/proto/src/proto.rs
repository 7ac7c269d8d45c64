//! The subset of the `csi.v1` protobuf messages served by this plugin.
//!
//! Field tags match `csi.proto`, so messages decode fields this plugin does
//! not model as unknown fields and skip them.

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPluginInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPluginInfoResponse {
  #[prost(string, tag = "1")]
  pub name: String,
  #[prost(string, tag = "2")]
  pub vendor_version: String,
  #[prost(map = "string, string", tag = "3")]
  pub manifest: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPluginCapabilitiesRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPluginCapabilitiesResponse {
  #[prost(message, repeated, tag = "1")]
  pub capabilities: Vec<PluginCapability>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PluginCapability {
  #[prost(oneof = "plugin_capability::Type", tags = "1")]
  pub r#type: Option<plugin_capability::Type>,
}

pub mod plugin_capability {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct Service {
    #[prost(enumeration = "service::Type", tag = "1")]
    pub r#type: i32,
  }

  pub mod service {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
      Unknown = 0,
      ControllerService = 1,
      VolumeAccessibilityConstraints = 2,
    }
  }

  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Type {
    #[prost(message, tag = "1")]
    Service(Service),
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProbeRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProbeResponse {
  #[prost(message, optional, tag = "1")]
  pub ready: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateVolumeRequest {
  #[prost(string, tag = "1")]
  pub name: String,
  #[prost(message, optional, tag = "2")]
  pub capacity_range: Option<CapacityRange>,
  #[prost(message, repeated, tag = "3")]
  pub volume_capabilities: Vec<VolumeCapability>,
  #[prost(map = "string, string", tag = "4")]
  pub parameters: HashMap<String, String>,
  #[prost(map = "string, string", tag = "5")]
  pub secrets: HashMap<String, String>,
  #[prost(message, optional, tag = "6")]
  pub volume_content_source: Option<VolumeContentSource>,
  #[prost(message, optional, tag = "7")]
  pub accessibility_requirements: Option<TopologyRequirement>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VolumeContentSource {
  #[prost(oneof = "volume_content_source::Type", tags = "1, 2")]
  pub r#type: Option<volume_content_source::Type>,
}

pub mod volume_content_source {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct SnapshotSource {
    #[prost(string, tag = "1")]
    pub snapshot_id: String,
  }

  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct VolumeSource {
    #[prost(string, tag = "1")]
    pub volume_id: String,
  }

  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Type {
    #[prost(message, tag = "1")]
    Snapshot(SnapshotSource),
    #[prost(message, tag = "2")]
    Volume(VolumeSource),
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateVolumeResponse {
  #[prost(message, optional, tag = "1")]
  pub volume: Option<Volume>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VolumeCapability {
  #[prost(oneof = "volume_capability::AccessType", tags = "1, 2")]
  pub access_type: Option<volume_capability::AccessType>,
  #[prost(message, optional, tag = "3")]
  pub access_mode: Option<volume_capability::AccessMode>,
}

pub mod volume_capability {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct BlockVolume {}

  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct MountVolume {
    #[prost(string, tag = "1")]
    pub fs_type: String,
    #[prost(string, repeated, tag = "2")]
    pub mount_flags: Vec<String>,
  }

  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct AccessMode {
    #[prost(enumeration = "access_mode::Mode", tag = "1")]
    pub mode: i32,
  }

  pub mod access_mode {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Mode {
      Unknown = 0,
      SingleNodeWriter = 1,
      SingleNodeReaderOnly = 2,
      MultiNodeReaderOnly = 3,
      MultiNodeSingleWriter = 4,
      MultiNodeMultiWriter = 5,
    }
  }

  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum AccessType {
    #[prost(message, tag = "1")]
    Block(BlockVolume),
    #[prost(message, tag = "2")]
    Mount(MountVolume),
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CapacityRange {
  #[prost(int64, tag = "1")]
  pub required_bytes: i64,
  #[prost(int64, tag = "2")]
  pub limit_bytes: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Volume {
  #[prost(int64, tag = "1")]
  pub capacity_bytes: i64,
  #[prost(string, tag = "2")]
  pub volume_id: String,
  #[prost(map = "string, string", tag = "3")]
  pub volume_context: HashMap<String, String>,
  #[prost(message, repeated, tag = "5")]
  pub accessible_topology: Vec<Topology>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopologyRequirement {
  #[prost(message, repeated, tag = "1")]
  pub requisite: Vec<Topology>,
  #[prost(message, repeated, tag = "2")]
  pub preferred: Vec<Topology>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Topology {
  #[prost(map = "string, string", tag = "1")]
  pub segments: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(map = "string, string", tag = "2")]
  pub secrets: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteVolumeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateVolumeCapabilitiesRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(map = "string, string", tag = "2")]
  pub volume_context: HashMap<String, String>,
  #[prost(message, repeated, tag = "3")]
  pub volume_capabilities: Vec<VolumeCapability>,
  #[prost(map = "string, string", tag = "4")]
  pub parameters: HashMap<String, String>,
  #[prost(map = "string, string", tag = "5")]
  pub secrets: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateVolumeCapabilitiesResponse {
  #[prost(message, optional, tag = "1")]
  pub confirmed: Option<validate_volume_capabilities_response::Confirmed>,
  #[prost(string, tag = "2")]
  pub message: String,
}

pub mod validate_volume_capabilities_response {
  use std::collections::HashMap;

  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct Confirmed {
    #[prost(map = "string, string", tag = "1")]
    pub volume_context: HashMap<String, String>,
    #[prost(message, repeated, tag = "2")]
    pub volume_capabilities: Vec<super::VolumeCapability>,
    #[prost(map = "string, string", tag = "3")]
    pub parameters: HashMap<String, String>,
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerGetCapabilitiesRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerGetCapabilitiesResponse {
  #[prost(message, repeated, tag = "1")]
  pub capabilities: Vec<ControllerServiceCapability>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerServiceCapability {
  #[prost(oneof = "controller_service_capability::Type", tags = "1")]
  pub r#type: Option<controller_service_capability::Type>,
}

pub mod controller_service_capability {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct Rpc {
    #[prost(enumeration = "rpc::Type", tag = "1")]
    pub r#type: i32,
  }

  pub mod rpc {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
      Unknown = 0,
      CreateDeleteVolume = 1,
      PublishUnpublishVolume = 2,
      ListVolumes = 3,
      GetCapacity = 4,
      CreateDeleteSnapshot = 5,
      ListSnapshots = 6,
      CloneVolume = 7,
      PublishReadonly = 8,
      ExpandVolume = 9,
      ListVolumesPublishedNodes = 10,
      VolumeCondition = 11,
      GetVolume = 12,
    }
  }

  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Type {
    #[prost(message, tag = "1")]
    Rpc(Rpc),
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerExpandVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(message, optional, tag = "2")]
  pub capacity_range: Option<CapacityRange>,
  #[prost(map = "string, string", tag = "3")]
  pub secrets: HashMap<String, String>,
  #[prost(message, optional, tag = "4")]
  pub volume_capability: Option<VolumeCapability>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerExpandVolumeResponse {
  #[prost(int64, tag = "1")]
  pub capacity_bytes: i64,
  #[prost(bool, tag = "2")]
  pub node_expansion_required: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerGetVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControllerGetVolumeResponse {
  #[prost(message, optional, tag = "1")]
  pub volume: Option<Volume>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeStageVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(map = "string, string", tag = "2")]
  pub publish_context: HashMap<String, String>,
  #[prost(string, tag = "3")]
  pub staging_target_path: String,
  #[prost(message, optional, tag = "4")]
  pub volume_capability: Option<VolumeCapability>,
  #[prost(map = "string, string", tag = "5")]
  pub secrets: HashMap<String, String>,
  #[prost(map = "string, string", tag = "6")]
  pub volume_context: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeStageVolumeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeUnstageVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(string, tag = "2")]
  pub staging_target_path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeUnstageVolumeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodePublishVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(map = "string, string", tag = "2")]
  pub publish_context: HashMap<String, String>,
  #[prost(string, tag = "3")]
  pub staging_target_path: String,
  #[prost(string, tag = "4")]
  pub target_path: String,
  #[prost(message, optional, tag = "5")]
  pub volume_capability: Option<VolumeCapability>,
  #[prost(bool, tag = "6")]
  pub readonly: bool,
  #[prost(map = "string, string", tag = "7")]
  pub secrets: HashMap<String, String>,
  #[prost(map = "string, string", tag = "8")]
  pub volume_context: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodePublishVolumeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeUnpublishVolumeRequest {
  #[prost(string, tag = "1")]
  pub volume_id: String,
  #[prost(string, tag = "2")]
  pub target_path: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeUnpublishVolumeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeGetCapabilitiesRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeGetCapabilitiesResponse {
  #[prost(message, repeated, tag = "1")]
  pub capabilities: Vec<NodeServiceCapability>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeServiceCapability {
  #[prost(oneof = "node_service_capability::Type", tags = "1")]
  pub r#type: Option<node_service_capability::Type>,
}

pub mod node_service_capability {
  #[derive(Clone, PartialEq, ::prost::Message)]
  pub struct Rpc {
    #[prost(enumeration = "rpc::Type", tag = "1")]
    pub r#type: i32,
  }

  pub mod rpc {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
      Unknown = 0,
      StageUnstageVolume = 1,
      GetVolumeStats = 2,
      ExpandVolume = 3,
      VolumeCondition = 4,
    }
  }

  #[derive(Clone, PartialEq, ::prost::Oneof)]
  pub enum Type {
    #[prost(message, tag = "1")]
    Rpc(Rpc),
  }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeGetInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeGetInfoResponse {
  #[prost(string, tag = "1")]
  pub node_id: String,
  #[prost(int64, tag = "2")]
  pub max_volumes_per_node: i64,
  #[prost(message, optional, tag = "3")]
  pub accessible_topology: Option<Topology>,
}

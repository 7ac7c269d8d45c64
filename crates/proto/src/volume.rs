use std::{
  collections::HashMap,
  convert::{TryFrom, TryInto},
  fmt,
  num::NonZeroU64,
};

use crate::proto;

pub type Topology = HashMap<String, String>;

/// Where a new volume should be pre-populated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeContentSource {
  Snapshot(String),
  Volume(String),
}

impl TryFrom<proto::VolumeContentSource> for Option<VolumeContentSource> {
  type Error = tonic::Status;

  fn try_from(value: proto::VolumeContentSource) -> Result<Self, Self::Error> {
    Ok(match value.r#type {
      None => None,
      Some(proto::volume_content_source::Type::Snapshot(v)) => Some(VolumeContentSource::Snapshot(
        crate::utils::required(v.snapshot_id, "VolumeContentSource.snapshot_id")?,
      )),
      Some(proto::volume_content_source::Type::Volume(v)) => Some(VolumeContentSource::Volume(
        crate::utils::required(v.volume_id, "VolumeContentSource.volume_id")?,
      )),
    })
  }
}

/// A provisioned volume as reported back to the CO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
  capacity_bytes: Option<NonZeroU64>,
  volume_id: String,
  volume_context: HashMap<String, String>,
  accessible_topology: Vec<Topology>,
}

impl Volume {
  pub fn new(volume_id: impl Into<String>, capacity_bytes: u64) -> Self {
    Volume {
      capacity_bytes: NonZeroU64::new(capacity_bytes),
      volume_id: volume_id.into(),
      volume_context: HashMap::new(),
      accessible_topology: Vec::new(),
    }
  }

  /// Attributes the CO passes back on every node call for this volume.
  pub fn with_context(mut self, volume_context: HashMap<String, String>) -> Self {
    self.volume_context = volume_context;
    self
  }

  pub fn with_topology(mut self, topology: Topology) -> Self {
    self.accessible_topology.push(topology);
    self
  }

  /// Capacity in bytes, zero when unknown.
  #[inline]
  pub fn capacity_bytes(&self) -> u64 {
    self.capacity_bytes.map(NonZeroU64::get).unwrap_or_default()
  }

  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  #[inline]
  pub fn volume_context(&self) -> &HashMap<String, String> {
    &self.volume_context
  }

  #[inline]
  pub fn accessible_topology(&self) -> &[Topology] {
    &self.accessible_topology
  }
}

impl TryFrom<Volume> for proto::Volume {
  type Error = tonic::Status;

  fn try_from(value: Volume) -> Result<Self, Self::Error> {
    let capacity_bytes = match value.capacity_bytes {
      None => 0,
      Some(v) => i64::try_from(v.get())
        .map_err(|_| tonic::Status::out_of_range("Volume.capacity_bytes overflows int64"))?,
    };

    Ok(proto::Volume {
      capacity_bytes,
      volume_id: value.volume_id,
      volume_context: value.volume_context,
      accessible_topology: value
        .accessible_topology
        .into_iter()
        .map(|segments| proto::Topology { segments })
        .collect(),
    })
  }
}

impl TryFrom<Volume> for proto::CreateVolumeResponse {
  type Error = tonic::Status;

  fn try_from(value: Volume) -> Result<Self, Self::Error> {
    Ok(proto::CreateVolumeResponse {
      volume: Some(value.try_into()?),
    })
  }
}

/// How a volume is going to be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AccessMode {
  Unknown,
  /// Published once as read/write on a single node.
  SingleNodeWriter,
  /// Published once as readonly on a single node.
  SingleNodeReaderOnly,
  /// Published as readonly on many nodes.
  MultiNodeReaderOnly,
  /// Published on many nodes, one of them read/write.
  MultiNodeSingleWriter,
  /// Published as read/write on many nodes.
  MultiNodeMultiWriter,
}

impl AccessMode {
  /// The CSI enum name, as used in log lines and error messages.
  pub fn as_str(self) -> &'static str {
    match self {
      AccessMode::Unknown => "UNKNOWN",
      AccessMode::SingleNodeWriter => "SINGLE_NODE_WRITER",
      AccessMode::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
      AccessMode::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
      AccessMode::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
      AccessMode::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
    }
  }
}

impl fmt::Display for AccessMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

use proto::volume_capability::access_mode::Mode;

impl From<proto::volume_capability::AccessMode> for AccessMode {
  fn from(value: proto::volume_capability::AccessMode) -> Self {
    match Mode::from_i32(value.mode) {
      Some(Mode::SingleNodeWriter) => AccessMode::SingleNodeWriter,
      Some(Mode::SingleNodeReaderOnly) => AccessMode::SingleNodeReaderOnly,
      Some(Mode::MultiNodeReaderOnly) => AccessMode::MultiNodeReaderOnly,
      Some(Mode::MultiNodeSingleWriter) => AccessMode::MultiNodeSingleWriter,
      Some(Mode::MultiNodeMultiWriter) => AccessMode::MultiNodeMultiWriter,
      Some(Mode::Unknown) | None => AccessMode::Unknown,
    }
  }
}

impl From<AccessMode> for proto::volume_capability::AccessMode {
  fn from(value: AccessMode) -> Self {
    let mode = match value {
      AccessMode::Unknown => Mode::Unknown,
      AccessMode::SingleNodeWriter => Mode::SingleNodeWriter,
      AccessMode::SingleNodeReaderOnly => Mode::SingleNodeReaderOnly,
      AccessMode::MultiNodeReaderOnly => Mode::MultiNodeReaderOnly,
      AccessMode::MultiNodeSingleWriter => Mode::MultiNodeSingleWriter,
      AccessMode::MultiNodeMultiWriter => Mode::MultiNodeMultiWriter,
    };

    proto::volume_capability::AccessMode { mode: mode as i32 }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessType {
  /// Accessed through the block device API.
  Block,

  /// Accessed through the filesystem API.
  Mount(MountVolume),
}

impl From<proto::volume_capability::AccessType> for AccessType {
  fn from(value: proto::volume_capability::AccessType) -> Self {
    match value {
      proto::volume_capability::AccessType::Block(_) => AccessType::Block,
      proto::volume_capability::AccessType::Mount(v) => AccessType::Mount(v.into()),
    }
  }
}

impl From<AccessType> for proto::volume_capability::AccessType {
  fn from(value: AccessType) -> Self {
    match value {
      AccessType::Block => {
        proto::volume_capability::AccessType::Block(proto::volume_capability::BlockVolume {})
      }
      AccessType::Mount(v) => proto::volume_capability::AccessType::Mount(v.into()),
    }
  }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct MountVolume {
  fs_type: Option<String>,
  mount_flags: Vec<String>,
}

impl MountVolume {
  pub fn new(fs_type: Option<String>, mount_flags: Vec<String>) -> Self {
    MountVolume {
      fs_type,
      mount_flags,
    }
  }

  #[inline]
  pub fn fs_type(&self) -> Option<&str> {
    self.fs_type.as_deref()
  }

  /// Extra mount options. These may carry sensitive values and are
  /// never printed.
  pub fn mount_flags(&self) -> impl Iterator<Item = &str> + ExactSizeIterator {
    self.mount_flags.iter().map(|v| &**v)
  }
}

impl From<proto::volume_capability::MountVolume> for MountVolume {
  fn from(value: proto::volume_capability::MountVolume) -> Self {
    let fs_type = Some(value.fs_type).filter(|v| !v.is_empty());

    MountVolume {
      fs_type,
      mount_flags: value.mount_flags,
    }
  }
}

impl From<MountVolume> for proto::volume_capability::MountVolume {
  fn from(value: MountVolume) -> Self {
    proto::volume_capability::MountVolume {
      fs_type: value.fs_type.unwrap_or_default(),
      mount_flags: value.mount_flags,
    }
  }
}

impl fmt::Debug for MountVolume {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MountVolume")
      .field("fs_type", &self.fs_type)
      .field(
        "mount_flags",
        &format!("REDACTED ({} items)", self.mount_flags.len()),
      )
      .finish()
  }
}

/// A requested access mode paired with the requested access type.
///
/// Both parts are kept even when they are missing or unknown so that the
/// plugin can report every unsupported capability instead of failing on
/// the first malformed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCapability {
  access_mode: AccessMode,
  access_type: Option<AccessType>,
}

impl VolumeCapability {
  pub fn new(access_mode: AccessMode, access_type: Option<AccessType>) -> Self {
    VolumeCapability {
      access_mode,
      access_type,
    }
  }

  /// Filesystem access with no extra options.
  pub fn mount(access_mode: AccessMode) -> Self {
    Self::new(access_mode, Some(AccessType::Mount(MountVolume::default())))
  }

  #[inline]
  pub fn access_mode(&self) -> AccessMode {
    self.access_mode
  }

  #[inline]
  pub fn access_type(&self) -> Option<&AccessType> {
    self.access_type.as_ref()
  }
}

impl From<proto::VolumeCapability> for VolumeCapability {
  fn from(value: proto::VolumeCapability) -> Self {
    VolumeCapability {
      access_mode: value
        .access_mode
        .map(AccessMode::from)
        .unwrap_or(AccessMode::Unknown),
      access_type: value.access_type.map(AccessType::from),
    }
  }
}

impl From<VolumeCapability> for proto::VolumeCapability {
  fn from(value: VolumeCapability) -> Self {
    proto::VolumeCapability {
      access_mode: Some(value.access_mode.into()),
      access_type: value.access_type.map(Into::into),
    }
  }
}

/// Requested size bounds. A zero bound on the wire means the bound is unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityRange {
  required: Option<NonZeroU64>,
  limit: Option<NonZeroU64>,
}

impl CapacityRange {
  pub fn new(required_bytes: u64, limit_bytes: u64) -> Self {
    CapacityRange {
      required: NonZeroU64::new(required_bytes),
      limit: NonZeroU64::new(limit_bytes),
    }
  }

  /// The volume must be at least this big.
  #[inline]
  pub fn required(&self) -> Option<u64> {
    self.required.map(NonZeroU64::get)
  }

  /// The volume must not be bigger than this.
  #[inline]
  pub fn limit(&self) -> Option<u64> {
    self.limit.map(NonZeroU64::get)
  }
}

impl TryFrom<proto::CapacityRange> for CapacityRange {
  type Error = tonic::Status;

  fn try_from(value: proto::CapacityRange) -> Result<Self, Self::Error> {
    let required = u64::try_from(value.required_bytes).map_err(|_| {
      tonic::Status::invalid_argument("CapacityRange.required_bytes cannot be negative")
    })?;
    let limit = u64::try_from(value.limit_bytes).map_err(|_| {
      tonic::Status::invalid_argument("CapacityRange.limit_bytes cannot be negative")
    })?;

    Ok(CapacityRange::new(required, limit))
  }
}

/// Topology constraints on where the new volume must be reachable from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyRequirement {
  requisite: Vec<Topology>,
  preferred: Vec<Topology>,
}

impl TopologyRequirement {
  pub fn new(requisite: Vec<Topology>, preferred: Vec<Topology>) -> Self {
    TopologyRequirement {
      requisite,
      preferred,
    }
  }

  /// The volume must be accessible from at least one of these.
  #[inline]
  pub fn requisite(&self) -> &[Topology] {
    &self.requisite
  }

  #[inline]
  pub fn preferred(&self) -> &[Topology] {
    &self.preferred
  }
}

impl From<proto::TopologyRequirement> for TopologyRequirement {
  fn from(value: proto::TopologyRequirement) -> Self {
    TopologyRequirement {
      requisite: value.requisite.into_iter().map(|t| t.segments).collect(),
      preferred: value.preferred.into_iter().map(|t| t.segments).collect(),
    }
  }
}

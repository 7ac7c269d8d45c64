use crate::{
  capabilities::validate_capabilities,
  capacity::{self, ByteSize},
  driver::Driver,
  meta::{FsMeta, MetadataError, VolumeMetadataStore},
  mounter::MounterType,
  s3::{GatewayError, ObjectStoreGateway},
  volume_id::{split_bucket_prefix, VolumeIdentity, CONTEXT_CAPACITY, PARAM_MOUNTER},
};
use async_trait::async_trait;
use bytes::Bytes;
use csi::controller::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Topology segment naming the region a volume can be created in.
pub const TOPOLOGY_REGION_KEY: &str = "region";

const MARKER_CONTENT_TYPE: &str = "application/x-directory";

status_into!(CreateVolumeError: GatewayError, MetadataError);
status_into!(DeleteVolumeError: GatewayError, MetadataError);
status_into!(ValidateVolumeCapabilitiesError: GatewayError);

impl Driver {
  /// Volumes live in the configured region. A requirement is satisfiable
  /// when one of its requisite topologies either names that region or no
  /// region at all.
  fn check_accessibility(
    &self,
    requirements: Option<&TopologyRequirement>,
  ) -> Result<(), CreateVolumeError> {
    let requisite = match requirements {
      Some(requirements) if !requirements.requisite().is_empty() => requirements.requisite(),
      _ => return Ok(()),
    };

    let region = &self.config().region;
    let satisfiable = requisite.iter().any(|topology| {
      topology
        .get(TOPOLOGY_REGION_KEY)
        .map_or(true, |requested| requested == region)
    });

    if satisfiable {
      Ok(())
    } else {
      Err(CreateVolumeError::UnsatisfiableTopology(format!(
        "volumes can only be created in region {}",
        region
      )))
    }
  }

  /// Writes the directory marker, then the metadata record. Safe to repeat.
  async fn provision(
    &self,
    gateway: &dyn ObjectStoreGateway,
    store: &VolumeMetadataStore,
    identity: &VolumeIdentity,
    meta: &FsMeta,
  ) -> Result<(), CreateVolumeError> {
    if let Some(marker) = identity.marker_key() {
      debug!(bucket = %identity.bucket, marker = %marker, "Creating prefix marker");
      gateway
        .put_object(&identity.bucket, &marker, Bytes::new(), MARKER_CONTENT_TYPE)
        .await?;
    }

    store.put(meta).await?;
    Ok(())
  }
}

#[async_trait]
impl ControllerService for Driver {
  fn capabilities(&self) -> ControllerCapabilities {
    ControllerCapabilities::CREATE_DELETE_VOLUME
  }

  async fn create_volume(&self, request: CreateVolumeRequest) -> Result<Volume, CreateVolumeError> {
    if let Some(source) = request.volume_content_source() {
      return Err(CreateVolumeError::InvalidArgument(format!(
        "volume content source {:?} is not supported",
        source
      )));
    }

    let violations = validate_capabilities(request.volume_capabilities());
    if !violations.is_empty() {
      return Err(CreateVolumeError::InvalidArgument(violations.join("; ")));
    }

    let identity = VolumeIdentity::resolve(request.name(), request.parameters());
    let capacity = capacity::resolve(request.capacity_range())
      .map_err(|e| CreateVolumeError::UnsupportedCapacityRange(e.to_string()))?;
    self.check_accessibility(request.accessibility_requirements())?;

    let mounter = MounterType::from_key(
      request.parameters().get(PARAM_MOUNTER).map(String::as_str),
      self.config().default_mounter,
    )
    .map_err(|e| CreateVolumeError::InvalidArgument(e.to_string()))?;

    let gateway = self.gateway(request.secrets()).await?;
    let store = VolumeMetadataStore::new(Arc::new(gateway.clone()));
    let meta = FsMeta::new(&identity, mounter.as_str(), capacity);

    let capacity = if !gateway.bucket_exists(&identity.bucket).await? {
      info!(bucket = %identity.bucket, "Creating bucket");
      gateway.create_bucket(&identity.bucket).await?;
      self.provision(&gateway, &store, &identity, &meta).await?;
      capacity
    } else {
      let existing = match store.get(&identity.bucket, &identity.prefix).await {
        Ok(existing) => existing,
        Err(e @ MetadataError::Corrupt { .. }) => {
          warn!(volume_id = %identity.volume_id, "Rewriting unreadable volume metadata: {}", e);
          None
        }
        Err(e) => return Err(e.into()),
      };

      match existing {
        None => {
          info!(
            volume_id = %identity.volume_id,
            "Bucket exists without volume metadata, finishing provisioning"
          );
          self.provision(&gateway, &store, &identity, &meta).await?;
          capacity
        }
        Some(existing) => {
          let requested = request.capacity_range().and_then(CapacityRange::required);
          if let Some(requested) = requested.filter(|&r| r > existing.capacity_bytes) {
            return Err(CreateVolumeError::IncompatibleVolumeExists(format!(
              "volume {} already exists with capacity {}, {} requested",
              identity.volume_id,
              ByteSize(existing.capacity_bytes),
              ByteSize(requested)
            )));
          }

          debug!(volume_id = %identity.volume_id, "Volume already provisioned");
          existing.capacity_bytes
        }
      }
    };

    info!(
      volume_id = %identity.volume_id,
      capacity = %ByteSize(capacity),
      "Volume ready"
    );
    let mut context = request.parameters().clone();
    context.insert(CONTEXT_CAPACITY.to_string(), capacity.to_string());
    Ok(Volume::new(identity.volume_id, capacity).with_context(context))
  }

  async fn delete_volume(&self, request: DeleteVolumeRequest) -> Result<(), DeleteVolumeError> {
    let (bucket, prefix) = split_bucket_prefix(request.volume_id());
    let gateway = self.gateway(request.secrets()).await?;

    if !gateway.bucket_exists(bucket).await? {
      info!(bucket, "Bucket does not exist, nothing to delete");
      return Ok(());
    }

    let listing_prefix = if prefix.is_empty() {
      String::new()
    } else {
      format!("{}/", prefix)
    };
    let keys = gateway.list_objects(bucket, &listing_prefix).await?;
    debug!(bucket, prefix, "Deleting {} objects", keys.len());
    for key in &keys {
      gateway.delete_object(bucket, key).await?;
    }

    VolumeMetadataStore::new(Arc::new(gateway.clone()))
      .delete(bucket, prefix)
      .await?;

    if prefix.is_empty() {
      gateway.delete_bucket(bucket).await?;
    }

    info!(volume_id = request.volume_id(), "Volume deleted");
    Ok(())
  }

  async fn validate_volume_capabilities(
    &self,
    request: ValidateVolumeCapabilitiesRequest,
  ) -> Result<ValidateVolumeCapabilitiesResponse, ValidateVolumeCapabilitiesError> {
    let (bucket, _) = split_bucket_prefix(request.volume_id());
    let gateway = self.gateway(request.secrets()).await?;

    if !gateway.bucket_exists(bucket).await? {
      return Err(ValidateVolumeCapabilitiesError::VolumeNotFound(format!(
        "bucket {} does not exist",
        bucket
      )));
    }

    let violations = validate_capabilities(request.volume_capabilities());
    if !violations.is_empty() {
      return Ok(ValidateVolumeCapabilitiesResponse::Message(
        violations.join("; "),
      ));
    }

    Ok(ValidateVolumeCapabilitiesResponse::Confirmed(
      Confirmed::new(
        request.volume_context().clone(),
        request.volume_capabilities().to_vec(),
        request.parameters().clone(),
      ),
    ))
  }
}

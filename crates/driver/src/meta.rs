use crate::{
  s3::{GatewayError, ObjectStoreGateway},
  volume_id::{join_key, VolumeIdentity},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const METADATA_FILE: &str = ".metadata.json";
const METADATA_CONTENT_TYPE: &str = "application/json";

/// Persisted description of a provisioned volume. Written once when the
/// volume is created, then only read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsMeta {
  #[serde(rename = "Name")]
  pub bucket_name: String,
  #[serde(rename = "Prefix")]
  pub prefix: String,
  #[serde(rename = "UsePrefix")]
  pub use_prefix: bool,
  #[serde(rename = "Mounter")]
  pub mounter: String,
  #[serde(rename = "FSPath")]
  pub fs_path: String,
  #[serde(rename = "CapacityBytes")]
  pub capacity_bytes: u64,
}

impl FsMeta {
  pub fn new(identity: &VolumeIdentity, mounter: impl Into<String>, capacity_bytes: u64) -> Self {
    FsMeta {
      bucket_name: identity.bucket.clone(),
      prefix: identity.prefix.clone(),
      use_prefix: identity.use_prefix,
      mounter: mounter.into(),
      fs_path: identity.fs_path.clone(),
      capacity_bytes,
    }
  }

  /// `prefix/fs_path` without empty components.
  pub fn fs_root(&self) -> String {
    join_key(&[&self.prefix, &self.fs_path])
  }
}

/// Object key of the record for a volume under `prefix`.
pub fn metadata_key(prefix: &str) -> String {
  join_key(&[prefix, METADATA_FILE])
}

#[derive(Debug, Error)]
pub enum MetadataError {
  #[error(transparent)]
  Gateway(#[from] GatewayError),

  #[error("Corrupt volume metadata at {bucket}/{key}: {source}")]
  Corrupt {
    bucket: String,
    key: String,
    source: serde_json::Error,
  },

  #[error("Failed to encode volume metadata: {0}")]
  Encode(serde_json::Error),
}

impl From<MetadataError> for tonic::Status {
  fn from(value: MetadataError) -> Self {
    match value {
      MetadataError::Gateway(e) => e.into(),
      other => tonic::Status::internal(other.to_string()),
    }
  }
}

/// Reads and writes [`FsMeta`] records next to the volume data.
#[derive(Clone)]
pub struct VolumeMetadataStore {
  gateway: Arc<dyn ObjectStoreGateway>,
}

impl VolumeMetadataStore {
  pub fn new(gateway: Arc<dyn ObjectStoreGateway>) -> Self {
    VolumeMetadataStore { gateway }
  }

  /// The record of the volume under `prefix`, `None` when there is none.
  pub async fn get(&self, bucket: &str, prefix: &str) -> Result<Option<FsMeta>, MetadataError> {
    let key = metadata_key(prefix);
    let body = match self.gateway.get_object(bucket, &key).await {
      Ok(body) => body,
      Err(e) if e.is_not_found() => {
        debug!(bucket, key = %key, "No volume metadata");
        return Ok(None);
      }
      Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&body)
      .map(Some)
      .map_err(|source| MetadataError::Corrupt {
        bucket: bucket.to_string(),
        key,
        source,
      })
  }

  pub async fn put(&self, meta: &FsMeta) -> Result<(), MetadataError> {
    let body = serde_json::to_vec(meta).map_err(MetadataError::Encode)?;
    let key = metadata_key(&meta.prefix);
    debug!(bucket = %meta.bucket_name, key = %key, "Writing volume metadata");

    self
      .gateway
      .put_object(&meta.bucket_name, &key, Bytes::from(body), METADATA_CONTENT_TYPE)
      .await?;
    Ok(())
  }

  /// Removes the record. A missing record or bucket is not an error.
  pub async fn delete(&self, bucket: &str, prefix: &str) -> Result<(), MetadataError> {
    match self.gateway.delete_object(bucket, &metadata_key(prefix)).await {
      Err(e) if !e.is_not_found() => Err(e.into()),
      _ => Ok(()),
    }
  }
}

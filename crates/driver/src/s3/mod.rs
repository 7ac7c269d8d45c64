//! The narrow slice of an S3 compatible object store the driver talks to.

mod aws;
mod memory;

pub use aws::{AwsGatewayFactory, S3Gateway};
pub use memory::{MemoryGateway, SharedGatewayFactory};

use async_trait::async_trait;
use bytes::Bytes;
use csi::Secrets;
use std::{fmt, future::Future, sync::Arc, time::Duration};
use thiserror::Error;

pub const SECRET_ACCESS_KEY_ID: &str = "accessKeyID";
pub const SECRET_SECRET_ACCESS_KEY: &str = "secretAccessKey";
pub const SECRET_REGION: &str = "region";
pub const SECRET_ENDPOINT: &str = "endpoint";

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("{bucket}/{key} does not exist")]
  NotFound { bucket: String, key: String },

  #[error("Object store did not answer within {0:?}")]
  Timeout(Duration),

  #[error("Object store unavailable: {0}")]
  Unavailable(String),

  #[error("Object store request failed: {0}")]
  Other(String),
}

impl GatewayError {
  pub fn not_found(bucket: &str, key: &str) -> Self {
    GatewayError::NotFound {
      bucket: bucket.to_string(),
      key: key.to_string(),
    }
  }

  #[inline]
  pub fn is_not_found(&self) -> bool {
    matches!(self, GatewayError::NotFound { .. })
  }
}

impl From<GatewayError> for tonic::Status {
  fn from(value: GatewayError) -> Self {
    let code = match &value {
      GatewayError::NotFound { .. } => tonic::Code::NotFound,
      GatewayError::Timeout(_) => tonic::Code::DeadlineExceeded,
      GatewayError::Unavailable(_) => tonic::Code::Unavailable,
      GatewayError::Other(_) => tonic::Code::Internal,
    };

    tonic::Status::new(code, value.to_string())
  }
}

/// Object store operations used by the controller and the health checks.
/// Keys never start with a `/`.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync + 'static {
  async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

  /// Creating a bucket the caller already owns succeeds.
  async fn create_bucket(&self, bucket: &str) -> Result<()>;

  /// Writes the whole object, replacing any previous version.
  async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: &str)
    -> Result<()>;

  /// Fails with [`GatewayError::NotFound`] when the object is missing.
  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

  /// Keys starting with `prefix`, in lexicographic order.
  async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

  /// Deleting a missing object succeeds.
  async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

  /// The bucket must be empty.
  async fn delete_bucket(&self, bucket: &str) -> Result<()>;

  async fn list_buckets(&self) -> Result<Vec<String>>;
}

/// Where and as whom to reach the object store.
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
  pub access_key_id: String,
  pub secret_access_key: String,
  pub region: String,
  pub endpoint: Option<String>,
}

impl S3Config {
  /// Values from the request secrets, falling back to `region` and
  /// `endpoint` for the ones the secrets leave out.
  pub fn from_secrets(secrets: &Secrets, region: &str, endpoint: Option<&str>) -> Self {
    let value = |key| secrets.get(key).filter(|v| !v.is_empty());

    S3Config {
      access_key_id: value(SECRET_ACCESS_KEY_ID).unwrap_or_default().to_string(),
      secret_access_key: value(SECRET_SECRET_ACCESS_KEY)
        .unwrap_or_default()
        .to_string(),
      region: value(SECRET_REGION).unwrap_or(region).to_string(),
      endpoint: value(SECRET_ENDPOINT).or(endpoint).map(ToString::to_string),
    }
  }

  #[inline]
  pub fn has_credentials(&self) -> bool {
    !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
  }

  /// The configured endpoint, or the public AWS endpoint of the region.
  pub fn endpoint_url(&self) -> String {
    match &self.endpoint {
      Some(endpoint) => endpoint.clone(),
      None => format!("https://s3.{}.amazonaws.com", self.region),
    }
  }
}

impl fmt::Debug for S3Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("S3Config")
      .field("access_key_id", &self.access_key_id)
      .field("secret_access_key", &"REDACTED")
      .field("region", &self.region)
      .field("endpoint", &self.endpoint)
      .finish()
  }
}

/// Builds a gateway for one request.
#[async_trait]
pub trait GatewayFactory: Send + Sync + 'static {
  async fn connect(&self, config: &S3Config) -> Result<Arc<dyn ObjectStoreGateway>>;
}

/// Bounds every call of the wrapped gateway by `timeout`.
#[derive(Clone)]
pub struct BoundedGateway {
  inner: Arc<dyn ObjectStoreGateway>,
  timeout: Duration,
}

impl BoundedGateway {
  pub fn new(inner: Arc<dyn ObjectStoreGateway>, timeout: Duration) -> Self {
    BoundedGateway { inner, timeout }
  }

  async fn bounded<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(self.timeout, future).await {
      Ok(result) => result,
      Err(_) => Err(GatewayError::Timeout(self.timeout)),
    }
  }
}

#[async_trait]
impl ObjectStoreGateway for BoundedGateway {
  async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
    self.bounded(self.inner.bucket_exists(bucket)).await
  }

  async fn create_bucket(&self, bucket: &str) -> Result<()> {
    self.bounded(self.inner.create_bucket(bucket)).await
  }

  async fn put_object(
    &self,
    bucket: &str,
    key: &str,
    body: Bytes,
    content_type: &str,
  ) -> Result<()> {
    self
      .bounded(self.inner.put_object(bucket, key, body, content_type))
      .await
  }

  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
    self.bounded(self.inner.get_object(bucket, key)).await
  }

  async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    self.bounded(self.inner.list_objects(bucket, prefix)).await
  }

  async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
    self.bounded(self.inner.delete_object(bucket, key)).await
  }

  async fn delete_bucket(&self, bucket: &str) -> Result<()> {
    self.bounded(self.inner.delete_bucket(bucket)).await
  }

  async fn list_buckets(&self) -> Result<Vec<String>> {
    self.bounded(self.inner.list_buckets()).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::future::pending;
  use std::collections::HashMap;

  struct Hanging;

  #[async_trait]
  impl ObjectStoreGateway for Hanging {
    async fn bucket_exists(&self, _bucket: &str) -> Result<bool> {
      pending().await
    }

    async fn create_bucket(&self, _bucket: &str) -> Result<()> {
      pending().await
    }

    async fn put_object(&self, _bucket: &str, _key: &str, _body: Bytes, _ct: &str) -> Result<()> {
      pending().await
    }

    async fn get_object(&self, _bucket: &str, _key: &str) -> Result<Bytes> {
      pending().await
    }

    async fn list_objects(&self, _bucket: &str, _prefix: &str) -> Result<Vec<String>> {
      pending().await
    }

    async fn delete_object(&self, _bucket: &str, _key: &str) -> Result<()> {
      pending().await
    }

    async fn delete_bucket(&self, _bucket: &str) -> Result<()> {
      pending().await
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
      pending().await
    }
  }

  #[tokio::test]
  async fn slow_calls_time_out() {
    let gateway = BoundedGateway::new(Arc::new(Hanging), Duration::from_millis(10));

    let err = gateway.bucket_exists("bucket").await.unwrap_err();
    assert!(matches!(err, GatewayError::Timeout(_)), "{:?}", err);
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::DeadlineExceeded
    );
  }

  #[test]
  fn errors_map_to_status_codes() {
    let cases = vec![
      (GatewayError::not_found("b", "k"), tonic::Code::NotFound),
      (
        GatewayError::Unavailable("connection refused".into()),
        tonic::Code::Unavailable,
      ),
      (GatewayError::Other("AccessDenied".into()), tonic::Code::Internal),
    ];

    for (err, code) in cases {
      assert_eq!(tonic::Status::from(err).code(), code);
    }
  }

  #[test]
  fn secrets_override_defaults() {
    let secrets: Secrets = vec![
      ("accessKeyID", "AKIA"),
      ("secretAccessKey", "hunter2"),
      ("endpoint", "http://minio:9000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect::<HashMap<_, _>>()
    .into();

    let config = S3Config::from_secrets(&secrets, "eu-west-1", None);
    assert_eq!(config.access_key_id, "AKIA");
    assert_eq!(config.region, "eu-west-1");
    assert_eq!(config.endpoint_url(), "http://minio:9000");
    assert!(config.has_credentials());
    assert!(!format!("{:?}", config).contains("hunter2"));

    let config = S3Config::from_secrets(&Secrets::default(), "eu-west-1", None);
    assert!(!config.has_credentials());
    assert_eq!(config.endpoint_url(), "https://s3.eu-west-1.amazonaws.com");
  }
}

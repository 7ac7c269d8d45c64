use super::{GatewayError, GatewayFactory, ObjectStoreGateway, Result, S3Config};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard},
};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredObject {
  body: Bytes,
  content_type: String,
}

#[derive(Default)]
struct MemoryGatewayInner {
  buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
  calls: HashMap<&'static str, usize>,
  unavailable: bool,
}

/// In-process object store. Counts the calls made per operation and can be
/// switched to answer everything with [`GatewayError::Unavailable`].
#[derive(Default)]
pub struct MemoryGateway(Mutex<MemoryGatewayInner>);

impl MemoryGateway {
  pub fn new() -> Self {
    Self::default()
  }

  fn inner(&self) -> MutexGuard<'_, MemoryGatewayInner> {
    match self.0.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// Counts the call and fails it when the store is marked unavailable.
  fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryGatewayInner>> {
    let mut inner = self.inner();
    *inner.calls.entry(operation).or_insert(0) += 1;
    debug!("Memory gateway: {}", operation);

    if inner.unavailable {
      return Err(GatewayError::Unavailable(format!(
        "{} refused, store is offline",
        operation
      )));
    }

    Ok(inner)
  }

  /// Number of calls to `operation` so far, `"create_bucket"` for example.
  pub fn calls(&self, operation: &str) -> usize {
    self.inner().calls.get(operation).copied().unwrap_or(0)
  }

  pub fn set_unavailable(&self, unavailable: bool) {
    self.inner().unavailable = unavailable;
  }

  pub fn has_bucket(&self, bucket: &str) -> bool {
    self.inner().buckets.contains_key(bucket)
  }

  pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
    self
      .inner()
      .buckets
      .get(bucket)
      .and_then(|objects| objects.get(key))
      .map(|object| object.body.clone())
  }

  pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
    self
      .inner()
      .buckets
      .get(bucket)
      .and_then(|objects| objects.get(key))
      .map(|object| object.content_type.clone())
  }

  /// Every key in `bucket`, without touching the call counters.
  pub fn keys(&self, bucket: &str) -> Vec<String> {
    self
      .inner()
      .buckets
      .get(bucket)
      .map(|objects| objects.keys().cloned().collect())
      .unwrap_or_default()
  }
}

fn no_such_bucket(bucket: &str) -> GatewayError {
  GatewayError::not_found(bucket, "")
}

#[async_trait]
impl ObjectStoreGateway for MemoryGateway {
  async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
    let inner = self.enter("bucket_exists")?;
    Ok(inner.buckets.contains_key(bucket))
  }

  async fn create_bucket(&self, bucket: &str) -> Result<()> {
    let mut inner = self.enter("create_bucket")?;
    inner.buckets.entry(bucket.to_string()).or_default();
    Ok(())
  }

  async fn put_object(
    &self,
    bucket: &str,
    key: &str,
    body: Bytes,
    content_type: &str,
  ) -> Result<()> {
    let mut inner = self.enter("put_object")?;
    let objects = inner
      .buckets
      .get_mut(bucket)
      .ok_or_else(|| no_such_bucket(bucket))?;
    objects.insert(
      key.to_string(),
      StoredObject {
        body,
        content_type: content_type.to_string(),
      },
    );
    Ok(())
  }

  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
    let inner = self.enter("get_object")?;
    inner
      .buckets
      .get(bucket)
      .and_then(|objects| objects.get(key))
      .map(|object| object.body.clone())
      .ok_or_else(|| GatewayError::not_found(bucket, key))
  }

  async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let inner = self.enter("list_objects")?;
    let objects = inner
      .buckets
      .get(bucket)
      .ok_or_else(|| no_such_bucket(bucket))?;
    Ok(
      objects
        .keys()
        .filter(|key| key.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }

  async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
    let mut inner = self.enter("delete_object")?;
    let objects = inner
      .buckets
      .get_mut(bucket)
      .ok_or_else(|| no_such_bucket(bucket))?;
    objects.remove(key);
    Ok(())
  }

  async fn delete_bucket(&self, bucket: &str) -> Result<()> {
    let mut inner = self.enter("delete_bucket")?;
    match inner.buckets.get(bucket) {
      None => Err(no_such_bucket(bucket)),
      Some(objects) if !objects.is_empty() => Err(GatewayError::Other(format!(
        "BucketNotEmpty: {} still holds {} objects",
        bucket,
        objects.len()
      ))),
      Some(_) => {
        inner.buckets.remove(bucket);
        Ok(())
      }
    }
  }

  async fn list_buckets(&self) -> Result<Vec<String>> {
    let inner = self.enter("list_buckets")?;
    Ok(inner.buckets.keys().cloned().collect())
  }
}

/// Hands out the same gateway for every request, whatever the credentials.
#[derive(Clone)]
pub struct SharedGatewayFactory(Arc<dyn ObjectStoreGateway>);

impl SharedGatewayFactory {
  pub fn new(gateway: Arc<dyn ObjectStoreGateway>) -> Self {
    SharedGatewayFactory(gateway)
  }
}

#[async_trait]
impl GatewayFactory for SharedGatewayFactory {
  async fn connect(&self, _config: &S3Config) -> Result<Arc<dyn ObjectStoreGateway>> {
    Ok(self.0.clone())
  }
}

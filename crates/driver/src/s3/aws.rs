use super::{GatewayError, GatewayFactory, ObjectStoreGateway, Result, S3Config};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
  config::{Credentials, Region},
  error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
  primitives::ByteStream,
  types::{BucketLocationConstraint, CreateBucketConfiguration},
  Client,
};
use bytes::Bytes;
use std::{error::Error, sync::Arc};
use tracing::{debug, trace};

/// The region S3 creates buckets in when no location constraint is given.
const DEFAULT_BUCKET_REGION: &str = "us-east-1";

/// Gateway backed by Amazon S3 or an S3 compatible store (MinIO, Ceph RGW).
pub struct S3Gateway {
  client: Client,
  region: String,
}

impl S3Gateway {
  pub async fn connect(config: &S3Config) -> Result<Self> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
      .region(Region::new(config.region.clone()))
      .load()
      .await;

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

    if config.has_credentials() {
      s3_config_builder = s3_config_builder.credentials_provider(Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "csi-secrets",
      ));
    }

    if let Some(endpoint) = &config.endpoint {
      s3_config_builder = s3_config_builder
        .endpoint_url(endpoint)
        .force_path_style(true);
    }

    debug!(
      region = %config.region,
      endpoint = %config.endpoint_url(),
      "Connecting to object store"
    );

    Ok(S3Gateway {
      client: Client::from_conf(s3_config_builder.build()),
      region: config.region.clone(),
    })
  }
}

/// Connection problems are worth a retry, everything else is reported as
/// is.
fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> GatewayError
where
  E: Error + Send + Sync + 'static,
  R: std::fmt::Debug,
{
  let message = format!("{}: {}", operation, DisplayErrorContext(&err));
  match err {
    SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => GatewayError::Unavailable(message),
    _ => GatewayError::Other(message),
  }
}

#[async_trait]
impl ObjectStoreGateway for S3Gateway {
  async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
    match self.client.head_bucket().bucket(bucket).send().await {
      Ok(_) => Ok(true),
      Err(e) => match e.as_service_error() {
        Some(service_error) if service_error.is_not_found() => Ok(false),
        _ => Err(classify("HeadBucket", e)),
      },
    }
  }

  async fn create_bucket(&self, bucket: &str) -> Result<()> {
    let mut request = self.client.create_bucket().bucket(bucket);
    if self.region != DEFAULT_BUCKET_REGION {
      request = request.create_bucket_configuration(
        CreateBucketConfiguration::builder()
          .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
          .build(),
      );
    }

    match request.send().await {
      Ok(_) => Ok(()),
      Err(e) => match e.as_service_error() {
        Some(service_error) if service_error.is_bucket_already_owned_by_you() => Ok(()),
        _ => Err(classify("CreateBucket", e)),
      },
    }
  }

  async fn put_object(
    &self,
    bucket: &str,
    key: &str,
    body: Bytes,
    content_type: &str,
  ) -> Result<()> {
    trace!(bucket, key, "PutObject");
    self
      .client
      .put_object()
      .bucket(bucket)
      .key(key)
      .content_type(content_type)
      .body(ByteStream::from(body))
      .send()
      .await
      .map(|_| ())
      .map_err(|e| classify("PutObject", e))
  }

  async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
    let result = match self.client.get_object().bucket(bucket).key(key).send().await {
      Ok(result) => result,
      Err(e) => {
        return Err(match e.as_service_error() {
          Some(service_error) if service_error.is_no_such_key() => {
            GatewayError::not_found(bucket, key)
          }
          _ => classify("GetObject", e),
        })
      }
    };

    let data = result
      .body
      .collect()
      .await
      .map_err(|e| GatewayError::Unavailable(format!("GetObject body: {}", e)))?;
    Ok(data.into_bytes())
  }

  async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
      let mut request = self.client.list_objects_v2().bucket(bucket);
      if !prefix.is_empty() {
        request = request.prefix(prefix);
      }
      if let Some(token) = continuation_token.take() {
        request = request.continuation_token(token);
      }

      let result = match request.send().await {
        Ok(result) => result,
        Err(e) => {
          return Err(match e.as_service_error() {
            Some(service_error) if service_error.is_no_such_bucket() => {
              GatewayError::not_found(bucket, prefix)
            }
            _ => classify("ListObjectsV2", e),
          })
        }
      };

      keys.extend(
        result
          .contents()
          .iter()
          .filter_map(|obj| obj.key())
          .map(ToString::to_string),
      );

      if result.is_truncated().unwrap_or(false) {
        continuation_token = result.next_continuation_token().map(ToString::to_string);
        if continuation_token.is_none() {
          break;
        }
      } else {
        break;
      }
    }

    keys.sort();
    Ok(keys)
  }

  async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
    trace!(bucket, key, "DeleteObject");
    self
      .client
      .delete_object()
      .bucket(bucket)
      .key(key)
      .send()
      .await
      .map(|_| ())
      .map_err(|e| classify("DeleteObject", e))
  }

  async fn delete_bucket(&self, bucket: &str) -> Result<()> {
    match self.client.delete_bucket().bucket(bucket).send().await {
      Ok(_) => Ok(()),
      Err(e) if e.code() == Some("NoSuchBucket") => Err(GatewayError::not_found(bucket, "")),
      Err(e) => Err(classify("DeleteBucket", e)),
    }
  }

  async fn list_buckets(&self) -> Result<Vec<String>> {
    let result = self
      .client
      .list_buckets()
      .send()
      .await
      .map_err(|e| classify("ListBuckets", e))?;

    Ok(
      result
        .buckets()
        .iter()
        .filter_map(|bucket| bucket.name())
        .map(ToString::to_string)
        .collect(),
    )
  }
}

/// Connects a new [`S3Gateway`] for every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AwsGatewayFactory;

#[async_trait]
impl GatewayFactory for AwsGatewayFactory {
  async fn connect(&self, config: &S3Config) -> Result<Arc<dyn ObjectStoreGateway>> {
    Ok(Arc::new(S3Gateway::connect(config).await?))
  }
}

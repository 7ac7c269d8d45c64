use crate::{
  config::DriverConfig,
  health::{HealthChecker, ObjectStoreCheck},
  s3::{AwsGatewayFactory, BoundedGateway, GatewayError, GatewayFactory, S3Config},
};
use async_trait::async_trait;
use csi::{IdentityService, Secrets};
use mount_utils::HostMounter;
use std::{
  fmt,
  sync::{Arc, Mutex},
};
use tracing::info;

/// The S3 CSI plugin. Serves the identity, controller and node services.
pub struct Driver {
  config: DriverConfig,
  gateways: Arc<dyn GatewayFactory>,
  host: HostMounter,
  health: HealthChecker,
  ready: Mutex<bool>,
}

impl Driver {
  /// A driver talking to `gateways` and mounting through `host`. Readiness
  /// is checked by listing buckets with the configured defaults.
  pub fn new(config: DriverConfig, gateways: Arc<dyn GatewayFactory>, host: HostMounter) -> Self {
    let health = HealthChecker::new().with_check(ObjectStoreCheck::new(
      gateways.clone(),
      S3Config::from_secrets(&Secrets::default(), &config.region, config.endpoint.as_deref()),
      config.backend_timeout,
    ));

    Driver {
      config,
      gateways,
      host,
      health,
      ready: Mutex::new(false),
    }
  }

  /// Talks to S3 and mounts on this host.
  pub fn from_config(config: DriverConfig) -> Self {
    Self::new(config, Arc::new(AwsGatewayFactory), HostMounter::os())
  }

  pub fn with_health_checker(mut self, health: HealthChecker) -> Self {
    self.health = health;
    self
  }

  #[inline]
  pub fn config(&self) -> &DriverConfig {
    &self.config
  }

  #[inline]
  pub(crate) fn host(&self) -> &HostMounter {
    &self.host
  }

  fn set_ready(&self, ready: bool) {
    let mut guard = match self.ready.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    if *guard != ready {
      info!("Readiness changed to {}", ready);
    }
    *guard = ready;
  }

  /// Runs the health checks and stores the result.
  pub async fn refresh_readiness(&self) -> bool {
    let ready = self.health.is_ready().await;
    self.set_ready(ready);
    ready
  }

  /// Object store settings for a request, secrets first.
  pub(crate) fn s3_config(&self, secrets: &Secrets) -> S3Config {
    S3Config::from_secrets(secrets, &self.config.region, self.config.endpoint.as_deref())
  }

  /// A gateway for the request's credentials, every call bounded by the
  /// backend timeout.
  pub(crate) async fn gateway(&self, secrets: &Secrets) -> Result<BoundedGateway, GatewayError> {
    let gateway = self.gateways.connect(&self.s3_config(secrets)).await?;
    Ok(BoundedGateway::new(gateway, self.config.backend_timeout))
  }
}

impl fmt::Debug for Driver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Driver")
      .field("config", &self.config)
      .field("health", &self.health)
      .field("ready", &self.ready())
      .finish()
  }
}

#[async_trait]
impl IdentityService for Driver {
  fn name(&self) -> &str {
    &self.config.name
  }

  fn version(&self) -> &str {
    &self.config.version
  }

  fn ready(&self) -> bool {
    match self.ready.lock() {
      Ok(guard) => *guard,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  async fn probe(&self) -> bool {
    self.refresh_readiness().await
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::health::HealthCheck;
  use csi::{proto, Identity};

  struct Broken;

  #[async_trait]
  impl HealthCheck for Broken {
    fn name(&self) -> &str {
      "broken"
    }

    async fn check(&self) -> Result<(), String> {
      Err("always failing".into())
    }
  }

  #[tokio::test]
  async fn probe_refreshes_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let harness = testing::harness(dir.path());
    assert!(!harness.driver.ready());

    assert!(harness.driver.probe().await);
    assert!(harness.driver.ready());

    harness.gateway.set_unavailable(true);
    assert!(!harness.driver.probe().await);
    assert!(!harness.driver.ready());
  }

  #[tokio::test]
  async fn any_failing_check_means_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let driver = testing::harness(dir.path())
      .driver
      .with_health_checker(HealthChecker::new().with_check(Broken));

    let identity = Identity::with_controller(Arc::new(driver));
    let response = identity
      .probe(tonic::Request::new(proto::ProbeRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(response.ready, Some(false));
  }

  #[tokio::test]
  async fn reports_configured_name() {
    let dir = tempfile::tempdir().unwrap();
    let identity = Identity::new(Arc::new(testing::harness(dir.path()).driver));

    let response = identity
      .get_plugin_info(tonic::Request::new(proto::GetPluginInfoRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(response.name, "s3.csi.k8s.io");
    assert_eq!(response.vendor_version, env!("CARGO_PKG_VERSION"));
  }
}

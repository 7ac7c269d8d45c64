//! Readiness checks behind `Probe`.

use crate::s3::{BoundedGateway, GatewayFactory, ObjectStoreGateway, S3Config};
use async_trait::async_trait;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// One named readiness check.
#[async_trait]
pub trait HealthCheck: Send + Sync + 'static {
  fn name(&self) -> &str;

  /// `Err` carries a reason for the log.
  async fn check(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthOutcome {
  pub name: String,
  pub error: Option<String>,
}

impl HealthOutcome {
  #[inline]
  pub fn passed(&self) -> bool {
    self.error.is_none()
  }
}

/// Runs an ordered set of checks. There is no retry, a failed check stays
/// failed until the next run.
#[derive(Default)]
pub struct HealthChecker {
  checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthChecker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_check(mut self, check: impl HealthCheck) -> Self {
    self.checks.push(Box::new(check));
    self
  }

  pub fn len(&self) -> usize {
    self.checks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.checks.is_empty()
  }

  /// Runs every check in order, also after a failure.
  pub async fn run_all(&self) -> Vec<HealthOutcome> {
    let mut outcomes = Vec::with_capacity(self.checks.len());
    for check in &self.checks {
      let error = check.check().await.err();
      match &error {
        None => debug!(check = check.name(), "Health check passed"),
        Some(reason) => warn!(check = check.name(), "Health check failed: {}", reason),
      }

      outcomes.push(HealthOutcome {
        name: check.name().to_string(),
        error,
      });
    }
    outcomes
  }

  /// Ready when every check passes.
  pub async fn is_ready(&self) -> bool {
    self.run_all().await.iter().all(HealthOutcome::passed)
  }
}

impl fmt::Debug for HealthChecker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list()
      .entries(self.checks.iter().map(|check| check.name()))
      .finish()
  }
}

/// The object store answers a bucket listing with the driver's default
/// credentials.
pub struct ObjectStoreCheck {
  gateways: Arc<dyn GatewayFactory>,
  config: S3Config,
  timeout: Duration,
}

impl ObjectStoreCheck {
  pub fn new(gateways: Arc<dyn GatewayFactory>, config: S3Config, timeout: Duration) -> Self {
    ObjectStoreCheck {
      gateways,
      config,
      timeout,
    }
  }
}

#[async_trait]
impl HealthCheck for ObjectStoreCheck {
  fn name(&self) -> &str {
    "object-store"
  }

  async fn check(&self) -> Result<(), String> {
    let gateway = self
      .gateways
      .connect(&self.config)
      .await
      .map_err(|e| e.to_string())?;
    let gateway = BoundedGateway::new(gateway, self.timeout);

    gateway
      .list_buckets()
      .await
      .map(|buckets| debug!("Object store lists {} buckets", buckets.len()))
      .map_err(|e| e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::s3::{MemoryGateway, SharedGatewayFactory};
  use csi::Secrets;

  struct Fixed(&'static str, bool);

  #[async_trait]
  impl HealthCheck for Fixed {
    fn name(&self) -> &str {
      self.0
    }

    async fn check(&self) -> Result<(), String> {
      if self.1 {
        Ok(())
      } else {
        Err(format!("{} is down", self.0))
      }
    }
  }

  #[tokio::test]
  async fn every_check_runs_in_order() {
    let checker = HealthChecker::new()
      .with_check(Fixed("first", true))
      .with_check(Fixed("second", false))
      .with_check(Fixed("third", true));

    let outcomes = checker.run_all().await;
    assert_eq!(
      outcomes,
      vec![
        HealthOutcome {
          name: "first".into(),
          error: None,
        },
        HealthOutcome {
          name: "second".into(),
          error: Some("second is down".into()),
        },
        HealthOutcome {
          name: "third".into(),
          error: None,
        },
      ]
    );
    assert!(!checker.is_ready().await);
  }

  #[tokio::test]
  async fn ready_when_all_pass() {
    let checker = HealthChecker::new()
      .with_check(Fixed("first", true))
      .with_check(Fixed("second", true));
    assert!(checker.is_ready().await);
    assert!(HealthChecker::new().is_ready().await);
  }

  #[tokio::test]
  async fn object_store_check_lists_buckets() {
    let gateway = Arc::new(MemoryGateway::new());
    let check = ObjectStoreCheck::new(
      Arc::new(SharedGatewayFactory::new(gateway.clone())),
      S3Config::from_secrets(&Secrets::default(), "us-east-1", None),
      Duration::from_secs(1),
    );

    assert_eq!(check.check().await, Ok(()));
    assert_eq!(gateway.calls("list_buckets"), 1);

    gateway.set_unavailable(true);
    let reason = check.check().await.unwrap_err();
    assert!(reason.contains("unavailable"), "{}", reason);
  }
}

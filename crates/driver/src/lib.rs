/// Lets `?` turn the driver's own errors into an RPC error, through the
/// `tonic::Status` they map to.
macro_rules! status_into {
  ($target:ty: $($source:ty),+ $(,)?) => {
    $(
      impl From<$source> for $target {
        fn from(value: $source) -> Self {
          tonic::Status::from(value).into()
        }
      }
    )+
  };
}

pub mod capacity;
pub mod config;
pub mod health;
pub mod meta;
pub mod mounter;
pub mod s3;
pub mod volume_id;

mod capabilities;
mod controller;
mod driver;
mod node;

pub use capabilities::validate_capabilities;
pub use config::{ConfigError, DriverConfig};
pub use controller::TOPOLOGY_REGION_KEY;
pub use driver::Driver;

/// Identity, controller and node handlers for one driver instance.
pub fn services(
  driver: std::sync::Arc<Driver>,
) -> (
  csi::Identity<Driver>,
  csi::Controller<Driver>,
  csi::Node<Driver>,
) {
  (
    csi::Identity::with_controller(driver.clone()),
    csi::Controller::new(driver.clone()),
    csi::Node::new(driver),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use csi::proto;

  #[tokio::test]
  async fn services_share_one_driver() {
    let dir = tempfile::tempdir().unwrap();
    let driver = std::sync::Arc::new(driver::testing::harness(dir.path()).driver);
    let (identity, _, node) = services(driver);

    let capabilities = identity
      .get_plugin_capabilities(tonic::Request::new(proto::GetPluginCapabilitiesRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert!(!capabilities.capabilities.is_empty());

    let info = node
      .node_get_info(tonic::Request::new(proto::NodeGetInfoRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(info.node_id, "node-1");
  }
}

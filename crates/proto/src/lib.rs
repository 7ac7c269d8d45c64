macro_rules! unsupported {
  ($name:expr) => {{
    ::tracing::warn!("Unsupported method {} called", $name);
    return Err(
      ::tonic::Status::new(
        ::tonic::Code::Unimplemented,
        format!("{} is not implemented", $name),
      )
      .into(),
    );
  }};
}

pub mod controller;
pub mod node;
pub mod proto;
pub mod volume;

mod plugin;
mod secrets;
mod utils;

use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;

pub use controller::{Controller, ControllerService};
pub use node::{Node, NodeService};
pub use plugin::Identity;
pub use secrets::Secrets;

/// Answers the CSI identity RPCs. Both the controller and the node plugin
/// build on top of it.
#[async_trait]
pub trait IdentityService: Send + Sync + 'static {
  /// Plugin name in domain name notation, 63 characters or less.
  fn name(&self) -> &str;

  /// Plugin version. Opaque to the CO.
  fn version(&self) -> &str;

  #[inline]
  fn volume_accessibility_constraints_support(&self) -> bool {
    false
  }

  /// Last known readiness of the plugin.
  #[inline]
  fn ready(&self) -> bool {
    true
  }

  /// Called on every `Probe`. Plugins with backend dependencies should
  /// refresh their readiness here.
  async fn probe(&self) -> bool {
    self.ready()
  }

  #[inline]
  fn manifest(&self) -> &HashMap<String, String> {
    lazy_static! {
      static ref EMPTY_MANIFEST: HashMap<String, String> = HashMap::new();
    }

    &EMPTY_MANIFEST
  }
}

use csi::volume::{AccessMode, VolumeCapability};

/// Everything in `capabilities` this driver can not provide. An empty list
/// means the capabilities can be satisfied.
///
/// Volumes can only be published read/write on a single node, through
/// either the block or the mount API.
pub fn validate_capabilities(capabilities: &[VolumeCapability]) -> Vec<String> {
  let mut violations = Vec::new();

  for capability in capabilities {
    if capability.access_mode() != AccessMode::SingleNodeWriter {
      violations.push(format!(
        "unsupported access mode {}",
        capability.access_mode()
      ));
    }

    if capability.access_type().is_none() {
      violations.push("unsupported access type".to_string());
    }
  }

  violations.sort();
  violations.dedup();
  violations
}

//! Volume names, volume ids and where a volume lives in the object store.

use sha2::{Digest, Sha224};
use std::collections::HashMap;

/// Longest volume id that is also a valid bucket name.
pub const MAX_VOLUME_ID_LENGTH: usize = 63;

/// Directory inside the volume's prefix that holds the filesystem.
pub const DEFAULT_FS_PATH: &str = "csi-fs";

pub const PARAM_MOUNTER: &str = "mounter";
pub const PARAM_BUCKET: &str = "bucket";
pub const PARAM_PREFIX: &str = "prefix";
pub const PARAM_USE_PREFIX: &str = "usePrefix";

/// Volume context key carrying the provisioned size to the nodes.
pub const CONTEXT_CAPACITY: &str = "capacity";

/// Lower-cases `name`. Names longer than [`MAX_VOLUME_ID_LENGTH`] are
/// replaced by the hex SHA-224 digest of the lower-cased name (56 chars).
pub fn sanitize_volume_id(name: &str) -> String {
  let id = name.to_lowercase();
  if id.len() > MAX_VOLUME_ID_LENGTH {
    hex::encode(Sha224::digest(id.as_bytes()))
  } else {
    id
  }
}

/// Splits `bucket/prefix` on the first `/`. The prefix is empty for plain
/// bucket ids.
pub fn split_bucket_prefix(volume_id: &str) -> (&str, &str) {
  match volume_id.find('/') {
    Some(index) => (&volume_id[..index], &volume_id[index + 1..]),
    None => (volume_id, ""),
  }
}

/// Accepts the spellings Kubernetes users put in storage class parameters.
pub(crate) fn parse_flag(value: Option<&String>) -> bool {
  matches!(
    value.map(|v| v.trim()),
    Some("true") | Some("True") | Some("TRUE") | Some("t") | Some("T") | Some("1")
  )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeIdentity {
  pub volume_id: String,
  pub bucket: String,
  pub prefix: String,
  pub fs_path: String,
  pub use_prefix: bool,
}

impl VolumeIdentity {
  /// Identity of a volume about to be created.
  ///
  /// By default every volume gets a bucket named after it. The `bucket`
  /// parameter puts the volume under a prefix of a shared bucket instead,
  /// and `usePrefix` maps the volume onto an existing `prefix` with no
  /// filesystem directory below it.
  pub fn resolve(name: &str, parameters: &HashMap<String, String>) -> Self {
    let sanitized = sanitize_volume_id(name);
    let mut identity = VolumeIdentity {
      volume_id: sanitized.clone(),
      bucket: sanitized.clone(),
      prefix: String::new(),
      fs_path: DEFAULT_FS_PATH.to_string(),
      use_prefix: false,
    };

    if let Some(bucket) = parameters.get(PARAM_BUCKET).filter(|b| !b.is_empty()) {
      identity.volume_id = format!("{}/{}", bucket, sanitized);
      identity.bucket = bucket.clone();
      identity.prefix = sanitized;
    }

    if parse_flag(parameters.get(PARAM_USE_PREFIX)) {
      identity.use_prefix = true;
      identity.fs_path = String::new();
      identity.prefix = parameters.get(PARAM_PREFIX).cloned().unwrap_or_default();
      identity.volume_id = if identity.prefix.is_empty() {
        identity.bucket.clone()
      } else {
        format!("{}/{}", identity.bucket, identity.prefix)
      };
    }

    identity
  }

  /// Identity of an existing volume, as seen by a node. `volume_context`
  /// carries the parameters the volume was created with.
  pub fn from_volume_id(volume_id: &str, volume_context: &HashMap<String, String>) -> Self {
    let (bucket, prefix) = split_bucket_prefix(volume_id);
    let use_prefix = parse_flag(volume_context.get(PARAM_USE_PREFIX));

    VolumeIdentity {
      volume_id: volume_id.to_string(),
      bucket: bucket.to_string(),
      prefix: prefix.to_string(),
      fs_path: if use_prefix {
        String::new()
      } else {
        DEFAULT_FS_PATH.to_string()
      },
      use_prefix,
    }
  }

  /// `prefix/fs_path` without empty components.
  pub fn fs_root(&self) -> String {
    join_key(&[&self.prefix, &self.fs_path])
  }

  /// Directory marker object created under the bucket, `None` when the
  /// filesystem is the bucket root.
  pub fn marker_key(&self) -> Option<String> {
    let root = self.fs_root();
    if root.is_empty() {
      None
    } else {
      Some(format!("{}/", root))
    }
  }
}

pub(crate) fn join_key(parts: &[&str]) -> String {
  parts
    .iter()
    .map(|part| part.trim_matches('/'))
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;

  fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test_case("My-Volume" => "my-volume" ; "lower cased")]
  #[test_case("pvc-0123" => "pvc-0123" ; "unchanged")]
  #[test_case("" => "" ; "empty")]
  fn sanitizes_short_names(name: &str) -> String {
    sanitize_volume_id(name)
  }

  #[test]
  fn long_names_are_hashed() {
    let name = "A".repeat(70);
    let id = sanitize_volume_id(&name);

    assert_eq!(id.len(), 56);
    assert_ne!(id, name.to_lowercase());
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(id, sanitize_volume_id(&"a".repeat(70)));
  }

  #[test_case("my-volume" ; "short")]
  #[test_case("Some-Upper-Case" ; "upper case")]
  #[test_case("pvc-dd1fe6d2-6f8c-4f43-8b4e-0e8dd4fd0e1e-with-a-very-long-suffix" ; "long")]
  #[test_case("ÄÖÜ-ünïcödé" ; "unicode")]
  fn sanitize_is_idempotent_and_bounded(name: &str) {
    let once = sanitize_volume_id(name);
    assert_eq!(sanitize_volume_id(&once), once);
    assert!(once.len() <= MAX_VOLUME_ID_LENGTH);
  }

  #[test_case("bucket" => ("bucket", "") ; "bucket only")]
  #[test_case("bucket/prefix" => ("bucket", "prefix") ; "with prefix")]
  #[test_case("bucket/a/b" => ("bucket", "a/b") ; "first slash")]
  fn splits_volume_ids(id: &str) -> (&str, &str) {
    split_bucket_prefix(id)
  }

  #[test]
  fn default_identity_is_a_bucket() {
    let identity = VolumeIdentity::resolve("My-Volume", &HashMap::new());
    assert_eq!(
      identity,
      VolumeIdentity {
        volume_id: "my-volume".into(),
        bucket: "my-volume".into(),
        prefix: "".into(),
        fs_path: DEFAULT_FS_PATH.into(),
        use_prefix: false,
      }
    );
    assert_eq!(identity.marker_key().as_deref(), Some("csi-fs/"));
  }

  #[test]
  fn bucket_parameter_uses_name_as_prefix() {
    let identity = VolumeIdentity::resolve("PVC-1", &params(&[("bucket", "shared")]));
    assert_eq!(identity.volume_id, "shared/pvc-1");
    assert_eq!(identity.bucket, "shared");
    assert_eq!(identity.prefix, "pvc-1");
    assert_eq!(identity.fs_root(), "pvc-1/csi-fs");
    assert_eq!(identity.marker_key().as_deref(), Some("pvc-1/csi-fs/"));
  }

  #[test]
  fn use_prefix_maps_onto_existing_prefix() {
    let identity = VolumeIdentity::resolve(
      "pvc-1",
      &params(&[("bucket", "shared"), ("usePrefix", "true"), ("prefix", "data")]),
    );
    assert_eq!(identity.volume_id, "shared/data");
    assert_eq!(identity.prefix, "data");
    assert_eq!(identity.fs_path, "");
    assert!(identity.use_prefix);
    assert_eq!(identity.marker_key().as_deref(), Some("data/"));
  }

  #[test]
  fn use_prefix_without_prefix_is_the_bucket_root() {
    let identity = VolumeIdentity::resolve(
      "pvc-1",
      &params(&[("bucket", "shared"), ("usePrefix", "true")]),
    );
    assert_eq!(identity.volume_id, "shared");
    assert_eq!(identity.marker_key(), None);
  }

  #[test]
  fn node_identity_matches_created_identity() {
    let parameters = params(&[("bucket", "shared"), ("usePrefix", "1"), ("prefix", "data")]);
    let created = VolumeIdentity::resolve("pvc-1", &parameters);
    let seen = VolumeIdentity::from_volume_id(&created.volume_id, &parameters);
    assert_eq!(created, seen);

    let created = VolumeIdentity::resolve("pvc-2", &params(&[("bucket", "shared")]));
    let seen = VolumeIdentity::from_volume_id(&created.volume_id, &HashMap::new());
    assert_eq!(created, seen);
  }
}

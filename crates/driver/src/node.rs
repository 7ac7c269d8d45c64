use crate::{
  driver::Driver,
  meta::FsMeta,
  mounter::{new_mounter, remove_credentials_files, Mounter, MounterConfig, MounterError, MounterType},
  volume_id::{VolumeIdentity, CONTEXT_CAPACITY, PARAM_MOUNTER},
};
use async_trait::async_trait;
use csi::node::*;
use mount_utils::MountError;
use std::{collections::HashMap, path::Path};
use tracing::{debug, info};

status_into!(NodeStageVolumeError: MounterError);
status_into!(NodeUnstageVolumeError: MounterError);
status_into!(NodePublishVolumeError: MounterError);
status_into!(NodeUnpublishVolumeError: MounterError);

impl Driver {
  /// Nodes never read the metadata record. Everything a mounter needs comes
  /// from the volume id, the volume context and the request secrets. The
  /// context carries the provisioned size, volumes without one get the
  /// mounter's smallest size.
  fn mounter_for(
    &self,
    volume_id: &str,
    volume_context: &HashMap<String, String>,
    secrets: &Secrets,
  ) -> Result<(MounterType, Box<dyn Mounter>), MounterError> {
    let config = self.config();
    let identity = VolumeIdentity::from_volume_id(volume_id, volume_context);
    let mounter = MounterType::from_key(
      volume_context.get(PARAM_MOUNTER).map(String::as_str),
      config.default_mounter,
    )?;
    let capacity = match volume_context.get(CONTEXT_CAPACITY) {
      None => 0,
      Some(value) => value.trim().parse::<u64>().map_err(|_| {
        MounterError::InvalidConfig(format!("invalid volume capacity {:?}", value))
      })?,
    };

    let mounter_config = MounterConfig {
      volume_id: volume_id.to_string(),
      meta: FsMeta::new(&identity, mounter.as_str(), capacity),
      s3: self.s3_config(secrets),
      mounter,
      credentials_dir: config.credentials_dir.clone(),
      fuse: config.fuse_options(),
    };

    Ok((mounter, new_mounter(mounter_config, self.host().clone())?))
  }

  /// Creates `path` and reports whether something is already mounted there.
  async fn prepare_target(&self, path: &Path) -> Result<bool, MounterError> {
    tokio::fs::create_dir_all(path)
      .await
      .map_err(MountError::from)?;
    Ok(!self.host().is_likely_not_mount_point(path).await?)
  }

  /// Unmounts `path` and drops the credential files written for it.
  /// Returns whether anything was unmounted.
  async fn unmount(&self, volume_id: &str, path: &Path) -> Result<bool, MounterError> {
    let unmounted = self.host().fuse_unmount(path).await?;
    remove_credentials_files(&self.config().credentials_dir, volume_id, path).await?;
    Ok(unmounted)
  }
}

#[async_trait]
impl NodeService for Driver {
  fn capabilities(&self) -> NodeCapabilities {
    NodeCapabilities::STAGE_UNSTAGE_VOLUME
  }

  async fn node_stage_volume(&self, request: NodeStageVolumeRequest) -> Result<(), NodeStageVolumeError> {
    let (mounter_type, mounter) = self
      .mounter_for(request.volume_id(), request.volume_context(), request.secrets())
      .map_err(|e| NodeStageVolumeError::InvalidVolume(e.to_string()))?;

    let staging = request.staging_target_path();
    if self.prepare_target(staging).await? {
      debug!(staging = %staging.display(), "Volume already staged");
      return Ok(());
    }

    mounter.stage(staging).await?;
    info!(
      volume_id = request.volume_id(),
      mounter = %mounter_type,
      staging = %staging.display(),
      "Volume staged"
    );
    Ok(())
  }

  async fn node_unstage_volume(
    &self,
    request: NodeUnstageVolumeRequest,
  ) -> Result<(), NodeUnstageVolumeError> {
    let staging = request.staging_target_path();
    if self.unmount(request.volume_id(), staging).await? {
      info!(volume_id = request.volume_id(), staging = %staging.display(), "Volume unstaged");
    }
    Ok(())
  }

  async fn node_publish_volume(
    &self,
    request: NodePublishVolumeRequest,
  ) -> Result<(), NodePublishVolumeError> {
    let (mounter_type, mounter) = self
      .mounter_for(request.volume_id(), request.volume_context(), request.secrets())
      .map_err(|e| NodePublishVolumeError::InvalidVolume(e.to_string()))?;

    if mounter_type == MounterType::S3backer && request.staging_target_path().is_none() {
      return Err(NodePublishVolumeError::StagingTargetPathNotSet(format!(
        "{} volumes are mounted from their staging path",
        mounter_type
      )));
    }

    let target = request.target_path();
    if self.prepare_target(target).await? {
      debug!(target = %target.display(), "Volume already published");
      return Ok(());
    }

    let source = request.staging_target_path().unwrap_or_else(|| Path::new(""));
    mounter.mount(source, target).await?;
    info!(
      volume_id = request.volume_id(),
      mounter = %mounter_type,
      target = %target.display(),
      "Volume published"
    );
    Ok(())
  }

  async fn node_unpublish_volume(
    &self,
    request: NodeUnpublishVolumeRequest,
  ) -> Result<(), NodeUnpublishVolumeError> {
    let target = request.target_path();
    if self.unmount(request.volume_id(), target).await? {
      info!(volume_id = request.volume_id(), target = %target.display(), "Volume unpublished");
    }
    Ok(())
  }

  async fn node_get_info(&self) -> Result<NodeGetInfoResponse, NodeGetInfoError> {
    let node_id = &self.config().node_id;
    if node_id.is_empty() {
      return Err(tonic::Status::failed_precondition("node id is not configured").into());
    }

    Ok(NodeGetInfoResponse::new(node_id.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    capacity::GIB,
    driver::testing::{self, harness, Harness},
    mounter::{credentials_path, ACCESS_FILE_EXTENSION, PASSWD_EXTENSION},
    s3::{MemoryGateway, SharedGatewayFactory},
  };
  use csi::{proto, ControllerService, Node};
  use mount_utils::{FakeAction, FakeMounter, HostMounter};
  use std::{convert::TryInto, sync::Arc};
  use test_case::test_case;

  fn writer() -> Option<proto::VolumeCapability> {
    Some(VolumeCapability::mount(AccessMode::SingleNodeWriter).into())
  }

  fn secrets() -> HashMap<String, String> {
    vec![
      ("accessKeyID".to_string(), "AKIA".to_string()),
      ("secretAccessKey".to_string(), "hunter2".to_string()),
    ]
    .into_iter()
    .collect()
  }

  fn context(mounter: &str) -> HashMap<String, String> {
    vec![
      ("mounter".to_string(), mounter.to_string()),
      ("capacity".to_string(), (4 * GIB).to_string()),
    ]
    .into_iter()
    .collect()
  }

  fn publish_request(
    mounter: &str,
    staging: Option<&Path>,
    target: &Path,
  ) -> proto::NodePublishVolumeRequest {
    proto::NodePublishVolumeRequest {
      volume_id: "shared/pvc-1".into(),
      staging_target_path: staging
        .map(|p| p.display().to_string())
        .unwrap_or_default(),
      target_path: target.display().to_string(),
      volume_capability: writer(),
      secrets: secrets(),
      volume_context: context(mounter),
      ..Default::default()
    }
  }

  fn stage_request(mounter: &str, staging: &Path) -> proto::NodeStageVolumeRequest {
    proto::NodeStageVolumeRequest {
      volume_id: "pvc-1".into(),
      staging_target_path: staging.display().to_string(),
      volume_capability: writer(),
      secrets: secrets(),
      volume_context: context(mounter),
      ..Default::default()
    }
  }

  async fn publish(
    harness: &Harness,
    request: proto::NodePublishVolumeRequest,
  ) -> Result<(), NodePublishVolumeError> {
    harness
      .driver
      .node_publish_volume(request.try_into().unwrap())
      .await
  }

  #[tokio::test]
  async fn publishes_goofys_volume() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let target = dir.path().join("target");

    publish(&harness, publish_request("goofys", None, &target))
      .await
      .unwrap();

    assert!(target.is_dir());
    assert!(harness.fake.is_mounted(&target));
    let commands = harness.fake.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].program, "goofys");
    assert_eq!(
      commands[0].args[commands[0].args.len() - 2..],
      [
        "shared:pvc-1/csi-fs".to_string(),
        target.display().to_string()
      ]
    );
  }

  #[tokio::test]
  async fn publishing_twice_mounts_once() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let target = dir.path().join("target");

    publish(&harness, publish_request("s3fs", None, &target))
      .await
      .unwrap();
    publish(&harness, publish_request("s3fs", None, &target))
      .await
      .unwrap();

    assert_eq!(harness.fake.commands().len(), 1);
  }

  #[tokio::test]
  async fn unknown_mounter_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let target = dir.path().join("target");

    let err = publish(&harness, publish_request("fuse-nfs", None, &target))
      .await
      .unwrap_err();
    assert!(
      matches!(err, NodePublishVolumeError::InvalidVolume(_)),
      "{:?}",
      err
    );
    assert!(harness.fake.log().is_empty());
    assert!(!target.exists());
  }

  #[tokio::test]
  async fn s3backer_needs_a_staging_path() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));

    let err = publish(
      &harness,
      publish_request("s3backer", None, &dir.path().join("target")),
    )
    .await
    .unwrap_err();
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::FailedPrecondition
    );
    assert!(harness.fake.log().is_empty());
  }

  #[tokio::test]
  async fn stages_and_publishes_s3backer() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let staging = dir.path().join("staging");
    let target = dir.path().join("target");

    harness
      .driver
      .node_stage_volume(
        stage_request("s3backer", &staging)
          .try_into()
          .unwrap(),
      )
      .await
      .unwrap();

    let commands = harness.fake.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].program, "s3backer");
    assert!(commands[0].args.contains(&format!("--size={}", 4 * GIB)));
    assert!(commands[0]
      .args
      .contains(&"--baseURL=http://minio:9000/".to_string()));
    assert!(!commands[0].args.contains(&"--ssl".to_string()));
    let access_file = credentials_path(
      &dir.path().join("creds"),
      "pvc-1",
      &staging,
      ACCESS_FILE_EXTENSION,
    );
    assert!(access_file.is_file());

    harness.fake.reset_log();
    publish(&harness, publish_request("s3backer", Some(&staging), &target))
      .await
      .unwrap();
    assert_eq!(
      harness.fake.log(),
      vec![FakeAction::Mount {
        source: staging.join("file"),
        target: target.clone(),
        fstype: "xfs".into(),
      }]
    );

    harness
      .driver
      .node_unstage_volume(
        proto::NodeUnstageVolumeRequest {
          volume_id: "pvc-1".into(),
          staging_target_path: staging.display().to_string(),
        }
        .try_into()
        .unwrap(),
      )
      .await
      .unwrap();
    assert!(!access_file.exists());
  }

  #[tokio::test]
  async fn s3backer_device_has_the_provisioned_size() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let staging = dir.path().join("staging");

    let volume = harness
      .driver
      .create_volume(
        proto::CreateVolumeRequest {
          name: "pvc-1".into(),
          capacity_range: Some(proto::CapacityRange {
            required_bytes: 8 * GIB as i64,
            limit_bytes: 0,
          }),
          volume_capabilities: vec![writer().unwrap()],
          parameters: vec![("mounter".to_string(), "s3backer".to_string())]
            .into_iter()
            .collect(),
          ..Default::default()
        }
        .try_into()
        .unwrap(),
      )
      .await
      .unwrap();

    let mut request = stage_request("s3backer", &staging);
    request.volume_id = volume.volume_id().to_string();
    request.volume_context = volume.volume_context().clone();
    harness
      .driver
      .node_stage_volume(request.try_into().unwrap())
      .await
      .unwrap();

    let commands = harness.fake.commands();
    assert!(
      commands[0].args.contains(&format!("--size={}", 8 * GIB)),
      "{:?}",
      commands[0].args
    );
  }

  #[test_case(None => format!("--size={}", GIB) ; "missing capacity")]
  #[test_case(Some(" 2147483648 ") => format!("--size={}", 2 * GIB) ; "padded capacity")]
  #[tokio::test]
  async fn s3backer_size_follows_the_context(capacity: Option<&str>) -> String {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let mut request = stage_request("s3backer", &dir.path().join("staging"));
    request.volume_context.remove("capacity");
    if let Some(capacity) = capacity {
      request.volume_context.insert("capacity".into(), capacity.into());
    }

    harness
      .driver
      .node_stage_volume(request.try_into().unwrap())
      .await
      .unwrap();
    let commands = harness.fake.commands();
    commands[0]
      .args
      .iter()
      .find(|arg| arg.starts_with("--size="))
      .cloned()
      .unwrap()
  }

  #[tokio::test]
  async fn malformed_capacity_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let mut request = stage_request("s3backer", &dir.path().join("staging"));
    request
      .volume_context
      .insert("capacity".into(), "lots".into());

    let err = harness
      .driver
      .node_stage_volume(request.try_into().unwrap())
      .await
      .unwrap_err();
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::InvalidArgument
    );
    assert!(harness.fake.log().is_empty());
  }

  #[tokio::test]
  async fn unpublish_removes_the_password_file() {
    let dir = tempfile::tempdir().unwrap();
    let creds = dir.path().join("creds");
    let harness = harness(&creds);
    let target = dir.path().join("target");

    publish(&harness, publish_request("s3fs", None, &target))
      .await
      .unwrap();
    let passwd_file = credentials_path(&creds, "shared/pvc-1", &target, PASSWD_EXTENSION);
    assert!(passwd_file.is_file());

    harness
      .driver
      .node_unpublish_volume(
        proto::NodeUnpublishVolumeRequest {
          volume_id: "shared/pvc-1".into(),
          target_path: target.display().to_string(),
        }
        .try_into()
        .unwrap(),
      )
      .await
      .unwrap();
    assert!(!passwd_file.exists());
    assert!(!harness.fake.is_mounted(&target));
  }

  #[tokio::test]
  async fn staging_twice_mounts_once() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let staging = dir.path().join("staging");

    for _ in 0..2 {
      harness
        .driver
        .node_stage_volume(
          stage_request("s3backer", &staging)
            .try_into()
            .unwrap(),
        )
        .await
        .unwrap();
    }

    assert_eq!(harness.fake.commands().len(), 1);
  }

  #[tokio::test]
  async fn staging_without_a_stage_step_mounts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let staging = dir.path().join("staging");

    harness
      .driver
      .node_stage_volume(stage_request("rclone", &staging).try_into().unwrap())
      .await
      .unwrap();

    assert!(staging.is_dir());
    assert!(harness.fake.log().is_empty());
  }

  #[tokio::test]
  async fn unmounts_published_and_staged_paths() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    let node = Node::new(Arc::new(harness.driver));
    let target = dir.path().join("target");
    harness.fake.add_mount_point(&target);

    node
      .node_unpublish_volume(tonic::Request::new(proto::NodeUnpublishVolumeRequest {
        volume_id: "pvc-1".into(),
        target_path: target.display().to_string(),
      }))
      .await
      .unwrap();
    assert_eq!(
      harness.fake.log(),
      vec![FakeAction::Unmount {
        target: target.clone()
      }]
    );

    // Paths that are not mounted, or gone, are fine too.
    node
      .node_unpublish_volume(tonic::Request::new(proto::NodeUnpublishVolumeRequest {
        volume_id: "pvc-1".into(),
        target_path: target.display().to_string(),
      }))
      .await
      .unwrap();
    node
      .node_unstage_volume(tonic::Request::new(proto::NodeUnstageVolumeRequest {
        volume_id: "pvc-1".into(),
        staging_target_path: dir.path().join("missing").display().to_string(),
      }))
      .await
      .unwrap();
    assert_eq!(harness.fake.log().len(), 1);
  }

  #[tokio::test]
  async fn stalled_mount_exceeds_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    harness.fake.stall_mounts();

    let err = publish(
      &harness,
      publish_request("rclone", None, &dir.path().join("target")),
    )
    .await
    .unwrap_err();
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::DeadlineExceeded
    );
  }

  #[tokio::test]
  async fn failing_helper_is_internal() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(&dir.path().join("creds"));
    harness.fake.fail_program("s3fs");

    let err = publish(
      &harness,
      publish_request("s3fs", None, &dir.path().join("target")),
    )
    .await
    .unwrap_err();
    let status = tonic::Status::from(err);
    assert_eq!(status.code(), tonic::Code::Internal);
    assert!(status.message().starts_with("s3fs shared:/pvc-1/csi-fs"), "{}", status.message());
    assert!(!status.message().contains("hunter2"));
  }

  #[tokio::test]
  async fn reports_node_id_and_capabilities() {
    let dir = tempfile::tempdir().unwrap();
    let node = Node::new(Arc::new(harness(dir.path()).driver));

    let info = node
      .node_get_info(tonic::Request::new(proto::NodeGetInfoRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(info.node_id, "node-1");

    let capabilities = node
      .node_get_capabilities(tonic::Request::new(proto::NodeGetCapabilitiesRequest {}))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(capabilities.capabilities.len(), 1);
  }

  #[tokio::test]
  async fn missing_node_id_is_a_precondition_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = testing::config(dir.path());
    config.node_id.clear();
    let driver = Driver::new(
      config,
      Arc::new(SharedGatewayFactory::new(Arc::new(MemoryGateway::new()))),
      HostMounter::new(Arc::new(FakeMounter::new())),
    );

    let err = driver.node_get_info().await.unwrap_err();
    assert_eq!(
      tonic::Status::from(err).code(),
      tonic::Code::FailedPrecondition
    );
  }
}

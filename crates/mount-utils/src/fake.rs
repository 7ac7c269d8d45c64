use crate::{runner::wait_for_mount_point, FuseCommand, FuseOptions, MountError, MounterImpl, Result};
use std::{
  collections::{HashMap, HashSet},
  io,
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard},
  time::Duration,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
  Command {
    program: String,
    args: Vec<String>,
  },

  Mount {
    source: PathBuf,
    target: PathBuf,
    fstype: String,
  },

  Unmount {
    target: PathBuf,
  },

  Format {
    device: PathBuf,
    fstype: String,
  },
}

#[derive(Default)]
struct FakeMounterInner {
  mount_points: HashSet<PathBuf>,
  formats: HashMap<PathBuf, String>,
  failing_programs: HashSet<String>,
  stalled: bool,
  log: Vec<FakeAction>,
}

/// In-memory host: records every action and keeps a set of mount points.
///
/// A successful `fuse_mount` marks its target as mounted unless mounts are
/// stalled, in which case the wait loop runs into its timeout.
#[derive(Default)]
pub struct FakeMounter(Mutex<FakeMounterInner>);

impl FakeMounter {
  pub fn new() -> Self {
    Self::default()
  }

  fn inner(&self) -> MutexGuard<'_, FakeMounterInner> {
    // A panicking test thread must not hide the log from the others.
    match self.0.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  pub fn add_mount_point(&self, path: impl Into<PathBuf>) {
    self.inner().mount_points.insert(path.into());
  }

  pub fn is_mounted(&self, path: &Path) -> bool {
    self.inner().mount_points.contains(path)
  }

  /// Makes every later invocation of `program` exit non-zero.
  pub fn fail_program(&self, program: impl Into<String>) {
    self.inner().failing_programs.insert(program.into());
  }

  /// FUSE helpers still exit successfully but never produce a mount.
  pub fn stall_mounts(&self) {
    self.inner().stalled = true;
  }

  pub fn set_format(&self, device: impl Into<PathBuf>, fstype: impl Into<String>) {
    self.inner().formats.insert(device.into(), fstype.into());
  }

  pub fn log(&self) -> Vec<FakeAction> {
    self.inner().log.clone()
  }

  pub fn reset_log(&self) {
    self.inner().log.clear();
  }

  /// Programs invoked so far, in order.
  pub fn commands(&self) -> Vec<FuseCommandRecord> {
    self
      .inner()
      .log
      .iter()
      .filter_map(|action| match action {
        FakeAction::Command { program, args } => Some(FuseCommandRecord {
          program: program.clone(),
          args: args.clone(),
        }),
        _ => None,
      })
      .collect()
  }
}

/// A command seen by the [`FakeMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuseCommandRecord {
  pub program: String,
  pub args: Vec<String>,
}

impl MounterImpl for FakeMounter {
  fn run_command(&self, command: &FuseCommand, _timeout: Option<Duration>) -> Result<()> {
    let mut inner = self.inner();
    inner.log.push(FakeAction::Command {
      program: command.program().to_owned(),
      args: command.get_args().to_vec(),
    });

    if inner.failing_programs.contains(command.program()) {
      return Err(MountError::Command {
        program: command.program().to_owned(),
        args: command.display_args(),
        reason: "exited with status 1".into(),
      });
    }

    Ok(())
  }

  fn is_likely_not_mount_point(&self, path: &Path) -> Result<bool> {
    if self.inner().mount_points.contains(path) {
      return Ok(false);
    }

    let _ = path.metadata()?;
    Ok(true)
  }

  fn mount(&self, source: &Path, target: &Path, fstype: &str, _options: &[String]) -> Result<()> {
    let mut inner = self.inner();
    inner.mount_points.insert(target.to_path_buf());
    info!(
      "Fake mounter: mounted {} to {}",
      source.display(),
      target.display()
    );
    inner.log.push(FakeAction::Mount {
      source: source.to_path_buf(),
      target: target.to_path_buf(),
      fstype: fstype.to_owned(),
    });
    Ok(())
  }

  fn unmount(&self, target: &Path) -> Result<()> {
    let mut inner = self.inner();
    if !inner.mount_points.remove(target) {
      return Err(MountError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("{} is not mounted", target.display()),
      )));
    }

    info!("Fake mounter: unmounted {}", target.display());
    inner.log.push(FakeAction::Unmount {
      target: target.to_path_buf(),
    });
    Ok(())
  }

  fn disk_format(&self, device: &Path) -> Result<Option<String>> {
    Ok(self.inner().formats.get(device).cloned())
  }

  fn format(&self, device: &Path, fstype: &str) -> Result<()> {
    let mut inner = self.inner();
    inner.formats.insert(device.to_path_buf(), fstype.to_owned());
    inner.log.push(FakeAction::Format {
      device: device.to_path_buf(),
      fstype: fstype.to_owned(),
    });
    Ok(())
  }

  fn fuse_mount(&self, command: &FuseCommand, target: &Path, options: &FuseOptions) -> Result<()> {
    self.run_command(command, options.command_timeout)?;
    {
      let mut inner = self.inner();
      if !inner.stalled {
        inner.mount_points.insert(target.to_path_buf());
      }
    }

    wait_for_mount_point(self, target, options)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn options() -> FuseOptions {
    FuseOptions {
      poll_interval: Duration::from_millis(1),
      mount_timeout: Duration::from_millis(20),
      command_timeout: None,
    }
  }

  #[test]
  fn fuse_mount_marks_target_mounted() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeMounter::new();

    fake
      .fuse_mount(&FuseCommand::new("s3fs").arg("bucket"), dir.path(), &options())
      .unwrap();

    assert!(fake.is_mounted(dir.path()));
    assert_eq!(fake.commands().len(), 1);
    assert_eq!(fake.commands()[0].program, "s3fs");
  }

  #[test]
  fn failing_program_reports_command() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeMounter::new();
    fake.fail_program("goofys");

    let err = fake
      .fuse_mount(
        &FuseCommand::new("goofys").args(vec!["bucket", "/mnt"]),
        dir.path(),
        &options(),
      )
      .unwrap_err();

    match err {
      MountError::Command { program, args, .. } => {
        assert_eq!(program, "goofys");
        assert_eq!(args, "bucket /mnt");
      }
      other => panic!("unexpected error {:?}", other),
    }
    assert!(!fake.is_mounted(dir.path()));
  }

  #[test]
  fn unmount_of_unmounted_target_fails() {
    let fake = FakeMounter::new();
    assert!(fake.unmount(Path::new("/mnt/none")).is_err());
  }
}

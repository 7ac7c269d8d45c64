cfg_if::cfg_if! {
  if #[cfg(unix)] {
    mod unix;
    pub use unix::OsMounter;
  } else {
    compile_error!("Only cfg(unix) is supported at this time")
  }
}

mod command;
mod fake;
mod runner;

pub use command::{FuseCommand, FuseOptions};
pub use fake::{FakeAction, FakeMounter, FuseCommandRecord};
pub use runner::{wait_for_mount_point, MounterImpl};

use futures::future::BoxFuture;
use runner::run_inst;
use static_assertions::{assert_impl_all, assert_obj_safe};
use std::{
  fmt, io,
  path::{Path, PathBuf},
  result,
  sync::Arc,
  time::Duration,
};
use thiserror::Error;

pub type Result<T> = result::Result<T, MountError>;
pub type FutureResult<T> = BoxFuture<'static, Result<T>>;

#[derive(Debug, Error)]
pub enum MountError {
  /// The helper ran and failed. Output is not captured, the helper writes
  /// straight to the plugin's stdio.
  #[error("{program} {args} failed: {reason}")]
  Command {
    program: String,
    args: String,
    reason: String,
  },

  #[error("{program} did not finish within {after:?}")]
  CommandTimeout { program: String, after: Duration },

  #[error("{} did not become a mount point within {after:?}", .target.display())]
  Timeout { target: PathBuf, after: Duration },

  #[error("{program} was not found in PATH")]
  NotFound { program: String },

  #[error("Mount dispatcher failure: {0}")]
  Dispatch(String),

  #[error(transparent)]
  Io(#[from] io::Error),
}

assert_obj_safe!(MounterImpl);
assert_impl_all!(OsMounter: MounterImpl);
assert_impl_all!(FakeMounter: MounterImpl);
assert_impl_all!(HostMounter: Send, Sync, Clone);

/// Async handle on the host's mount operations. Every call is executed on
/// the shared dispatcher thread.
#[derive(Clone)]
pub struct HostMounter(Arc<dyn MounterImpl>);

impl HostMounter {
  pub fn new(inner: Arc<dyn MounterImpl>) -> Self {
    HostMounter(inner)
  }

  /// The real host.
  pub fn os() -> Self {
    Self::new(Arc::new(OsMounter::new()))
  }

  pub fn run_command(&self, command: FuseCommand, timeout: Option<Duration>) -> FutureResult<()> {
    Box::pin(run_inst(self.0.clone(), move |mounter| {
      mounter.run_command(&command, timeout)
    }))
  }

  pub fn fuse_mount(
    &self,
    command: FuseCommand,
    target: impl Into<PathBuf>,
    options: FuseOptions,
  ) -> FutureResult<()> {
    let target = target.into();
    Box::pin(run_inst(self.0.clone(), move |mounter| {
      mounter.fuse_mount(&command, &target, &options)
    }))
  }

  /// Unmounts `target` when it is a mount point.
  pub fn fuse_unmount(&self, target: impl Into<PathBuf>) -> FutureResult<bool> {
    let target = target.into();
    Box::pin(run_inst(self.0.clone(), move |mounter| {
      mounter.unmount_if_mounted(&target)
    }))
  }

  pub fn is_likely_not_mount_point(&self, path: impl Into<PathBuf>) -> FutureResult<bool> {
    let path = path.into();
    Box::pin(run_inst(self.0.clone(), move |mounter| {
      mounter.is_likely_not_mount_point(&path)
    }))
  }

  pub fn mount(
    &self,
    source: impl Into<PathBuf>,
    target: impl Into<PathBuf>,
    fstype: impl Into<String>,
    options: Vec<String>,
  ) -> FutureResult<()> {
    let source = source.into();
    let target = target.into();
    let fstype = fstype.into();
    Box::pin(run_inst(self.0.clone(), move |mounter| {
      mounter.mount(&source, &target, &fstype, &options)
    }))
  }

  /// Creates a `fstype` filesystem on `device` unless it already holds one.
  /// Returns whether a format was needed.
  pub fn ensure_formatted(
    &self,
    device: impl Into<PathBuf>,
    fstype: impl Into<String>,
  ) -> FutureResult<bool> {
    let device = device.into();
    let fstype = fstype.into();
    Box::pin(run_inst(self.0.clone(), move |mounter| {
      format_if_blank(mounter, &device, &fstype)
    }))
  }
}

fn format_if_blank(mounter: &dyn MounterImpl, device: &Path, fstype: &str) -> Result<bool> {
  match mounter.disk_format(device)? {
    Some(existing) => {
      tracing::debug!("{} already formatted as {}", device.display(), existing);
      Ok(false)
    }
    None => mounter.format(device, fstype).map(|_| true),
  }
}

impl fmt::Debug for HostMounter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("HostMounter").finish()
  }
}

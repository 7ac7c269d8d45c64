use crate::{FuseCommand, FuseOptions, MountError, Result};
use futures::channel::oneshot::{channel as oneshot, Receiver};
use once_cell::sync::OnceCell;
use std::{
  future::Future,
  io,
  panic::{catch_unwind, AssertUnwindSafe},
  path::Path,
  sync::Arc,
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, error, info, Span};

type Job = Box<dyn FnOnce() + Send>;

struct MounterMessage {
  span: Span,
  run: Job,
}

type MounterDispatcher = crossbeam::channel::Sender<MounterMessage>;

/// Blocking host operations.
///
/// Callers go through [`crate::HostMounter`], which runs every method on a
/// single dispatcher thread so that async executors are never blocked.
pub trait MounterImpl: Send + Sync + 'static {
  /// Runs a helper program to completion with stdio inherited. A non-zero
  /// exit is an error naming the command. When `timeout` elapses first the
  /// process is killed.
  fn run_command(&self, command: &FuseCommand, timeout: Option<Duration>) -> Result<()>;

  /// Heuristic: a directory on the same device as its parent is not a mount
  /// point. Fails with a not-found error when `path` does not exist.
  fn is_likely_not_mount_point(&self, path: &Path) -> Result<bool>;

  /// `mount -t <fstype> [-o <options>] <source> <target>`.
  fn mount(&self, source: &Path, target: &Path, fstype: &str, options: &[String]) -> Result<()>;

  fn unmount(&self, target: &Path) -> Result<()>;

  /// Filesystem type found on a device or image file, `None` when blank.
  fn disk_format(&self, device: &Path) -> Result<Option<String>>;

  /// Creates a filesystem of type `fstype` on the device or image file.
  fn format(&self, device: &Path, fstype: &str) -> Result<()>;

  /// Runs a FUSE helper and waits for `target` to become a mount point.
  fn fuse_mount(&self, command: &FuseCommand, target: &Path, options: &FuseOptions) -> Result<()> {
    info!(program = command.program(), target = %target.display(), "Mounting fuse filesystem");
    self.run_command(command, options.command_timeout)?;
    wait_for_mount_point(self, target, options)
  }

  /// Unmounts `target` if it is a mount point. Returns whether anything was
  /// unmounted. Missing paths count as not mounted.
  fn unmount_if_mounted(&self, target: &Path) -> Result<bool> {
    match self.is_likely_not_mount_point(target) {
      Ok(true) => {
        debug!(target = %target.display(), "Not a mount point, skipping unmount");
        Ok(false)
      }
      Ok(false) => self.unmount(target).map(|_| true),
      Err(e) if e.is_not_found() => Ok(false),
      Err(e) => Err(e),
    }
  }
}

/// Polls `target` every `poll_interval` until it is a mount point or
/// `mount_timeout` has passed. Not-found errors are retried, the helper may
/// still be creating the path.
pub fn wait_for_mount_point<M>(mounter: &M, target: &Path, options: &FuseOptions) -> Result<()>
where
  M: MounterImpl + ?Sized,
{
  let deadline = Instant::now() + options.mount_timeout;
  loop {
    match mounter.is_likely_not_mount_point(target) {
      Ok(false) => return Ok(()),
      Ok(true) => (),
      Err(e) if e.is_not_found() => (),
      Err(e) => return Err(e),
    }

    let now = Instant::now();
    if now >= deadline {
      return Err(MountError::Timeout {
        target: target.to_path_buf(),
        after: options.mount_timeout,
      });
    }

    thread::sleep(options.poll_interval.min(deadline - now));
  }
}

static DISPATCHER: OnceCell<MounterDispatcher> = OnceCell::new();

fn dispatcher() -> Result<&'static MounterDispatcher> {
  DISPATCHER.get_or_try_init(|| {
    let (sender, receiver) = crossbeam::channel::unbounded::<MounterMessage>();

    thread::Builder::new()
      .name("mount-utils:dispatch".into())
      .spawn(move || {
        while let Ok(MounterMessage { span, run }) = receiver.recv() {
          let _enter = span.enter();
          if let Err(e) = catch_unwind(AssertUnwindSafe(run)) {
            error!("Mount function panicked in dispatcher: {:?}", e);
          }
        }
      })
      .map(|_| sender)
      .map_err(|e| MountError::Dispatch(format!("failed to spawn dispatcher: {}", e)))
  })
}

pub(crate) fn run<R, F>(f: F) -> impl Future<Output = Result<R>>
where
  F: FnOnce() -> Result<R> + Send + 'static,
  R: Send + 'static,
{
  let span = Span::current();
  let (sender, receiver) = oneshot();

  let message = MounterMessage {
    span,
    run: Box::new(move || {
      let _ = sender.send(f());
    }),
  };

  let dispatched = dispatcher().and_then(|dispatch| {
    dispatch
      .send(message)
      .map_err(|_| MountError::Dispatch("dispatcher thread is gone".into()))
  });

  read(receiver, dispatched.err())
}

pub(crate) fn run_inst<R, F>(mounter: Arc<dyn MounterImpl>, f: F) -> impl Future<Output = Result<R>>
where
  F: FnOnce(&dyn MounterImpl) -> Result<R> + Send + 'static,
  R: Send + 'static,
{
  run(move || f(&*mounter))
}

async fn read<R>(receiver: Receiver<Result<R>>, dispatch_error: Option<MountError>) -> Result<R> {
  if let Some(e) = dispatch_error {
    return Err(e);
  }

  match receiver.await {
    Ok(r) => r,
    Err(_) => Err(MountError::Dispatch(
      "request was cancelled (dispatcher panicked?)".into(),
    )),
  }
}

impl MountError {
  /// True when the underlying cause is a missing file or directory.
  pub fn is_not_found(&self) -> bool {
    matches!(self, MountError::Io(e) if e.kind() == io::ErrorKind::NotFound)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fake::FakeMounter;
  use std::path::PathBuf;

  fn fast() -> FuseOptions {
    FuseOptions {
      poll_interval: Duration::from_millis(1),
      mount_timeout: Duration::from_millis(30),
      command_timeout: None,
    }
  }

  #[test]
  fn wait_returns_once_mounted() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeMounter::new();
    fake.add_mount_point(dir.path());

    wait_for_mount_point(&fake, dir.path(), &fast()).unwrap();
  }

  #[test]
  fn wait_times_out_when_never_mounted() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeMounter::new();

    let err = wait_for_mount_point(&fake, dir.path(), &fast()).unwrap_err();
    assert!(matches!(err, MountError::Timeout { .. }), "{:?}", err);
  }

  #[test]
  fn unmount_if_mounted_skips_missing_paths() {
    let fake = FakeMounter::new();
    let unmounted = fake
      .unmount_if_mounted(&PathBuf::from("/does/not/exist/anywhere"))
      .unwrap();
    assert!(!unmounted);
    assert!(fake.log().is_empty());
  }

  #[test]
  fn run_executes_on_dispatcher_thread() {
    let name = futures::executor::block_on(run(|| {
      Ok(thread::current().name().map(ToOwned::to_owned))
    }))
    .unwrap();
    assert_eq!(name.as_deref(), Some("mount-utils:dispatch"));
  }
}

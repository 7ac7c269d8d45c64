use crate::{FuseCommand, MountError, MounterImpl, Result};
use crossbeam::{scope, select};
use duct::{cmd, Expression};
use std::{fs, io, os::unix::fs::MetadataExt, path::Path, time::Duration};
use tracing::{debug, error, info, warn};
use which::which;

const BLKID_NO_MATCH: i32 = 2;

/// Talks to the real host: spawns helpers and inspects the filesystem.
#[derive(Debug, Default)]
pub struct OsMounter;

impl OsMounter {
  pub fn new() -> Self {
    OsMounter
  }

  /// Runs `expression` to completion, killing it when `timeout` elapses.
  fn run_bounded(expression: Expression, timeout: Option<Duration>) -> io::Result<bool> {
    let duration = match timeout {
      None => {
        expression.run()?;
        return Ok(true);
      }
      Some(duration) => duration,
    };

    let handle = expression.start()?;
    let handle = &handle;
    scope::<'_, _, io::Result<bool>>(|s| {
      let (sender, receiver) = crossbeam::channel::bounded(1);

      s.spawn(move |_| {
        let result = handle.wait().map(|_| ());
        let _ = sender.send(result);
      });

      let finished = select! {
        recv(receiver) -> result => Some(result),
        default(duration) => None,
      };

      match finished {
        Some(Ok(result)) => result.map(|_| true),
        Some(Err(_)) => Err(io::Error::new(
          io::ErrorKind::Other,
          "command wait thread went away",
        )),
        None => {
          let _ = handle.kill();
          Ok(false)
        }
      }
    })
    .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to spawn threads: {:?}", e)))?
  }
}

impl MounterImpl for OsMounter {
  fn run_command(&self, command: &FuseCommand, timeout: Option<Duration>) -> Result<()> {
    let program = which(command.program()).map_err(|_| MountError::NotFound {
      program: command.program().to_owned(),
    })?;

    info!(
      "Running {} with arguments ({})",
      command.program(),
      command.display_args()
    );
    let mut expression = cmd(program, command.get_args());
    for (key, value) in command.get_envs() {
      expression = expression.env(key, value);
    }

    match Self::run_bounded(expression, timeout) {
      Ok(true) => Ok(()),
      Ok(false) => {
        warn!("{} did not finish in time and was killed", command.program());
        Err(MountError::CommandTimeout {
          program: command.program().to_owned(),
          after: timeout.unwrap_or_default(),
        })
      }
      Err(e) => {
        error!("{} failed: {}", command.program(), e);
        Err(MountError::Command {
          program: command.program().to_owned(),
          args: command.display_args(),
          reason: e.to_string(),
        })
      }
    }
  }

  fn is_likely_not_mount_point(&self, path: &Path) -> Result<bool> {
    let stat = fs::metadata(path)?;
    let parent = match path.parent() {
      Some(parent) => parent,
      // The root directory is always a mount point.
      None => return Ok(false),
    };
    let parent_stat = fs::metadata(parent)?;

    Ok(stat.dev() == parent_stat.dev())
  }

  fn mount(&self, source: &Path, target: &Path, fstype: &str, options: &[String]) -> Result<()> {
    let mut args: Vec<String> = vec!["-t".into(), fstype.into()];
    if !options.is_empty() {
      args.push("-o".into());
      args.push(options.join(","));
    }
    args.push(source.display().to_string());
    args.push(target.display().to_string());

    info!("Mounting cmd mount with arguments ({})", args.join(" "));
    cmd("mount", &args)
      .stderr_to_stdout()
      .run()
      .map(|_| ())
      .map_err(|e| MountError::Command {
        program: "mount".into(),
        args: args.join(" "),
        reason: e.to_string(),
      })
  }

  fn unmount(&self, target: &Path) -> Result<()> {
    info!("Unmounting {}", target.display());
    cmd!("umount", target)
      .stderr_to_stdout()
      .run()
      .map(|_| ())
      .map_err(|e| MountError::Command {
        program: "umount".into(),
        args: target.display().to_string(),
        reason: e.to_string(),
      })
  }

  fn disk_format(&self, device: &Path) -> Result<Option<String>> {
    let output = cmd!("blkid", "-p", "-s", "TYPE", "-o", "value", device)
      .stdout_capture()
      .stderr_null()
      .unchecked()
      .run()?;

    match output.status.code() {
      Some(0) => {
        let fstype = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        debug!("{} has filesystem {:?}", device.display(), fstype);
        Ok(Some(fstype).filter(|v| !v.is_empty()))
      }
      Some(BLKID_NO_MATCH) => Ok(None),
      code => Err(MountError::Command {
        program: "blkid".into(),
        args: device.display().to_string(),
        reason: format!("exited with {:?}", code),
      }),
    }
  }

  fn format(&self, device: &Path, fstype: &str) -> Result<()> {
    let program = format!("mkfs.{}", fstype);
    info!("Formatting {} as {}", device.display(), fstype);
    cmd!(program.as_str(), device)
      .stderr_to_stdout()
      .run()
      .map(|_| ())
      .map_err(|e| MountError::Command {
        program,
        args: device.display().to_string(),
        reason: e.to_string(),
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use test_case::test_case;

  #[test]
  fn fresh_directory_is_not_a_mount_point() {
    let dir = tempfile::tempdir().unwrap();
    let child = dir.path().join("child");
    fs::create_dir(&child).unwrap();

    assert!(OsMounter::new().is_likely_not_mount_point(&child).unwrap());
  }

  #[test]
  fn missing_directory_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = OsMounter::new()
      .is_likely_not_mount_point(&dir.path().join("missing"))
      .unwrap_err();
    assert!(err.is_not_found());
  }

  #[test]
  fn unknown_program_is_reported() {
    let err = OsMounter::new()
      .run_command(&FuseCommand::new("definitely-not-a-fuse-helper"), None)
      .unwrap_err();
    assert!(matches!(err, MountError::NotFound { .. }), "{:?}", err);
  }

  #[test_case("true", None => true ; "success")]
  #[test_case("false", None => false ; "failure")]
  fn exit_status_decides_outcome(program: &str, timeout: Option<Duration>) -> bool {
    OsMounter::new()
      .run_command(&FuseCommand::new(program), timeout)
      .is_ok()
  }

  #[test]
  fn slow_command_is_killed() {
    let err = OsMounter::new()
      .run_command(
        &FuseCommand::new("sleep").arg("5"),
        Some(Duration::from_millis(50)),
      )
      .unwrap_err();
    assert!(matches!(err, MountError::CommandTimeout { .. }), "{:?}", err);
  }
}

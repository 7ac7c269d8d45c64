use std::{fmt, time::Duration};

/// A FUSE helper invocation: program, argv and extra environment.
///
/// Environment values usually carry credentials, so `Debug` only prints
/// their names.
#[derive(Clone, PartialEq, Eq)]
pub struct FuseCommand {
  program: String,
  args: Vec<String>,
  envs: Vec<(String, String)>,
}

impl FuseCommand {
  pub fn new(program: impl Into<String>) -> Self {
    FuseCommand {
      program: program.into(),
      args: Vec::new(),
      envs: Vec::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I>(mut self, args: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.envs.push((key.into(), value.into()));
    self
  }

  #[inline]
  pub fn program(&self) -> &str {
    &self.program
  }

  #[inline]
  pub fn get_args(&self) -> &[String] {
    &self.args
  }

  #[inline]
  pub fn get_envs(&self) -> &[(String, String)] {
    &self.envs
  }

  /// Program and arguments joined with spaces, for error messages.
  pub fn display_args(&self) -> String {
    self.args.join(" ")
  }
}

impl fmt::Debug for FuseCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FuseCommand")
      .field("program", &self.program)
      .field("args", &self.args)
      .field(
        "envs",
        &self.envs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
      )
      .finish()
  }
}

/// Bounds for one FUSE mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseOptions {
  /// How often the target is checked while waiting for the mount.
  pub poll_interval: Duration,
  /// How long the target may take to become a mount point.
  pub mount_timeout: Duration,
  /// The helper process is killed when it runs longer than this.
  pub command_timeout: Option<Duration>,
}

impl Default for FuseOptions {
  fn default() -> Self {
    FuseOptions {
      poll_interval: Duration::from_millis(10),
      mount_timeout: Duration::from_secs(10),
      command_timeout: Some(Duration::from_secs(30)),
    }
  }
}

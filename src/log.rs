//! Leveled, colored logging to stderr.
//!
//! Use the `error!`, `warn!`, `info!` and `debug!` macros; messages above the
//! global level are dropped. Logging is silenced inside unit tests.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
  Error = 0,
  Warn = 1,
  Info = 2,
  Debug = 3,
}

impl Level {
  /// Map a CLI verbosity (`-q` = -1, default 0, each `-v` adds one).
  pub fn from_verbosity(verbosity: i8) -> Self {
    match verbosity {
      i8::MIN..=-1 => Level::Error,
      0 => Level::Info,
      _ => Level::Debug,
    }
  }

  fn from_u8(value: u8) -> Self {
    match value {
      0 => Level::Error,
      1 => Level::Warn,
      2 => Level::Info,
      _ => Level::Debug,
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Level::Error => "ERROR",
      Level::Warn => "WARN",
      Level::Info => "INFO",
      Level::Debug => "DEBUG",
    };
    f.pad(name)
  }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

pub fn set_level(level: Level) {
  MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> Level {
  Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: Level) -> bool {
  level <= self::level()
}

/// Backing function for the logging macros.
#[doc(hidden)]
pub fn log(level: Level, message: &str) {
  if !enabled(level) {
    return;
  }

  let mut stderr = StandardStream::stderr(ColorChoice::Auto);
  let mut spec = ColorSpec::new();
  match level {
    Level::Error => {
      spec.set_fg(Some(Color::Red)).set_bold(true);
    }
    Level::Warn => {
      spec.set_fg(Some(Color::Yellow)).set_bold(true);
    }
    Level::Info => {
      spec.set_fg(Some(Color::Green));
    }
    Level::Debug => {
      spec.set_fg(Some(Color::Cyan));
    }
  }

  let _ = stderr.set_color(&spec);
  let _ = write!(stderr, "[{level:5}]");
  let _ = stderr.reset();
  let _ = writeln!(stderr, " {message}");
}

#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => {{
    if cfg!(not(test)) {
      $crate::log::log($crate::log::Level::Error, &format!($($arg)*))
    }
  }};
}

#[macro_export]
macro_rules! warn {
  ($($arg:tt)*) => {{
    if cfg!(not(test)) {
      $crate::log::log($crate::log::Level::Warn, &format!($($arg)*))
    }
  }};
}

#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => {{
    if cfg!(not(test)) {
      $crate::log::log($crate::log::Level::Info, &format!($($arg)*))
    }
  }};
}

/// Debug messages skip formatting entirely when the level is off.
#[macro_export]
macro_rules! debug {
  ($($arg:tt)*) => {{
    if cfg!(not(test)) && $crate::log::enabled($crate::log::Level::Debug) {
      $crate::log::log($crate::log::Level::Debug, &format!($($arg)*))
    }
  }};
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn level_ordering() {
    assert!(Level::Error < Level::Warn);
    assert!(Level::Info < Level::Debug);
  }

  #[test]
  fn level_display() {
    assert_eq!(Level::Warn.to_string(), "WARN");
    assert_eq!(format!("[{:5}]", Level::Info), "[INFO ]");
  }

  #[test]
  fn verbosity_mapping() {
    assert_eq!(Level::from_verbosity(-1), Level::Error);
    assert_eq!(Level::from_verbosity(0), Level::Info);
    assert_eq!(Level::from_verbosity(2), Level::Debug);
  }

  #[test]
  fn u8_round_trip() {
    for level in [Level::Error, Level::Warn, Level::Info, Level::Debug] {
      assert_eq!(Level::from_u8(level as u8), level);
    }
  }
}

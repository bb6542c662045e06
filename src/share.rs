//! Share links and clipboard delivery.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::catalog::EntityId;

/// Query parameter carrying the shared-view marker.
pub const SHARED_MARKER_PARAM: &str = "capturedAt";

/// Canonical link to an entity. A capture time, when given, becomes the shared-view marker.
pub fn share_link(base: &str, id: EntityId, captured_at: Option<DateTime<Utc>>) -> Result<Url> {
  let mut base = Url::parse(base).map_err(|e| eyre!("Invalid share base URL {}: {}", base, e))?;
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }

  let mut link = base
    .join(&format!("pokemon/{}", id))
    .map_err(|e| eyre!("Failed to build share link for {}: {}", id, e))?;

  if let Some(captured_at) = captured_at {
    link.query_pairs_mut().append_pair(
      SHARED_MARKER_PARAM,
      &captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
  }

  Ok(link)
}

/// Parse a shared-view marker as it appears in a share link.
pub fn parse_shared_marker(raw: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Invalid capture timestamp '{}': {}", raw, e))
}

/// Something that can put text on a clipboard.
pub trait Clipboard {
  fn write_text(&self, text: &str) -> Result<()>;
}

/// Copy `text`, trying `primary` first and `fallback` when it is missing or fails.
pub fn copy_text(primary: Option<&dyn Clipboard>, fallback: &dyn Clipboard, text: &str) -> bool {
  if let Some(primary) = primary {
    match primary.write_text(text) {
      Ok(()) => return true,
      Err(e) => debug!(error = %e, "Primary clipboard failed, falling back"),
    }
  }

  match fallback.write_text(text) {
    Ok(()) => true,
    Err(e) => {
      warn!(error = %e, "Clipboard copy failed");
      false
    }
  }
}

/// The desktop clipboard, reached through whichever helper command is installed.
pub struct SystemClipboard;

const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
  ("wl-copy", &[]),
  ("xclip", &["-selection", "clipboard"]),
  ("pbcopy", &[]),
];

impl SystemClipboard {
  fn run(program: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(program)
      .args(args)
      .stdin(Stdio::piped())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .map_err(|e| eyre!("Failed to start {}: {}", program, e))?;

    child
      .stdin
      .take()
      .ok_or_else(|| eyre!("No stdin for {}", program))?
      .write_all(text.as_bytes())
      .map_err(|e| eyre!("Failed to write to {}: {}", program, e))?;

    let status = child
      .wait()
      .map_err(|e| eyre!("Failed to wait for {}: {}", program, e))?;
    if status.success() {
      Ok(())
    } else {
      Err(eyre!("{} exited with {}", program, status))
    }
  }
}

impl Clipboard for SystemClipboard {
  fn write_text(&self, text: &str) -> Result<()> {
    let mut last_error = eyre!("No clipboard command available");
    for (program, args) in CLIPBOARD_COMMANDS {
      match Self::run(program, args, text) {
        Ok(()) => return Ok(()),
        Err(e) => last_error = e,
      }
    }
    Err(last_error)
  }
}

/// Terminal clipboard via the OSC 52 escape sequence.
pub struct Osc52Clipboard<W> {
  out: Mutex<W>,
}

impl<W: Write> Osc52Clipboard<W> {
  pub fn new(out: W) -> Self {
    Self {
      out: Mutex::new(out),
    }
  }

  #[cfg(test)]
  fn into_inner(self) -> W {
    self
      .out
      .into_inner()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl<W: Write> Clipboard for Osc52Clipboard<W> {
  fn write_text(&self, text: &str) -> Result<()> {
    let mut out = self.out.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    write!(out, "\x1b]52;c;{}\x07", STANDARD.encode(text))
      .and_then(|_| out.flush())
      .map_err(|e| eyre!("Failed to write clipboard sequence: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::cell::Cell;

  struct Broken;

  impl Clipboard for Broken {
    fn write_text(&self, _text: &str) -> Result<()> {
      Err(eyre!("not allowed"))
    }
  }

  struct Recording(Cell<usize>);

  impl Clipboard for Recording {
    fn write_text(&self, _text: &str) -> Result<()> {
      self.0.set(self.0.get() + 1);
      Ok(())
    }
  }

  #[test]
  fn test_share_link_without_capture() {
    let link = share_link("https://dexkeep.app", 25, None).unwrap();
    assert_eq!(link.as_str(), "https://dexkeep.app/pokemon/25");
  }

  #[test]
  fn test_share_link_carries_marker() {
    let captured_at = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 0).unwrap();

    let link = share_link("https://dexkeep.app/", 25, Some(captured_at)).unwrap();

    let marker = link
      .query_pairs()
      .find(|(k, _)| k == SHARED_MARKER_PARAM)
      .map(|(_, v)| v.into_owned())
      .unwrap();
    assert_eq!(parse_shared_marker(&marker).unwrap(), captured_at);
  }

  #[test]
  fn test_copy_uses_primary_when_it_works() {
    let primary = Recording(Cell::new(0));
    let fallback = Recording(Cell::new(0));

    assert!(copy_text(Some(&primary), &fallback, "link"));
    assert_eq!((primary.0.get(), fallback.0.get()), (1, 0));
  }

  #[test]
  fn test_copy_falls_back_when_primary_fails_or_is_missing() {
    let fallback = Recording(Cell::new(0));

    assert!(copy_text(Some(&Broken), &fallback, "link"));
    assert!(copy_text(None, &fallback, "link"));
    assert_eq!(fallback.0.get(), 2);
  }

  #[test]
  fn test_copy_reports_failure_when_both_fail() {
    assert!(!copy_text(Some(&Broken), &Broken, "link"));
  }

  #[test]
  fn test_osc52_sequence() {
    let clipboard = Osc52Clipboard::new(Vec::new());

    clipboard.write_text("hi").unwrap();

    assert_eq!(clipboard.into_inner(), b"\x1b]52;c;aGk=\x07".to_vec());
  }
}

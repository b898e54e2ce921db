use std::time::Duration;
#[cfg(target_os = "linux")]
use std::time::Instant;

#[cfg(target_os = "linux")]
use tracing::debug;

use crate::error::{CollaboratorError, Result};
use crate::settings::Settings;

pub trait Clipboard {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// System clipboard via arboard.
///
/// On Linux the selection is served by the process that set it, so a write
/// blocks until another client takes ownership or `hold` runs out.
pub struct SystemClipboard {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    hold: Duration,
}

impl SystemClipboard {
    pub fn new(settings: &Settings) -> Self {
        Self {
            hold: Duration::from_secs(settings.clipboard_hold_secs),
        }
    }

    #[cfg(target_os = "linux")]
    fn set(&self, cb: &mut arboard::Clipboard, text: &str) -> std::result::Result<(), arboard::Error> {
        use arboard::SetExtLinux;

        debug!(hold_secs = self.hold.as_secs(), "serving clipboard selection");
        cb.set().wait_until(Instant::now() + self.hold).text(text)
    }

    #[cfg(not(target_os = "linux"))]
    fn set(&self, cb: &mut arboard::Clipboard, text: &str) -> std::result::Result<(), arboard::Error> {
        cb.set_text(text)
    }
}

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut cb = arboard::Clipboard::new().map_err(clipboard_error)?;
        self.set(&mut cb, text).map_err(clipboard_error)
    }
}

fn clipboard_error(e: arboard::Error) -> crate::error::Error {
    CollaboratorError::Clipboard(e.to_string()).into()
}

/// Writes the text to stdout instead, for piping.
pub struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemoryClipboard;


// ── Tests ──

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn settings(hold: u64) -> Settings {
        Settings {
            db_path: PathBuf::from("unused.sqlite"),
            user_agent: "test".into(),
            timeout_secs: 1,
            clipboard_hold_secs: hold,
        }
    }

    #[test]
    fn system_clipboard_holds_for_configured_time() {
        assert_eq!(SystemClipboard::new(&settings(45)).hold, Duration::from_secs(45));
        assert_eq!(SystemClipboard::new(&settings(0)).hold, Duration::ZERO);
    }

    #[test]
    fn memory_clipboard_records_and_denies() {
        let cb = MemoryClipboard::default();
        cb.write_text("hi").unwrap();
        assert_eq!(cb.contents.borrow().as_deref(), Some("hi"));

        let denied = MemoryClipboard {
            denied: true,
            ..Default::default()
        };
        assert!(denied.write_text("hi").is_err());
        assert!(denied.contents.borrow().is_none());
    }
}

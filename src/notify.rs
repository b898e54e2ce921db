use std::fmt;

use tracing::{info, warn};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

/// Short message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        let message = message.into();
        info!(%message, "notify");
        Self {
            level: Level::Success,
            message,
        }
    }

    pub fn error(err: &Error) -> Self {
        warn!(error = %err, "action failed");
        Self {
            level: Level::Error,
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Success => write!(f, "✓ {}", self.message),
            Level::Error => write!(f, "✗ {}", self.message),
        }
    }
}

//! Notification sink port.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::domain::error::SwingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotifyLevel {
    Info,
    Warning,
    Alert,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Info => "INFO",
            NotifyLevel::Warning => "WARNING",
            NotifyLevel::Alert => "ALERT",
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(NotifyLevel::Info),
            "WARNING" => Ok(NotifyLevel::Warning),
            "ALERT" => Ok(NotifyLevel::Alert),
            other => Err(format!("unknown notification level: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub timestamp: NaiveDateTime,
    pub level: NotifyLevel,
    pub message: String,
}

/// Fire-and-forget: callers log a failure and carry on.
pub trait NotifyPort: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str) -> Result<(), SwingError>;
}

//! Notification sink that writes to the tracing log.

use tracing::{error, info, warn};

use crate::domain::error::SwingError;
use crate::ports::notify_port::{NotifyLevel, NotifyPort};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) -> Result<(), SwingError> {
        match level {
            NotifyLevel::Info => info!(target: "swingtrader::notify", "{}", message),
            NotifyLevel::Warning => warn!(target: "swingtrader::notify", "{}", message),
            NotifyLevel::Alert => error!(target: "swingtrader::notify", "{}", message),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fails() {
        let notifier = LogNotifier;
        for level in [NotifyLevel::Info, NotifyLevel::Warning, NotifyLevel::Alert] {
            assert!(notifier.notify(level, "cycle complete").is_ok());
        }
    }
}

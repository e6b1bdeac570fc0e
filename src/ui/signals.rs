use crate::error::{ExportError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Ctrl+C handling. A running export is never interrupted; the press count is
/// only checked before the next database is started. A second press exits.
pub struct GracefulShutdown {
    presses: Arc<AtomicUsize>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let presses = Arc::new(AtomicUsize::new(0));
        let handler_presses = Arc::clone(&presses);

        ctrlc::set_handler(move || {
            if handler_presses.fetch_add(1, Ordering::SeqCst) == 0 {
                eprintln!("\n🛑 Stopping after the current database... (press Ctrl+C again to force exit)");
            } else {
                eprintln!("\n💀 Force stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| ExportError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(Self { presses })
    }

    /// An instance with no signal handler behind it.
    pub fn detached() -> Self {
        Self {
            presses: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Install the handler, or go without one when the process already has one.
    pub fn install_or_detached() -> Self {
        Self::new().unwrap_or_else(|_| Self::detached())
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if self.presses.load(Ordering::SeqCst) > 0 {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn request_shutdown(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
    }
}

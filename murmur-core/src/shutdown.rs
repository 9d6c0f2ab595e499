//! Cooperative shutdown.
//!
//! Signal handlers only set an atomic flag; the protocol loop checks it once
//! per iteration, so a signal never interrupts a response mid-write. Reads
//! restart after a signal, so a loop blocked on input notices the flag once
//! the next line arrives. A second signal while the flag is already set
//! terminates the process.

use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared "stop requested" flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the protocol loop to stop after the current command.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Route SIGINT and SIGTERM to this flag.
    ///
    /// # Errors
    /// Returns an error if a handler cannot be registered.
    #[cfg(unix)]
    pub fn install_signal_handlers(&self) -> io::Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::flag;

        for signal in [SIGINT, SIGTERM] {
            // Order matters: the conditional shutdown sees the flag before
            // this signal's own handler sets it.
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&self.0))?;
            flag::register(signal, Arc::clone(&self.0))?;
        }
        tracing::debug!("signal handlers registered (SIGINT, SIGTERM)");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn install_signal_handlers(&self) -> io::Result<()> {
        tracing::debug!("signal handlers not supported on this platform");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let flag = ShutdownFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_requested());
        flag.request();
        assert!(observer.is_requested());
    }
}

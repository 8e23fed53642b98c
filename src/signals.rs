//! Deferral of termination signals
//!
//! While a session runs, SIGINT, SIGTERM and SIGHUP are blocked so that an
//! erase or partition replacement is never cut short by a keypress or a
//! hangup. Signals raised meanwhile stay pending and are delivered after
//! the guard is dropped, once the workspace has been released. Child
//! processes (fsck, the IO controller tool) inherit the mask.

use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};

/// Blocks termination signals until dropped
pub struct SignalGuard {
    previous: SigSet,
}

impl SignalGuard {
    /// Block SIGINT, SIGTERM and SIGHUP on the calling thread
    pub fn block() -> nix::Result<Self> {
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        set.add(Signal::SIGTERM);
        set.add(Signal::SIGHUP);

        let mut previous = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&set), Some(&mut previous))?;
        log::debug!("Termination signals deferred");
        Ok(Self { previous })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        if let Err(e) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
            log::warn!("Failed to restore signal mask: {}", e);
        }
    }
}

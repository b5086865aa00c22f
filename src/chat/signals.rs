//! SIGINT and SIGTERM while the REPL is running.
//!
//! Outside `readline` the terminal is in cooked mode, so Ctrl+C arrives as
//! SIGINT. It cancels the running turn instead of killing ember, so tool
//! servers in their own process groups are still shut down on the way out.

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    /// SIGINT: abandon the running turn.
    Cancel,
    /// SIGTERM: end the session.
    Terminate,
}

pub(crate) struct Signals {
    terminate: Signal,
}

impl Signals {
    pub(crate) fn install() -> Result<Self> {
        let terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        Ok(Self { terminate })
    }

    /// Wait for the next interrupt.
    pub(crate) async fn recv(&mut self) -> Interrupt {
        tokio::select! {
            Some(()) = self.terminate.recv() => Interrupt::Terminate,
            Ok(()) = tokio::signal::ctrl_c() => Interrupt::Cancel,
            else => std::future::pending::<Interrupt>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sigterm_is_reported_as_terminate() {
        let mut signals = Signals::install().unwrap();
        // SAFETY: raising a signal this process now handles.
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        let interrupt = tokio::time::timeout(Duration::from_secs(2), signals.recv())
            .await
            .unwrap();
        assert_eq!(interrupt, Interrupt::Terminate);
    }
}

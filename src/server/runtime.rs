//! Mutable runtime settings shared between the relay loop and the control plane

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::AuthToken;

/// Process-wide runtime state
///
/// Written only by the control plane; read by the relay loop on every
/// iteration and by request authorization.
#[derive(Debug)]
pub struct RuntimeConfig {
    poll_interval_ms: AtomicU32,
    auth_token: Option<AuthToken>,
    shutdown: CancellationToken,
}

impl RuntimeConfig {
    pub fn new(poll_interval_ms: u32, auth_token: Option<AuthToken>) -> Self {
        Self {
            poll_interval_ms: AtomicU32::new(poll_interval_ms),
            auth_token,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn poll_interval_ms(&self) -> u32 {
        self.poll_interval_ms.load(Ordering::Relaxed)
    }

    /// Upper bound on one event-loop wait
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms()))
    }

    pub fn set_poll_interval_ms(&self, value: u32) {
        self.poll_interval_ms.store(value, Ordering::Relaxed);
        tracing::info!(poll_interval_ms = value, "Poll interval updated");
    }

    /// Expected token, `None` when authentication is disabled
    pub fn auth_token(&self) -> Option<&AuthToken> {
        self.auth_token.as_ref()
    }

    /// Check a presented token against the configured one
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        match (&self.auth_token, presented) {
            (None, _) => true,
            (Some(expected), Some(token)) => expected.verify(token),
            (Some(_), None) => false,
        }
    }

    /// Ask the relay loop to finish its current iteration and exit
    pub fn request_stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when a stop is requested
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_roundtrip() {
        let runtime = RuntimeConfig::new(10, None);
        assert_eq!(runtime.poll_interval(), Duration::from_millis(10));

        runtime.set_poll_interval_ms(250);
        assert_eq!(runtime.poll_interval_ms(), 250);
    }

    #[test]
    fn test_authorize() {
        let open = RuntimeConfig::new(10, None);
        assert!(open.authorize(None));
        assert!(open.authorize(Some("anything")));

        let token = AuthToken::derive("user", "pass");
        let guarded = RuntimeConfig::new(10, Some(token.clone()));
        assert!(guarded.authorize(Some(token.as_str())));
        assert!(!guarded.authorize(Some("0000000000000000")));
        assert!(!guarded.authorize(None));
    }

    #[test]
    fn test_stop_cancels_token() {
        let runtime = RuntimeConfig::new(10, None);
        let token = runtime.shutdown_token();
        assert!(!runtime.is_stopping());

        runtime.request_stop();
        assert!(runtime.is_stopping());
        assert!(token.is_cancelled());
    }
}

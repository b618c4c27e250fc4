//! Reconnect loop for the external links

use std::future::Future;
use std::time::Instant;

use crate::error::Result;

use super::state::{LinkHandle, LinkKind, LinkState};

/// Establishes external links on demand
///
/// `generation` identifies the attempt; a link that later fails reports it
/// back so a stale closure cannot tear down a newer link.
pub trait LinkFactory {
    fn establish(
        &self,
        kind: LinkKind,
        generation: u64,
    ) -> impl Future<Output = Result<LinkHandle>> + Send;
}

/// One slot per link, nudged by a shared retry timer
#[derive(Debug, Default)]
pub struct LinkManager {
    slots: [LinkState; 3],
    next_generation: u64,
    attempts: u64,
    failures: u64,
}

impl LinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to establish every absent link
    ///
    /// Established links are left alone. Failures are logged and retried on
    /// the next call. Returns the number of links brought up.
    pub async fn reconnect<F: LinkFactory>(&mut self, factory: &F) -> usize {
        let mut established = 0;

        for kind in LinkKind::ALL {
            if self.slots[kind.index()].is_established() {
                continue;
            }

            self.next_generation += 1;
            let generation = self.next_generation;
            self.attempts += 1;

            match factory.establish(kind, generation).await {
                Ok(handle) => {
                    tracing::info!(
                        link = %kind,
                        generation = generation,
                        addr = ?handle.local_addr(),
                        "Link established"
                    );
                    self.slots[kind.index()] = LinkState::Established {
                        handle,
                        generation,
                        since: Instant::now(),
                    };
                    established += 1;
                }
                Err(e) => {
                    self.failures += 1;
                    tracing::error!(link = %kind, error = %e, "Cannot establish link");
                }
            }
        }

        established
    }

    /// Handle a closure report from a link
    ///
    /// Returns true if the slot went back to absent. Reports for an older
    /// generation are ignored.
    pub fn on_closed(&mut self, kind: LinkKind, generation: u64) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.generation() != Some(generation) {
            tracing::debug!(link = %kind, generation = generation, "Ignoring stale link closure");
            return false;
        }

        if let LinkState::Established { since, .. } = slot {
            tracing::info!(
                link = %kind,
                generation = generation,
                uptime_secs = since.elapsed().as_secs(),
                "Link closed"
            );
        }
        *slot = LinkState::Absent;
        true
    }

    pub fn state(&self, kind: LinkKind) -> &LinkState {
        &self.slots[kind.index()]
    }

    pub fn is_established(&self, kind: LinkKind) -> bool {
        self.state(kind).is_established()
    }

    pub fn handle(&self, kind: LinkKind) -> Option<&LinkHandle> {
        self.state(kind).handle()
    }

    /// Establishment attempts so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Failed establishment attempts so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Tear down every link
    pub fn close_all(&mut self) {
        for slot in &mut self.slots {
            *slot = LinkState::Absent;
        }
    }
}

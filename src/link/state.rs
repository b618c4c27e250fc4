//! Link slot state
//!
//! Tracks whether each external link is currently up and what holds it open.

use std::net::SocketAddr;
use std::time::Instant;

use rumqttc::AsyncClient;
use tokio::task::JoinHandle;

/// External link roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Producer-facing frame listener
    Ingest,
    /// Control-plane HTTP listener
    Control,
    /// Outbound liveness publisher
    Heartbeat,
}

impl LinkKind {
    /// Every link, in retry order
    pub const ALL: [LinkKind; 3] = [LinkKind::Ingest, LinkKind::Control, LinkKind::Heartbeat];

    pub(crate) fn index(self) -> usize {
        match self {
            LinkKind::Ingest => 0,
            LinkKind::Control => 1,
            LinkKind::Heartbeat => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Ingest => "ingest",
            LinkKind::Control => "control",
            LinkKind::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle on an established link
///
/// Dropping the handle tears the link down.
#[derive(Debug, Default)]
pub struct LinkHandle {
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    announcer: Option<AsyncClient>,
}

impl LinkHandle {
    /// Handle owning the task that serves the link
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            task: Some(task),
            local_addr: None,
            announcer: None,
        }
    }

    /// Handle with no background task
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn with_announcer(mut self, client: AsyncClient) -> Self {
        self.announcer = Some(client);
        self
    }

    /// Bound address of a listener link
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Publisher of a heartbeat link
    pub fn announcer(&self) -> Option<&AsyncClient> {
        self.announcer.as_ref()
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// State of one link slot
#[derive(Debug, Default)]
pub enum LinkState {
    /// No live connection
    #[default]
    Absent,
    /// Live connection
    Established {
        handle: LinkHandle,
        /// Distinguishes this establishment from earlier ones
        generation: u64,
        since: Instant,
    },
}

impl LinkState {
    pub fn is_established(&self) -> bool {
        matches!(self, LinkState::Established { .. })
    }

    pub fn generation(&self) -> Option<u64> {
        match self {
            LinkState::Established { generation, .. } => Some(*generation),
            LinkState::Absent => None,
        }
    }

    pub fn handle(&self) -> Option<&LinkHandle> {
        match self {
            LinkState::Established { handle, .. } => Some(handle),
            LinkState::Absent => None,
        }
    }
}

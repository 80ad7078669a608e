//! Tunnel lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique tunnel IDs for tracing
//! - Count live tunnels so shutdown can wait for them to drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Global atomic counter for tunnel IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static TUNNEL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunnelId(u64);

impl TunnelId {
    /// Generate a new unique tunnel ID.
    pub fn new() -> Self {
        Self(TUNNEL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TunnelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TunnelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tunnel-{}", self.0)
    }
}

/// Tracks live tunnels.
#[derive(Debug, Clone, Default)]
pub struct TunnelTracker {
    active_count: Arc<AtomicU64>,
}

impl TunnelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live tunnel. Returns a guard that decrements on drop.
    pub fn track(&self) -> TunnelGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        TunnelGuard {
            active_count: Arc::clone(&self.active_count),
            id: TunnelId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked tunnel has closed.
    pub async fn wait_until_idle(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Guard that tracks a tunnel's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct TunnelGuard {
    active_count: Arc<AtomicU64>,
    id: TunnelId,
}

impl TunnelGuard {
    pub fn id(&self) -> TunnelId {
        self.id
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(tunnel_id = %self.id, "Tunnel released");
    }
}

//! Unidirectional byte pump.
//!
//! Pumps are launched in pairs over the same two endpoints. Each pump only
//! holds one half of each stream, so closing "both ends" means shutting down
//! its own write half and firing the pair's [`CloseLatch`]; the peer pump
//! sees the latch, returns, and drops the remaining halves.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

const PUMP_BUFFER_SIZE: usize = 16 * 1024;

/// Upper bound on flushing a destination's close (e.g. a TLS close_notify
/// to a client that stopped reading).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// One-shot close signal shared by the two pumps of a tunnel.
#[derive(Debug, Clone)]
pub struct CloseLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the tunnel. Idempotent.
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot observe a dropped channel.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn closer(&self) -> Closer {
        Closer(self.clone())
    }
}

impl Default for CloseLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Fires the latch when dropped, whatever path the pump leaves by.
struct Closer(CloseLatch);

impl Drop for Closer {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Copy bytes from `src` to `dst` until EOF, an I/O error, or the latch
/// closes. Both ends are released before returning.
///
/// Returns the number of bytes delivered to `dst`. Errors are logged at
/// debug level and otherwise swallowed: the peers observe the close.
pub async fn pump<W, R>(mut dst: W, mut src: R, latch: CloseLatch) -> u64
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let _closer = latch.closer();
    let mut buf = vec![0u8; PUMP_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let read = tokio::select! {
            read = src.read(&mut buf) => read,
            _ = latch.closed() => break,
        };
        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, "Pump read failed");
                break;
            }
        };

        let written = tokio::select! {
            written = dst.write_all(&buf[..n]) => written,
            _ = latch.closed() => break,
        };
        if let Err(e) = written {
            tracing::debug!(error = %e, "Pump write failed");
            break;
        }
        copied += n as u64;
    }

    // Release the peer before flushing our own close; the flush may stall.
    latch.close();
    match tokio::time::timeout(SHUTDOWN_GRACE, dst.shutdown()).await {
        Ok(Err(e)) => tracing::trace!(error = %e, "Pump shutdown failed"),
        Err(_) => tracing::debug!("Pump shutdown timed out"),
        Ok(Ok(())) => {}
    }
    copied
}

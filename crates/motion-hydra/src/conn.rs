//! Self-healing TCP connection to a Hydra controller.

use motion_core::{MotionError, MotionResult, SHUTDOWN_TIMEOUT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Hydra controllers listen on this port unless reconfigured.
pub const DEFAULT_PORT: u16 = 400;

/// Per-exchange response deadline.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound on a single controller response.
pub const MAX_MESSAGE_BYTES: usize = 1024;

const RECONNECT_DELAY: Duration = Duration::from_millis(100);

type Writer = Arc<tokio::sync::Mutex<Option<OwnedWriteHalf>>>;

enum ReadExit {
    Stopped,
    Dropped,
}

/// One TCP connection to a controller.
///
/// A background supervisor task owns the read half: it turns each
/// socket read into one response line on a capacity-1 channel, and when
/// the controller drops the connection it redials until the link is
/// back or the connection is closed. Writes go through [`Self::send`]
/// and fail fast with [`MotionError::Communication`] while the link is
/// down.
///
/// The protocol has no correlation identifiers; request/response
/// pairing is positional, so callers sharing one connection must
/// serialize their exchanges.
pub struct HydraConnection {
    addr: String,
    writer: Writer,
    rx: tokio::sync::Mutex<mpsc::Receiver<String>>,
    shutdown: Arc<AtomicBool>,
    stop: Arc<Notify>,
    /// Kicks the supervisor out of a blocking read when a send
    /// discovers the link is broken before the reader does.
    reconnect: Arc<Notify>,
    supervisor: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl HydraConnection {
    /// Dial the controller and start the reader supervisor.
    #[instrument(err)]
    pub async fn connect(addr: impl Into<String> + std::fmt::Debug) -> MotionResult<Self> {
        let addr = addr.into();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| MotionError::Communication(format!("connect {addr}: {e}")))?;
        stream.set_nodelay(true)?;
        let (reader, write_half) = stream.into_split();
        info!(%addr, "connected to Hydra controller");

        let writer: Writer = Arc::new(tokio::sync::Mutex::new(Some(write_half)));
        // Rendezvous channel: the reader blocks until the response is
        // claimed, so one exchange's reply cannot overwrite another's.
        let (tx, rx) = mpsc::channel(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(Notify::new());
        let reconnect = Arc::new(Notify::new());

        let handle = tokio::spawn(supervise(
            addr.clone(),
            writer.clone(),
            tx,
            shutdown.clone(),
            stop.clone(),
            reconnect.clone(),
            reader,
        ));

        Ok(Self {
            addr,
            writer,
            rx: tokio::sync::Mutex::new(rx),
            shutdown,
            stop,
            reconnect,
            supervisor: parking_lot::Mutex::new(Some(handle)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the write half is currently installed.
    pub async fn is_connected(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Write one raw protocol line. A failed write signals the
    /// supervisor to redial and drains the response slot, so a later
    /// exchange cannot pick up a reply meant for this one.
    pub async fn send(&self, line: &str) -> MotionResult<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(MotionError::Disconnected);
        }
        let mut guard = self.writer.lock().await;
        let Some(w) = guard.as_mut() else {
            drop(guard);
            self.drain_stale().await;
            return Err(MotionError::Communication(format!(
                "{}: link down",
                self.addr
            )));
        };
        if let Err(e) = w.write_all(line.as_bytes()).await {
            // Drop the broken half and kick the supervisor; the read
            // half may still be sitting in a healthy-looking blocking
            // read on a half-closed socket.
            *guard = None;
            drop(guard);
            self.reconnect.notify_one();
            self.drain_stale().await;
            return Err(MotionError::Communication(format!(
                "{}: write failed: {e}",
                self.addr
            )));
        }
        Ok(())
    }

    /// Wait for the next response line.
    pub async fn receive(&self, timeout: Duration) -> MotionResult<String> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(MotionError::Disconnected),
            Err(_) => {
                // The exchange is abandoned; whatever arrived in the
                // meantime belongs to it, not to the next caller.
                while let Ok(stale) = rx.try_recv() {
                    warn!(addr = %self.addr, stale = %stale, "discarding stale response");
                }
                Err(MotionError::Timeout(format!(
                    "{}: no response within {timeout:?}",
                    self.addr
                )))
            }
        }
    }

    /// One positional exchange: discard anything a previous timed-out
    /// exchange left behind, send the request, wait for the reply.
    pub async fn send_and_receive(&self, line: &str, timeout: Duration) -> MotionResult<String> {
        self.drain_stale().await;
        self.send(line).await?;
        self.receive(timeout).await
    }

    async fn drain_stale(&self) {
        let mut rx = self.rx.lock().await;
        while let Ok(stale) = rx.try_recv() {
            warn!(addr = %self.addr, stale = %stale, "discarding stale response");
        }
    }

    /// Stop the supervisor and drop the socket. Idempotent.
    #[instrument(skip(self), fields(addr = %self.addr), err)]
    pub async fn close(&self) -> MotionResult<()> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stop.notify_waiters();
        self.writer.lock().await.take();
        let handle = self.supervisor.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                warn!(addr = %self.addr, "reader supervisor did not stop in time, aborting");
                handle.abort();
            }
        }
        info!(addr = %self.addr, "connection closed");
        Ok(())
    }
}

/// Owns the read half for the life of the connection: pump responses
/// until the link drops, then redial and resume.
async fn supervise(
    addr: String,
    writer: Writer,
    tx: mpsc::Sender<String>,
    shutdown: Arc<AtomicBool>,
    stop: Arc<Notify>,
    reconnect: Arc<Notify>,
    initial_reader: OwnedReadHalf,
) {
    let mut reader = Some(initial_reader);
    loop {
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        let r = match reader.take() {
            Some(r) => r,
            None => match redial(&addr, &writer, &shutdown, &stop).await {
                Some(r) => r,
                None => return,
            },
        };
        match read_loop(r, &tx, &stop, &reconnect).await {
            ReadExit::Stopped => return,
            ReadExit::Dropped => {
                // Invalidate the write half so sends fail fast while
                // the redial is in progress.
                writer.lock().await.take();
                warn!(%addr, "controller dropped the connection, redialing");
            }
        }
    }
}

async fn read_loop(
    reader: OwnedReadHalf,
    tx: &mpsc::Sender<String>,
    stop: &Notify,
    reconnect: &Notify,
) -> ReadExit {
    use tokio::io::AsyncReadExt;
    let mut reader = reader;
    let mut buf = vec![0u8; MAX_MESSAGE_BYTES];
    loop {
        let n = tokio::select! {
            _ = stop.notified() => return ReadExit::Stopped,
            _ = reconnect.notified() => return ReadExit::Dropped,
            res = reader.read(&mut buf) => match res {
                Ok(0) => return ReadExit::Dropped,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "socket read failed");
                    return ReadExit::Dropped;
                }
            },
        };
        // One read is one response; the controller writes each reply in
        // a single segment.
        let line = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        tokio::select! {
            _ = stop.notified() => return ReadExit::Stopped,
            res = tx.send(line) => {
                if res.is_err() {
                    return ReadExit::Stopped;
                }
            }
        }
    }
}

/// Redial until the controller answers or the connection is closed.
async fn redial(
    addr: &str,
    writer: &Writer,
    shutdown: &Arc<AtomicBool>,
    stop: &Arc<Notify>,
) -> Option<OwnedReadHalf> {
    loop {
        if shutdown.load(Ordering::Acquire) {
            return None;
        }
        let attempt = async {
            tokio::time::sleep(RECONNECT_DELAY).await;
            TcpStream::connect(addr).await
        };
        tokio::select! {
            _ = stop.notified() => return None,
            res = attempt => match res {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(error = %e, "set_nodelay failed on redial");
                    }
                    let (r, w) = stream.into_split();
                    *writer.lock().await = Some(w);
                    info!(%addr, "reconnected to controller");
                    return Some(r);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "redial attempt failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reconnect_signal_interrupts_reader() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let client = TcpStream::connect(addr).await?;
        let (_server, _) = listener.accept().await?;
        let (reader, _write_half) = client.into_split();

        let (tx, _rx) = mpsc::channel(1);
        let stop = Notify::new();
        let reconnect = Notify::new();
        // The signal arrives before the reader polls it, as it does
        // when a send fails while the reader sits in a blocking read
        // on the half-closed socket. The permit must stick.
        reconnect.notify_one();

        let exit = tokio::time::timeout(
            Duration::from_secs(1),
            read_loop(reader, &tx, &stop, &reconnect),
        )
        .await?;
        assert!(matches!(exit, ReadExit::Dropped));
        Ok(())
    }
}

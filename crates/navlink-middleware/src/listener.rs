//! Background TCP listener feeding the inbound queue.
//!
//! The listener runs on its own OS thread with a single-threaded Tokio
//! runtime.  It never touches agent state; its only output is the inbound
//! queue.  The protocol is one envelope per connection:
//!
//! 1. accept a connection (bounded by the poll timeout so the running flag is
//!    re-checked regularly),
//! 2. perform a single read of at most `buffer_size` bytes,
//! 3. decode one envelope and push it onto the inbound queue,
//! 4. close the connection.
//!
//! A malformed buffer only costs that one connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use navlink_types::{Envelope, NavError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::codec;

/// Handle to the running listener thread.
///
/// Dropping the handle performs the same cooperative shutdown as
/// [`Listener::shutdown`].
pub struct Listener {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Bind `addr` and start accepting on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Bind`] when the address cannot be bound and
    /// [`NavError::Runtime`] when the thread or its runtime cannot be
    /// created.  There is no retry.
    pub fn spawn(
        addr: SocketAddr,
        poll_timeout: Duration,
        buffer_size: usize,
        inbound: UnboundedSender<Envelope>,
    ) -> Result<Self, NavError> {
        let bind_err = |e: std::io::Error| NavError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        };
        let std_listener = std::net::TcpListener::bind(addr).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_listener.local_addr().map_err(bind_err)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NavError::Runtime(format!("listener runtime: {e}")))?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("navlink-listener".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    match TcpListener::from_std(std_listener) {
                        Ok(listener) => {
                            accept_loop(listener, flag, poll_timeout, buffer_size, inbound).await;
                        }
                        Err(e) => error!(addr = %local_addr, error = %e, "listener registration failed"),
                    }
                });
            })
            .map_err(|e| NavError::Runtime(format!("listener thread: {e}")))?;

        info!(addr = %local_addr, "inbound listener started");
        Ok(Self {
            local_addr,
            running,
            handle: Some(handle),
        })
    }

    /// The address actually bound (useful when spawned on port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `true` until the listener thread has exited.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Clear the running flag and wait for the thread to exit.
    ///
    /// Blocks for at most one poll interval plus any in-flight receive.
    /// Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(addr = %self.local_addr, "listener thread panicked");
            } else {
                info!(addr = %self.local_addr, "inbound listener stopped");
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn accept_loop(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    poll_timeout: Duration,
    buffer_size: usize,
    inbound: UnboundedSender<Envelope>,
) {
    while running.load(Ordering::Acquire) {
        let (stream, peer) = match time::timeout(poll_timeout, listener.accept()).await {
            // Poll interval elapsed; loop to re-check the running flag.
            Err(_) => continue,
            Ok(Err(e)) => {
                warn!(error = %e, "accept failed");
                continue;
            }
            Ok(Ok(conn)) => conn,
        };

        match receive_one(stream, poll_timeout, buffer_size).await {
            Ok(envelope) => {
                debug!(peer = %peer, agent = %envelope.agent_name, "envelope received");
                if inbound.send(envelope).is_err() {
                    info!("inbound queue closed; listener exiting");
                    break;
                }
            }
            Err(e) => debug!(peer = %peer, error = %e, "dropping connection"),
        }
    }
}

async fn receive_one(
    mut stream: TcpStream,
    timeout: Duration,
    buffer_size: usize,
) -> Result<Envelope, NavError> {
    let mut buf = vec![0u8; buffer_size];
    let n = time::timeout(timeout, stream.read(&mut buf))
        .await
        .map_err(|_| NavError::Transport("receive timed out".to_string()))?
        .map_err(|e| NavError::Transport(e.to_string()))?;
    let _ = stream.shutdown().await;
    codec::decode(&buf[..n])
}

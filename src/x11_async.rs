//! X11 Async Readiness
//!
//! Wakes the async event loop when the X11 socket becomes readable. A
//! blocking task polls the connection's file descriptor with mio and signals
//! a `Notify`; events themselves are read by the display adapter.

use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{Notify, oneshot};
use tracing::{info, warn};
use x11rb::rust_connection::RustConnection;

/// How long the poller blocks before checking for shutdown
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Readiness notifications for the X11 connection
pub struct X11Readiness {
    notify: Arc<Notify>,
    /// Dropping this stops the polling task
    _task_guard: oneshot::Receiver<()>,
}

impl X11Readiness {
    /// Start polling the connection's socket
    pub fn new(conn: &RustConnection) -> Result<Self> {
        let fd = conn.stream().as_raw_fd();
        let notify = Arc::new(Notify::new());
        let task_notify = Arc::clone(&notify);

        let (guard, task_guard) = oneshot::channel::<()>();
        let mut poll = mio::Poll::new().context("Failed to create mio Poll")?;
        let mut events = mio::Events::with_capacity(1);

        poll.registry()
            .register(
                &mut mio::unix::SourceFd(&fd),
                mio::Token(0),
                mio::Interest::READABLE,
            )
            .context("Failed to register X11 fd with mio")?;

        tokio::task::spawn_blocking(move || {
            loop {
                if guard.is_closed() {
                    info!("X11 socket polling task shutting down");
                    return;
                }
                if let Err(err) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                    warn!("X11 socket poll failed: {:?}", err);
                    continue;
                }
                if events.iter().any(|event| event.token() == mio::Token(0)) {
                    task_notify.notify_one();
                }
            }
        });

        Ok(Self {
            notify,
            _task_guard: task_guard,
        })
    }

    /// Wait until the socket has become readable since the last wake-up
    pub async fn wait_readable(&self) {
        self.notify.notified().await;
    }
}

//! ---
//! pwl_section: "03-network-interfaces"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "UDP command server and TCP telemetry server."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Connectionless command channel. One datagram in, one reply out; attack
//! control tokens get no reply. Shutdown pokes the blocked receive with a
//! loopback poison datagram so the task never hangs the process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use pwrlab_core::{CommandDispatcher, Outcome};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 2048;

/// Handle to the running command listener.
pub struct CommandServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CommandServer {
    /// Bind the socket and start serving. A bind failure is fatal to the
    /// caller; nothing after it is.
    pub async fn spawn(addr: SocketAddr, dispatcher: CommandDispatcher) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("failed to bind command listener {addr}"))?;
        let addr = socket
            .local_addr()
            .context("failed to resolve command listener address")?;
        let socket = Arc::new(socket);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let task = tokio::spawn({
            let socket = Arc::clone(&socket);
            async move {
                info!(address = %addr, "command server listening");
                let mut buf = vec![0u8; MAX_DATAGRAM];
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => {
                            debug!("command server shutdown signal received");
                            break;
                        }
                        inbound = socket.recv_from(&mut buf) => {
                            let (len, peer) = match inbound {
                                Ok(pair) => pair,
                                Err(err) => {
                                    warn!(error = %err, "datagram receive failed");
                                    continue;
                                }
                            };
                            match dispatcher.handle(&buf[..len]).await {
                                Outcome::Reply(reply) => {
                                    if let Err(err) = socket.send_to(reply.as_bytes(), peer).await {
                                        warn!(peer = %peer, error = %err, "reply send failed");
                                    }
                                }
                                Outcome::Silent => {}
                                Outcome::Terminate => {
                                    debug!(peer = %peer, "terminate token received");
                                }
                            }
                        }
                    }
                }
                info!(address = %addr, "command server stopped");
            }
        });
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// Address actually bound (for `:0` test listeners).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop the listener: signal the task, then unblock any pending receive
    /// with an empty loopback datagram.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let target = SocketAddr::from(([127, 0, 0, 1], self.addr.port()));
        if let Ok(poison) = UdpSocket::bind("127.0.0.1:0").await {
            let _ = poison.send_to(b"", target).await;
        }
        if let Err(err) = self.task.await {
            warn!(error = %err, "command server join error");
        }
    }
}

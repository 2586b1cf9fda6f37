//! ---
//! pwl_section: "03-network-interfaces"
//! pwl_subsection: "module"
//! pwl_type: "source"
//! pwl_scope: "code"
//! pwl_description: "UDP command server and TCP telemetry server."
//! pwl_version: "v0.1.0"
//! pwl_owner: "tbd"
//! ---
//! Connection-oriented telemetry bus channel. Each connection carries a
//! sequence of request/reply exchanges; a terminate token or EOF ends that
//! connection, not the server. Shutdown pokes a blocked accept with a
//! loopback poison connection.

use std::net::{SocketAddr, TcpListener as StdTcpListener};

use anyhow::{Context, Result};
use pwrlab_core::{CommandDispatcher, Outcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MAX_REQUEST: usize = 2048;

/// Handle to the running telemetry listener.
pub struct TelemetryServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TelemetryServer {
    /// Bind the socket and start serving. A bind failure is fatal to the
    /// caller.
    pub async fn spawn(addr: SocketAddr, dispatcher: CommandDispatcher) -> Result<Self> {
        let listener = StdTcpListener::bind(addr)
            .with_context(|| format!("failed to bind telemetry listener {addr}"))?;
        listener
            .set_nonblocking(true)
            .context("failed to configure telemetry listener as non-blocking")?;
        let listener =
            TcpListener::from_std(listener).context("failed to create tokio listener")?;
        let addr = listener
            .local_addr()
            .context("failed to resolve telemetry listener address")?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            info!(address = %addr, "telemetry server listening");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("telemetry server shutdown signal received");
                        break;
                    }
                    inbound = listener.accept() => {
                        let (stream, peer) = match inbound {
                            Ok(pair) => pair,
                            Err(err) => {
                                warn!(error = %err, "telemetry accept failed");
                                continue;
                            }
                        };
                        debug!(peer = %peer, "telemetry connection accepted");
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, dispatcher).await {
                                debug!(peer = %peer, error = %err, "telemetry connection closed");
                            }
                        });
                    }
                }
            }
            info!(address = %addr, "telemetry server stopped");
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

    /// Stop the listener: signal the task, then unblock a pending accept
    /// with a throwaway loopback connection.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let target = SocketAddr::from(([127, 0, 0, 1], self.addr.port()));
        let _ = TcpStream::connect(target).await;
        if let Err(err) = self.task.await {
            warn!(error = %err, "telemetry server join error");
        }
    }
}

/// One request/reply exchange per read until the peer logs out or hangs up.
async fn serve_connection(mut stream: TcpStream, dispatcher: CommandDispatcher) -> Result<()> {
    let mut buf = vec![0u8; MAX_REQUEST];
    loop {
        let len = stream.read(&mut buf).await?;
        if len == 0 {
            return Ok(());
        }
        match dispatcher.handle(&buf[..len]).await {
            Outcome::Reply(reply) => stream.write_all(reply.as_bytes()).await?,
            Outcome::Silent => {}
            Outcome::Terminate => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udp::CommandServer;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use pwrlab_core::{AttackEngine, Plant};
    use pwrlab_device::{DeviceManager, SimulatedBank};
    use pwrlab_state::{ScenarioTable, StateStore};
    use serde_json::Value;
    use tempfile::NamedTempFile;
    use tokio::net::UdpSocket;

    async fn dispatcher() -> CommandDispatcher {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(file, "tag,load,v0,v1,v2,v3,v4,v5,v6,v7,v8,v9").unwrap();
        for tag in 0..2 {
            for load in 0..4 {
                writeln!(
                    file,
                    "{},{},34.2,1.3,34.1,1.2,68.3,2.5,68.1,2.4,33.0,33.1",
                    tag, load
                )
                .unwrap();
            }
        }
        file.flush().unwrap();
        let table = ScenarioTable::from_path(file.path()).expect("table loads");
        let bank = SimulatedBank::new();
        let manager = DeviceManager::connect(
            Arc::new(bank.clone()),
            Box::new(bank.serial_link()),
            10,
            Duration::from_millis(200),
        )
        .await;
        let plant = Plant::new(StateStore::new(table, None), manager, true);
        let engine = AttackEngine::new(Arc::clone(&plant));
        CommandDispatcher::new(plant, engine)
    }

    #[tokio::test]
    async fn udp_round_trip_and_shutdown() {
        let server = CommandServer::spawn("127.0.0.1:0".parse().unwrap(), dispatcher().await)
            .await
            .expect("bind");
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(br#"{"Cmd":"Get","Parm":"Gen"}"#, server.local_addr())
            .await
            .unwrap();
        let mut buf = vec![0u8; 2048];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        let gen: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(gen["Freq"], "50.00");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn tcp_serves_register_string() {
        let server = TelemetryServer::spawn("127.0.0.1:0".parse().unwrap(), dispatcher().await)
            .await
            .expect("bind");
        let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
        stream
            .write_all(br#"{"Cmd":"Get","Parm":"MdBs"}"#)
            .await
            .unwrap();
        let mut buf = vec![0u8; 2048];
        let len = stream.read(&mut buf).await.unwrap();
        let reply: Value = serde_json::from_slice(&buf[..len]).unwrap();
        let body = reply["Param"].as_str().unwrap();
        assert!(body.starts_with("000040010C"));
        // header + 11 registers of 10 chars ("0x" + 8 hex digits)
        assert_eq!(body.len(), 10 + 11 * 10);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_fatal() {
        let first = TelemetryServer::spawn("127.0.0.1:0".parse().unwrap(), dispatcher().await)
            .await
            .expect("bind");
        let err = TelemetryServer::spawn(first.local_addr(), dispatcher().await).await;
        assert!(err.is_err());
        first.shutdown().await;
    }
}

//! Signal emitters: where encoded payloads go.

use crate::error::{Result, TrillcastError};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// What happened to a payload handed to an emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Discarded because the output was busy.
    Dropped,
}

/// Pluggable payload output for a pipeline.
pub trait SignalEmitter: Send + 'static {
    /// Deliver one payload. Must not block.
    fn send(&mut self, payload: &str) -> Result<Delivery>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "emitter"
    }
}

/// Fire-and-forget UDP datagrams to a fixed address.
///
/// The socket is non-blocking: if the kernel buffer is full the datagram is
/// dropped rather than stalling the caller.
pub struct UdpEmitter {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpEmitter {
    /// Resolve `host:port` once and bind an ephemeral local socket.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| TrillcastError::EmitterAddress {
                address: address.clone(),
                message: e.to_string(),
            })?
            .next()
            .ok_or_else(|| TrillcastError::EmitterAddress {
                address: address.clone(),
                message: "no addresses resolved".to_string(),
            })?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).map_err(|e| TrillcastError::EmitterSocket {
            message: format!("bind {}: {}", bind_addr, e),
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TrillcastError::EmitterSocket {
                message: format!("set_nonblocking: {}", e),
            })?;

        info!(addr = %target, "sending datagrams");
        Ok(Self { socket, target })
    }
}

impl SignalEmitter for UdpEmitter {
    fn send(&mut self, payload: &str) -> Result<Delivery> {
        match self.socket.send_to(payload.as_bytes(), self.target) {
            Ok(_) => Ok(Delivery::Sent),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!(addr = %self.target, "socket busy, datagram dropped");
                Ok(Delivery::Dropped)
            }
            Err(e) => Err(TrillcastError::EmitterSocket {
                message: format!("send to {}: {}", self.target, e),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

/// Writes payloads to stdout, one per line, prefixed with a label.
pub struct StdoutEmitter {
    label: &'static str,
}

impl StdoutEmitter {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl SignalEmitter for StdoutEmitter {
    fn send(&mut self, payload: &str) -> Result<Delivery> {
        println!("{} {}", self.label, payload);
        Ok(Delivery::Sent)
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Collects payloads in memory. Clone the handle from [`CollectorEmitter::payloads`]
/// before moving the emitter into a driver.
#[derive(Default)]
pub struct CollectorEmitter {
    collected: Arc<Mutex<Vec<String>>>,
}

impl CollectorEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to everything sent so far.
    pub fn payloads(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.collected)
    }
}

impl SignalEmitter for CollectorEmitter {
    fn send(&mut self, payload: &str) -> Result<Delivery> {
        let mut collected = self
            .collected
            .lock()
            .map_err(|e| TrillcastError::Other(format!("collector lock poisoned: {}", e)))?;
        collected.push(payload.to_string());
        Ok(Delivery::Sent)
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

use std::{
    fmt,
    io::{self, ErrorKind, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use irgate_common::{Escalation, FailureTracker, SendOutcome};

use crate::device::DeviceControl;

const UDP_TIMEOUT: Duration = Duration::from_secs(2);
const TCP_TIMEOUT: Duration = Duration::from_millis(1_500);
const ENOMEM_SIGNATURE: &str = "ENOMEM";

/// Sends panel commands as single datagrams over a reused socket.
///
/// Any failure drops the socket so the next send opens a fresh one. Failures
/// that report memory exhaustion are counted, and reaching the threshold
/// restarts the device.
pub struct UdpSender {
    destination: SocketAddr,
    socket: Option<UdpSocket>,
    failures: FailureTracker,
    device: Arc<dyn DeviceControl>,
    sent: u64,
    failed: u64,
}

impl UdpSender {
    pub fn new(destination: SocketAddr, device: Arc<dyn DeviceControl>) -> Self {
        Self {
            destination,
            socket: None,
            failures: FailureTracker::new(),
            device,
            sent: 0,
            failed: 0,
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn socket_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.count()
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn send<C: fmt::Display>(&mut self, command: C, threshold: u32) -> SendOutcome {
        let command = command.to_string();
        match self.try_send(command.as_bytes()) {
            Ok(()) => {
                info!("sent `{command}` (UDP to {})", self.destination);
                self.sent = self.sent.saturating_add(1);
                self.device.flash_ack();
                SendOutcome::Sent
            }
            Err(err) => self.handle_failure(&command, &err, threshold),
        }
    }

    fn try_send(&mut self, payload: &[u8]) -> io::Result<()> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => open_udp_socket()?,
        };
        let result = socket.send_to(payload, self.destination);
        self.socket = Some(socket);
        result.map(|_| ())
    }

    fn handle_failure(&mut self, command: &str, err: &io::Error, threshold: u32) -> SendOutcome {
        let outcome = classify_error(err);
        warn!(
            "send error for command `{command}`: {err} ({:?})",
            err.kind()
        );
        self.failed = self.failed.saturating_add(1);

        match self.failures.record(outcome, threshold) {
            Escalation::Restart => {
                error!(
                    "{} ENOMEM failures reached threshold {threshold}, restarting",
                    self.failures.count()
                );
                self.device.restart();
            }
            Escalation::Continue(count) if outcome == SendOutcome::ResourceExhausted => {
                warn!("ENOMEM count: {count}/{threshold}");
            }
            Escalation::Continue(_) => {}
        }

        // Dropping the socket closes it and releases its buffers.
        if self.socket.take().is_some() {
            debug!("udp socket discarded");
        }
        outcome
    }
}

/// Sends receiver commands over a fresh connection per command.
pub struct TcpSender {
    destination: SocketAddr,
    device: Arc<dyn DeviceControl>,
    sent: u64,
    failed: u64,
}

impl TcpSender {
    pub fn new(destination: SocketAddr, device: Arc<dyn DeviceControl>) -> Self {
        Self {
            destination,
            device,
            sent: 0,
            failed: 0,
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn send(&mut self, command: &str) -> SendOutcome {
        match self.try_send(command.as_bytes()) {
            Ok(()) => {
                info!("sent `{}` (TCP to {})", command.trim(), self.destination);
                self.sent = self.sent.saturating_add(1);
                self.device.flash_ack();
                SendOutcome::Sent
            }
            Err(err) => {
                warn!("tcp send error to {}: {err}", self.destination);
                self.failed = self.failed.saturating_add(1);
                SendOutcome::TransientFailure
            }
        }
    }

    fn try_send(&self, payload: &[u8]) -> io::Result<()> {
        let mut stream = TcpStream::connect_timeout(&self.destination, TCP_TIMEOUT)?;
        stream.set_write_timeout(Some(TCP_TIMEOUT))?;
        stream.write_all(payload)
    }
}

/// Destinations are fixed for the process lifetime, so name lookup happens
/// once here instead of on every send.
pub fn resolve_endpoint(endpoint: &str) -> anyhow::Result<SocketAddr> {
    endpoint
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {endpoint}"))?
        .next()
        .with_context(|| format!("{endpoint} resolved to no address"))
}

fn open_udp_socket() -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_write_timeout(Some(UDP_TIMEOUT))?;
    socket.set_read_timeout(Some(UDP_TIMEOUT))?;
    Ok(socket)
}

fn classify_error(err: &io::Error) -> SendOutcome {
    if err.kind() == ErrorKind::OutOfMemory || err.to_string().contains(ENOMEM_SIGNATURE) {
        SendOutcome::ResourceExhausted
    } else {
        SendOutcome::TransientFailure
    }
}

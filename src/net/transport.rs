// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Datagram transports for magic packets.

use std::fmt::Display;
use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

/// Sending a datagram failed.
#[derive(Debug)]
pub enum TransportError {
    /// The socket failed.
    Io(std::io::Error),
    /// The socket accepted only part of the datagram.
    Incomplete {
        /// Where the datagram went.
        endpoint: SocketAddr,
        /// How many bytes the socket accepted.
        sent: usize,
        /// The size of the whole datagram.
        expected: usize,
    },
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Io(error) => write!(f, "Failed to send datagram: {error}"),
            TransportError::Incomplete {
                endpoint,
                sent,
                expected,
            } => write!(f, "Sent only {sent} of {expected} bytes to {endpoint}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(error) => Some(error),
            TransportError::Incomplete { .. } => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(value: std::io::Error) -> Self {
        TransportError::Io(value)
    }
}

/// Send single datagrams, blocking until the datagram is handed to the OS.
pub trait Transport {
    /// Send `payload` as a single datagram to `endpoint`.
    fn send_to(&self, endpoint: SocketAddr, payload: &[u8]) -> Result<(), TransportError>;
}

/// Send single datagrams asynchronously.
///
/// Implementations must either send the whole datagram or nothing, also if the
/// returned future gets dropped before completion.
pub trait AsyncTransport {
    /// Send `payload` as a single datagram to `endpoint`.
    fn send_to(
        &self,
        endpoint: SocketAddr,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Send datagrams over UDP.
///
/// Each send opens a new socket with broadcast enabled, and closes it
/// afterwards.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpTransport;

/// The address to bind a socket for sending to `endpoint` to.
fn bind_address(endpoint: SocketAddr) -> SocketAddr {
    match endpoint {
        SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
        SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
    }
}

fn check_sent(endpoint: SocketAddr, sent: usize, expected: usize) -> Result<(), TransportError> {
    if sent == expected {
        Ok(())
    } else {
        Err(TransportError::Incomplete {
            endpoint,
            sent,
            expected,
        })
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, endpoint: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
        let socket = std::net::UdpSocket::bind(bind_address(endpoint))?;
        socket.set_broadcast(true)?;
        log::trace!("Sending {} bytes to {endpoint}", payload.len());
        let sent = socket.send_to(payload, endpoint)?;
        check_sent(endpoint, sent, payload.len())
    }
}

impl AsyncTransport for UdpTransport {
    async fn send_to(&self, endpoint: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
        // The socket lives in this future only, so dropping the future closes
        // the socket.  A UDP send never transmits a partial datagram.
        let socket = tokio::net::UdpSocket::bind(bind_address(endpoint)).await?;
        socket.set_broadcast(true)?;
        log::trace!("Sending {} bytes to {endpoint}", payload.len());
        let sent = socket.send_to(payload, endpoint).await?;
        check_sent(endpoint, sent, payload.len())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
    use std::time::Duration;

    use super::*;

    fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let address = socket.local_addr().unwrap();
        (socket, address)
    }

    #[test]
    fn send_blocking() {
        let (socket, address) = receiver();
        Transport::send_to(&UdpTransport, address, b"hello world").unwrap();
        let mut buffer = [0; 64];
        let (received, _) = socket.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..received], b"hello world");
    }

    #[tokio::test]
    async fn send_async() {
        let (socket, address) = receiver();
        AsyncTransport::send_to(&UdpTransport, address, &[0xff; 102])
            .await
            .unwrap();
        let mut buffer = [0; 256];
        let (received, _) = socket.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..received], &[0xff; 102]);
    }

    #[test]
    fn check_sent_incomplete() {
        let endpoint = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 9);
        assert!(check_sent(endpoint, 102, 102).is_ok());
        let error = check_sent(endpoint, 50, 102).unwrap_err();
        assert_eq!(error.to_string(), "Sent only 50 of 102 bytes to 127.0.0.1:9");
    }
}

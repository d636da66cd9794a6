// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Wake On LAN (magic packet) implementation.
//!
//! A magic packet starts with six `0xFF` bytes, followed by the hardware
//! address of the target repeated fifteen times.  With SecureOn the six bytes
//! of the password follow at the end.

use std::net::SocketAddr;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use macaddr::MacAddr6;

use super::hwaddr::{mac_addr6_from_slice, InvalidAddressLength, HARDWARE_ADDRESS_LENGTH};
use super::secureon::SecureOnPassword;
use super::transport::{AsyncTransport, Transport, TransportError};

const SYNC_STREAM: [u8; HARDWARE_ADDRESS_LENGTH] = [0xff; HARDWARE_ADDRESS_LENGTH];

const MAC_ADDRESS_REPETITIONS: usize = 15;

/// The length of a magic packet without password.
pub const MAGIC_PACKET_LENGTH: usize =
    SYNC_STREAM.len() + MAC_ADDRESS_REPETITIONS * HARDWARE_ADDRESS_LENGTH;

/// The length of a magic packet with a SecureOn password.
pub const SECURE_ON_MAGIC_PACKET_LENGTH: usize = MAGIC_PACKET_LENGTH + HARDWARE_ADDRESS_LENGTH;

/// Fill `buffer` with the magic packet for `mac_address`.
pub fn fill_magic_packet(buffer: &mut [u8; MAGIC_PACKET_LENGTH], mac_address: MacAddr6) {
    let (sync, addresses) = buffer.split_at_mut(SYNC_STREAM.len());
    sync.copy_from_slice(&SYNC_STREAM);
    for chunk in addresses.chunks_exact_mut(HARDWARE_ADDRESS_LENGTH) {
        chunk.copy_from_slice(mac_address.as_bytes());
    }
}

/// Get the magic packet for `mac_address`.
pub fn magic_packet(mac_address: MacAddr6) -> [u8; MAGIC_PACKET_LENGTH] {
    let mut packet = [0; MAGIC_PACKET_LENGTH];
    fill_magic_packet(&mut packet, mac_address);
    packet
}

/// Get the magic packet for `mac_address`, protected with `password`.
pub fn secure_on_magic_packet(
    mac_address: MacAddr6,
    password: &SecureOnPassword,
) -> [u8; SECURE_ON_MAGIC_PACKET_LENGTH] {
    let mut packet = [0; SECURE_ON_MAGIC_PACKET_LENGTH];
    packet[..MAGIC_PACKET_LENGTH].copy_from_slice(&magic_packet(mac_address));
    packet[MAGIC_PACKET_LENGTH..].copy_from_slice(password.as_bytes());
    packet
}

/// A magic packet, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MagicPacket {
    /// A plain magic packet.
    Plain([u8; MAGIC_PACKET_LENGTH]),
    /// A magic packet with a SecureOn password.
    SecureOn([u8; SECURE_ON_MAGIC_PACKET_LENGTH]),
}

impl MagicPacket {
    /// Build the magic packet for `mac_address`, with an optional `password`.
    pub fn new(mac_address: MacAddr6, password: Option<&SecureOnPassword>) -> Self {
        match password {
            None => Self::Plain(magic_packet(mac_address)),
            Some(password) => Self::SecureOn(secure_on_magic_packet(mac_address, password)),
        }
    }

    /// Build the magic packet from raw bytes of the hardware address and password.
    ///
    /// Fail if either has not exactly six bytes.
    pub fn from_slices(
        mac_address: &[u8],
        password: Option<&[u8]>,
    ) -> Result<Self, InvalidAddressLength> {
        let mac_address = mac_addr6_from_slice(mac_address)?;
        let password = password.map(SecureOnPassword::from_bytes).transpose()?;
        Ok(Self::new(mac_address, password.as_ref()))
    }

    /// The packet bytes to send.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MagicPacket::Plain(packet) => packet,
            MagicPacket::SecureOn(packet) => packet,
        }
    }
}

impl AsRef<[u8]> for MagicPacket {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Send a magic packet for `mac_address` to `target`, blocking.
pub fn wake<T: Transport + ?Sized>(
    transport: &T,
    target: SocketAddr,
    mac_address: MacAddr6,
    password: Option<&SecureOnPassword>,
) -> Result<(), TransportError> {
    let packet = MagicPacket::new(mac_address, password);
    log::debug!("Sending magic packet for {mac_address} to {target}");
    transport.send_to(target, packet.as_bytes())
}

/// Send a magic packet for `mac_address` to `target`.
pub async fn wake_async<T: AsyncTransport + ?Sized>(
    transport: &T,
    target: SocketAddr,
    mac_address: MacAddr6,
    password: Option<&SecureOnPassword>,
) -> Result<(), TransportError> {
    let packet = MagicPacket::new(mac_address, password);
    log::debug!("Sending magic packet for {mac_address} to {target}");
    transport.send_to(target, packet.as_bytes()).await
}

/// A device to wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeTarget {
    /// Where to send the magic packet to.
    pub endpoint: SocketAddr,
    /// The hardware address of the device.
    pub mac_address: MacAddr6,
    /// The SecureOn password of the device, if any.
    pub password: Option<SecureOnPassword>,
}

/// Send magic packets to all `targets` at once.
///
/// Return the outcome for every target, in order of completion.
pub async fn wake_all_async<T: AsyncTransport + ?Sized>(
    transport: &T,
    targets: impl IntoIterator<Item = WakeTarget>,
) -> Vec<(WakeTarget, Result<(), TransportError>)> {
    targets
        .into_iter()
        .map(|target| async move {
            let result = wake_async(
                transport,
                target.endpoint,
                target.mac_address,
                target.password.as_ref(),
            )
            .await;
            (target, result)
        })
        .collect::<FuturesUnordered<_>>()
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Mutex;

    use macaddr::MacAddr6;

    use super::*;
    use crate::net::UdpTransport;

    const MAC: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

    #[derive(Default)]
    struct RecordingTransport {
        sent: RefCell<Vec<(SocketAddr, Vec<u8>)>>,
    }

    impl Transport for RecordingTransport {
        fn send_to(&self, endpoint: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
            self.sent.borrow_mut().push((endpoint, payload.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct AsyncRecordingTransport {
        sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    }

    impl AsyncTransport for AsyncRecordingTransport {
        async fn send_to(
            &self,
            endpoint: SocketAddr,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            if endpoint.port() == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::AddrNotAvailable).into());
            }
            self.sent
                .lock()
                .unwrap()
                .push((endpoint, payload.to_vec()));
            Ok(())
        }
    }

    fn expected_packet() -> Vec<u8> {
        let mut packet = vec![0xff; 6];
        for _ in 0..15 {
            packet.extend_from_slice(&MAC);
        }
        packet
    }

    #[test]
    fn magic_packet_layout() {
        let packet = magic_packet(MacAddr6::from(MAC));
        assert_eq!(packet.len(), 96);
        assert_eq!(&packet[0..6], &[0xff; 6]);
        for chunk in packet[6..].chunks(6) {
            assert_eq!(chunk, &MAC);
        }
        assert_eq!(packet.to_vec(), expected_packet());
    }

    #[test]
    fn secure_on_magic_packet_layout() {
        let password = SecureOnPassword::new([0xaa; 6]);
        let packet = secure_on_magic_packet(MacAddr6::from(MAC), &password);
        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..96], &magic_packet(MacAddr6::from(MAC))[..]);
        assert_eq!(&packet[96..], &[0xaa; 6]);
    }

    #[test]
    fn magic_packet_is_deterministic() {
        let mac_address = MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1);
        assert_eq!(
            MagicPacket::new(mac_address, None),
            MagicPacket::new(mac_address, None)
        );
    }

    #[test]
    fn magic_packet_new() {
        let mac_address = MacAddr6::from(MAC);
        let plain = MagicPacket::new(mac_address, None);
        assert_eq!(plain.as_bytes(), expected_packet().as_slice());
        let password = SecureOnPassword::from_text("abc").unwrap();
        let secure_on = MagicPacket::new(mac_address, Some(&password));
        let mut expected = expected_packet();
        expected.extend_from_slice(b"abc\0\0\0");
        assert_eq!(secure_on.as_bytes(), expected.as_slice());
    }

    #[test]
    fn magic_packet_from_slices() {
        let packet = MagicPacket::from_slices(&MAC, None).unwrap();
        assert_eq!(packet.as_bytes(), expected_packet().as_slice());
        let packet = MagicPacket::from_slices(&MAC, Some(&[0xaa; 6][..])).unwrap();
        assert_eq!(packet.as_bytes().len(), 102);

        let error = MagicPacket::from_slices(&MAC[..5], None).unwrap_err();
        assert_eq!(error.subject, "hardware address");
        assert_eq!(error.length, 5);
        let error = MagicPacket::from_slices(&MAC, Some(&[0xaa; 4][..])).unwrap_err();
        assert_eq!(error.subject, "password");
        assert_eq!(error.length, 4);
    }

    #[test]
    fn wake_sends_packet() {
        let transport = RecordingTransport::default();
        let target = SocketAddr::new(Ipv4Addr::BROADCAST.into(), 7);
        wake(&transport, target, MacAddr6::from(MAC), None).unwrap();
        let sent = transport.sent.into_inner();
        assert_eq!(sent, vec![(target, expected_packet())]);
    }

    #[tokio::test]
    async fn wake_async_sends_same_packet_as_wake() {
        let password = SecureOnPassword::new([0xaa; 6]);
        let target = SocketAddr::new(Ipv4Addr::new(192, 168, 1, 255).into(), 9);

        let transport = RecordingTransport::default();
        wake(&transport, target, MacAddr6::from(MAC), Some(&password)).unwrap();
        let async_transport = AsyncRecordingTransport::default();
        wake_async(&async_transport, target, MacAddr6::from(MAC), Some(&password))
            .await
            .unwrap();

        assert_eq!(
            transport.sent.into_inner(),
            async_transport.sent.into_inner().unwrap()
        );
    }

    #[tokio::test]
    async fn wake_all_reports_every_target() {
        let transport = AsyncRecordingTransport::default();
        let targets = [
            WakeTarget {
                endpoint: SocketAddr::new(Ipv4Addr::BROADCAST.into(), 7),
                mac_address: MacAddr6::from(MAC),
                password: None,
            },
            WakeTarget {
                endpoint: SocketAddr::new(Ipv4Addr::BROADCAST.into(), 0),
                mac_address: MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1),
                password: Some(SecureOnPassword::new([0xaa; 6])),
            },
        ];
        let mut results = wake_all_async(&transport, targets).await;
        results.sort_by_key(|(target, _)| target.endpoint.port());
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert_eq!(results[0].0, targets[1]);
        assert!(results[1].1.is_ok());
        assert_eq!(results[1].0, targets[0]);
        assert_eq!(transport.sent.into_inner().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wake_over_udp() {
        let socket = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let target = socket.local_addr().unwrap();
        wake_async(&UdpTransport, target, MacAddr6::from(MAC), None)
            .await
            .unwrap();
        let mut buffer = [0; 256];
        let (received, _) = socket.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..received], expected_packet().as_slice());
    }
}

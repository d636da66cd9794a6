// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Networking.
//!
//! This module provides a Wake-On-Lan implementation with SecureOn passwords,
//! datagram transports to send magic packets, and hardware address resolution
//! through the ARP cache of the operating system.

mod arp;
pub mod arpcache;
mod hwaddr;
mod secureon;
mod transport;
mod wol;

pub use arp::{ArpCacheResolver, ArpResult, ResolutionError, Resolver};
pub use hwaddr::{mac_addr6_from_slice, InvalidAddressLength, HARDWARE_ADDRESS_LENGTH};
pub use secureon::{PasswordParseError, SecureOnPassword};
pub use transport::{AsyncTransport, Transport, TransportError, UdpTransport};
pub use wol::{
    fill_magic_packet, magic_packet, secure_on_magic_packet, wake, wake_all_async, wake_async,
    MagicPacket, WakeTarget, MAGIC_PACKET_LENGTH, SECURE_ON_MAGIC_PACKET_LENGTH,
};

// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Hardware addresses from raw bytes.

use std::fmt::Display;

use macaddr::MacAddr6;

/// The length of a hardware address, and of a SecureOn password.
pub const HARDWARE_ADDRESS_LENGTH: usize = 6;

/// A hardware address or password did not have exactly six bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddressLength {
    /// What we tried to create.
    pub subject: &'static str,
    /// The length we got.
    pub length: usize,
}

impl Display for InvalidAddressLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid {} length {}, expected {HARDWARE_ADDRESS_LENGTH} bytes",
            self.subject, self.length
        )
    }
}

impl std::error::Error for InvalidAddressLength {}

/// Get exactly six bytes out of `bytes`.
pub(super) fn six_bytes(
    subject: &'static str,
    bytes: &[u8],
) -> Result<[u8; HARDWARE_ADDRESS_LENGTH], InvalidAddressLength> {
    bytes.try_into().map_err(|_| InvalidAddressLength {
        subject,
        length: bytes.len(),
    })
}

/// Create a hardware address from a slice of raw `bytes`.
///
/// Fail unless `bytes` has exactly six bytes.
pub fn mac_addr6_from_slice(bytes: &[u8]) -> Result<MacAddr6, InvalidAddressLength> {
    six_bytes("hardware address", bytes).map(MacAddr6::from)
}

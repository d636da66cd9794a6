// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! SecureOn passwords for magic packets.
//!
//! Some network cards only wake up if the magic packet ends with a six byte
//! password.  The password goes over the wire in plain text; it's merely a
//! weak access check.

use std::fmt::Display;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::hwaddr::{six_bytes, InvalidAddressLength, HARDWARE_ADDRESS_LENGTH};

/// A SecureOn password.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecureOnPassword([u8; HARDWARE_ADDRESS_LENGTH]);

impl SecureOnPassword {
    /// Create a password from six raw `bytes`.
    pub const fn new(bytes: [u8; HARDWARE_ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Create a password from raw `bytes`.
    ///
    /// Fail unless `bytes` has exactly six bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InvalidAddressLength> {
        six_bytes("password", bytes).map(Self)
    }

    /// Create a password from `text`.
    ///
    /// Use the UTF-8 bytes of `text`, padded with zero bytes to six bytes.
    /// Fail if `text` has more than six bytes in UTF-8.
    pub fn from_text(text: &str) -> Result<Self, InvalidAddressLength> {
        let bytes = text.as_bytes();
        if HARDWARE_ADDRESS_LENGTH < bytes.len() {
            Err(InvalidAddressLength {
                subject: "password",
                length: bytes.len(),
            })
        } else {
            let mut password = [0; HARDWARE_ADDRESS_LENGTH];
            password[..bytes.len()].copy_from_slice(bytes);
            Ok(Self(password))
        }
    }

    /// The raw password bytes, as appended to magic packets.
    pub fn as_bytes(&self) -> &[u8; HARDWARE_ADDRESS_LENGTH] {
        &self.0
    }
}

impl From<[u8; HARDWARE_ADDRESS_LENGTH]> for SecureOnPassword {
    fn from(value: [u8; HARDWARE_ADDRESS_LENGTH]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for SecureOnPassword {
    type Error = InvalidAddressLength;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(value)
    }
}

impl Display for SecureOnPassword {
    /// Format as upper case hex bytes separated by dashes, e.g. `AA-BB-CC-00-11-22`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}-{b:02X}-{c:02X}-{d:02X}-{e:02X}-{g:02X}")
    }
}

/// Parsing a password from hex bytes failed.
#[derive(Debug, PartialEq, Eq)]
pub enum PasswordParseError {
    /// The password did not have six bytes, but this many.
    InvalidLength(usize),
    /// A byte was no valid hex number.
    InvalidByte(ParseIntError),
}

impl Display for PasswordParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordParseError::InvalidLength(length) => write!(
                f,
                "Expected {HARDWARE_ADDRESS_LENGTH} hex bytes in password, got {length}"
            ),
            PasswordParseError::InvalidByte(parse_int_error) => {
                write!(f, "Invalid hex byte in password: {parse_int_error}")
            }
        }
    }
}

impl std::error::Error for PasswordParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PasswordParseError::InvalidByte(parse_int_error) => Some(parse_int_error),
            PasswordParseError::InvalidLength(_) => None,
        }
    }
}

impl FromStr for SecureOnPassword {
    type Err = PasswordParseError;

    /// Parse six hex bytes separated by `-` or `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.trim_ascii().split(['-', ':']).collect::<Vec<_>>();
        if parts.len() != HARDWARE_ADDRESS_LENGTH {
            return Err(PasswordParseError::InvalidLength(parts.len()));
        }
        let mut password = [0; HARDWARE_ADDRESS_LENGTH];
        for (byte, part) in password.iter_mut().zip(parts) {
            *byte = u8::from_str_radix(part, 16).map_err(PasswordParseError::InvalidByte)?;
        }
        Ok(Self(password))
    }
}

impl Serialize for SecureOnPassword {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SecureOnPassword {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        SecureOnPassword::from_str(&String::deserialize(deserializer)?)
            .map_err(serde::de::Error::custom)
    }
}

// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! IPv4 subnet masks.

use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::net::{AddrParseError, Ipv4Addr};
use std::num::ParseIntError;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The number of bytes in a mask.
const MASK_LENGTH: usize = 4;

/// The largest valid CIDR prefix length.
const MAX_CIDR: u8 = 32;

/// A mask is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidMaskError {
    /// The mask bytes have a one bit after a zero bit.
    NonContiguous([u8; MASK_LENGTH]),
    /// The CIDR prefix length is larger than 32.
    CidrOutOfRange(u8),
    /// A mask was given as a byte slice of the wrong length.
    InvalidLength(usize),
}

impl Display for InvalidMaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidMaskError::NonContiguous([a, b, c, d]) => {
                write!(f, "{a}.{b}.{c}.{d} is not a valid net mask")
            }
            InvalidMaskError::CidrOutOfRange(cidr) => {
                write!(f, "Invalid CIDR length {cidr}, expected at most {MAX_CIDR}")
            }
            InvalidMaskError::InvalidLength(length) => {
                write!(f, "Invalid mask length {length}, expected {MASK_LENGTH} bytes")
            }
        }
    }
}

impl std::error::Error for InvalidMaskError {}

/// Top `cidr` bits set.
///
/// `cidr` must be at most 32.
fn bits_from_cidr(cidr: u8) -> u32 {
    debug_assert!(cidr <= MAX_CIDR);
    // Shifting by 32 overflows, and yields the empty mask.
    u32::MAX.checked_shl(u32::from(MAX_CIDR - cidr)).unwrap_or(0)
}

/// An IPv4 net mask.
///
/// The mask always consists of a contiguous run of one bits from the most
/// significant bit, followed by zero bits only.  All constructors check this,
/// so the CIDR prefix length can always be derived from the mask bytes.
///
/// Masks are plain values; all operations return new masks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetMask([u8; MASK_LENGTH]);

impl NetMask {
    /// The empty net mask, with all bits set to zero.
    pub const EMPTY: NetMask = NetMask([0; MASK_LENGTH]);

    /// Whether `bytes` denote a valid net mask.
    ///
    /// Scanning the bits from left to right no one bit may follow a zero bit.
    pub fn is_valid_mask(bytes: [u8; MASK_LENGTH]) -> bool {
        let bits = u32::from_be_bytes(bytes);
        bits.leading_ones() + bits.trailing_zeros() == u32::from(MAX_CIDR)
    }

    /// Create a net mask from the given mask `bytes`, in network byte order.
    pub fn from_bytes(bytes: [u8; MASK_LENGTH]) -> Result<Self, InvalidMaskError> {
        if Self::is_valid_mask(bytes) {
            Ok(Self(bytes))
        } else {
            Err(InvalidMaskError::NonContiguous(bytes))
        }
    }

    /// Create a net mask with the top `cidr` bits set.
    ///
    /// Fail if `cidr` exceeds 32.
    pub fn from_cidr(cidr: u8) -> Result<Self, InvalidMaskError> {
        if MAX_CIDR < cidr {
            Err(InvalidMaskError::CidrOutOfRange(cidr))
        } else {
            Ok(Self::from_valid_bits(bits_from_cidr(cidr)))
        }
    }

    /// Use the bytes of `address` as net mask.
    pub fn from_address(address: Ipv4Addr) -> Result<Self, InvalidMaskError> {
        Self::from_bytes(address.octets())
    }

    fn from_valid_bits(bits: u32) -> Self {
        let bytes = bits.to_be_bytes();
        debug_assert!(Self::is_valid_mask(bytes));
        Self(bytes)
    }

    fn from_clamped_cidr(cidr: i64) -> Self {
        let cidr = cidr.clamp(0, i64::from(MAX_CIDR));
        Self::from_valid_bits(bits_from_cidr(u8::try_from(cidr).unwrap_or(MAX_CIDR)))
    }

    /// The mask bytes, in network byte order.
    pub fn bytes(&self) -> [u8; MASK_LENGTH] {
        self.0
    }

    /// The mask as 32 bit integer.
    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// The number of bits in a mask.
    pub fn address_length(&self) -> u32 {
        u32::from(MAX_CIDR)
    }

    /// The number of leading one bits, i.e. the CIDR prefix length.
    pub fn cidr(&self) -> u8 {
        // leading_ones of a u32 is at most 32
        self.to_u32().leading_ones() as u8
    }

    /// Extend the CIDR prefix length by `delta` bits.
    ///
    /// The new prefix length is clamped to `0..=32`.  A full mask is returned
    /// unchanged.
    #[must_use]
    pub fn extend(self, delta: i32) -> Self {
        let cidr = self.cidr();
        if MAX_CIDR <= cidr {
            self
        } else {
            Self::from_clamped_cidr(i64::from(cidr) + i64::from(delta))
        }
    }

    /// Shorten the CIDR prefix length by `delta` bits.
    ///
    /// The new prefix length is clamped to `0..=32`.  An empty mask is returned
    /// unchanged.
    #[must_use]
    pub fn abbreviate(self, delta: i32) -> Self {
        let cidr = self.cidr();
        if cidr < 1 {
            self
        } else {
            Self::from_clamped_cidr(i64::from(cidr) - i64::from(delta))
        }
    }

    /// Combine two optional masks with bitwise AND.
    ///
    /// If either mask is missing return the empty mask.
    pub fn bitwise_and(n1: Option<NetMask>, n2: Option<NetMask>) -> NetMask {
        match (n1, n2) {
            (Some(n1), Some(n2)) => n1 & n2,
            _ => Self::EMPTY,
        }
    }

    /// Combine two optional masks with bitwise OR.
    ///
    /// If one mask is missing return the other one; if both are missing return
    /// the empty mask.
    pub fn bitwise_or(n1: Option<NetMask>, n2: Option<NetMask>) -> NetMask {
        match (n1, n2) {
            (Some(n1), Some(n2)) => n1 | n2,
            (Some(mask), None) | (None, Some(mask)) => mask,
            (None, None) => Self::EMPTY,
        }
    }

    /// Get the network address of `address` under `mask`.
    ///
    /// A missing mask or address counts as all zero bytes.
    pub fn network_address(mask: Option<NetMask>, address: Option<Ipv4Addr>) -> Ipv4Addr {
        mask.unwrap_or(Self::EMPTY) & address.unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// Get the broadcast address of the subnet of `address` under this mask.
    pub fn broadcast_address(&self, address: Ipv4Addr) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(address) | !self.to_u32())
    }
}

impl Hash for NetMask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_u32().hash(state);
    }
}

impl BitAnd for NetMask {
    type Output = NetMask;

    fn bitand(self, rhs: NetMask) -> Self::Output {
        // The shorter of two valid masks
        Self::from_valid_bits(self.to_u32() & rhs.to_u32())
    }
}

impl BitOr for NetMask {
    type Output = NetMask;

    fn bitor(self, rhs: NetMask) -> Self::Output {
        // The longer of two valid masks
        Self::from_valid_bits(self.to_u32() | rhs.to_u32())
    }
}

impl BitAnd<Ipv4Addr> for NetMask {
    type Output = Ipv4Addr;

    fn bitand(self, rhs: Ipv4Addr) -> Self::Output {
        Ipv4Addr::from(self.to_u32() & u32::from(rhs))
    }
}

impl BitAnd<NetMask> for Ipv4Addr {
    type Output = Ipv4Addr;

    fn bitand(self, rhs: NetMask) -> Self::Output {
        rhs & self
    }
}

impl TryFrom<[u8; MASK_LENGTH]> for NetMask {
    type Error = InvalidMaskError;

    fn try_from(value: [u8; MASK_LENGTH]) -> Result<Self, Self::Error> {
        Self::from_bytes(value)
    }
}

impl TryFrom<&[u8]> for NetMask {
    type Error = InvalidMaskError;

    /// Create a mask from a byte slice.
    ///
    /// An empty slice gives the empty mask.
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self::EMPTY)
        } else {
            let bytes = <[u8; MASK_LENGTH]>::try_from(value)
                .map_err(|_| InvalidMaskError::InvalidLength(value.len()))?;
            Self::from_bytes(bytes)
        }
    }
}

impl TryFrom<Ipv4Addr> for NetMask {
    type Error = InvalidMaskError;

    fn try_from(value: Ipv4Addr) -> Result<Self, Self::Error> {
        Self::from_address(value)
    }
}

impl From<NetMask> for Ipv4Addr {
    fn from(value: NetMask) -> Self {
        Ipv4Addr::from(value.0)
    }
}

impl From<NetMask> for [u8; MASK_LENGTH] {
    fn from(value: NetMask) -> Self {
        value.0
    }
}

impl Display for NetMask {
    /// Format as dotted decimal, followed by the binary mask.
    ///
    /// E.g. `255.255.255.0 (11111111.11111111.11111111.00000000)`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d} ({a:08b}.{b:08b}.{c:08b}.{d:08b})")
    }
}

/// Parsing a net mask failed.
#[derive(Debug)]
pub enum NetMaskParseError {
    /// Dotted notation did not denote an IPv4 address.
    InvalidAddress(AddrParseError),
    /// The CIDR prefix length was no number.
    InvalidCidr(ParseIntError),
    /// The bytes or the prefix length did not form a valid mask.
    InvalidMask(InvalidMaskError),
}

impl Display for NetMaskParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetMaskParseError::InvalidAddress(addr_parse_error) => {
                write!(f, "Failed to parse net mask address: {addr_parse_error}")
            }
            NetMaskParseError::InvalidCidr(parse_int_error) => {
                write!(f, "Failed to parse CIDR length: {parse_int_error}")
            }
            NetMaskParseError::InvalidMask(invalid_mask_error) => write!(f, "{invalid_mask_error}"),
        }
    }
}

impl std::error::Error for NetMaskParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetMaskParseError::InvalidAddress(addr_parse_error) => Some(addr_parse_error),
            NetMaskParseError::InvalidCidr(parse_int_error) => Some(parse_int_error),
            NetMaskParseError::InvalidMask(invalid_mask_error) => Some(invalid_mask_error),
        }
    }
}

impl From<AddrParseError> for NetMaskParseError {
    fn from(value: AddrParseError) -> Self {
        NetMaskParseError::InvalidAddress(value)
    }
}

impl From<ParseIntError> for NetMaskParseError {
    fn from(value: ParseIntError) -> Self {
        NetMaskParseError::InvalidCidr(value)
    }
}

impl From<InvalidMaskError> for NetMaskParseError {
    fn from(value: InvalidMaskError) -> Self {
        NetMaskParseError::InvalidMask(value)
    }
}

impl FromStr for NetMask {
    type Err = NetMaskParseError;

    /// Parse a net mask.
    ///
    /// Accept dotted decimal notation (`255.255.255.0`), or a CIDR prefix
    /// length with or without leading slash (`/24` or `24`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_ascii();
        let mask = if s.contains('.') {
            Self::from_address(Ipv4Addr::from_str(s)?)?
        } else {
            Self::from_cidr(u8::from_str(s.strip_prefix('/').unwrap_or(s))?)?
        };
        Ok(mask)
    }
}

impl Serialize for NetMask {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&Ipv4Addr::from(*self).to_string())
    }
}

impl<'de> Deserialize<'de> for NetMask {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        NetMask::from_str(&String::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

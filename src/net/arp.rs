// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Resolve IPv4 addresses to hardware addresses.
//!
//! We do not speak ARP ourselves; the operating system does that for us, and
//! we only look at its ARP cache.

use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

use macaddr::MacAddr6;

use super::arpcache::find_arp_cache_entry;
use crate::config;

/// Resolving a hardware address failed.
#[derive(Debug)]
pub enum ResolutionError {
    /// The ARP cache has no entry for the address.
    NotFound(Ipv4Addr),
    /// The ARP cache has an entry for the address, but no hardware address
    /// for it, e.g. because the host did not reply to ARP requests.
    Incomplete(Ipv4Addr),
    /// Accessing the ARP cache or the network failed.
    Io(std::io::Error),
}

impl Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionError::NotFound(address) => {
                write!(f, "No hardware address found for {address}")
            }
            ResolutionError::Incomplete(address) => {
                write!(f, "Hardware address of {address} is not resolved")
            }
            ResolutionError::Io(error) => write!(f, "Failed to resolve hardware address: {error}"),
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolutionError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResolutionError {
    fn from(value: std::io::Error) -> Self {
        ResolutionError::Io(value)
    }
}

/// The outcome of resolving a hardware address.
#[derive(Debug)]
pub enum ArpResult {
    /// The address resolved to this hardware address.
    Resolved(MacAddr6),
    /// Resolving the address failed.
    Failed(ResolutionError),
}

impl ArpResult {
    /// The resolved hardware address, if any.
    pub fn address(&self) -> Option<MacAddr6> {
        match self {
            ArpResult::Resolved(address) => Some(*address),
            ArpResult::Failed(_) => None,
        }
    }

    /// Why resolving failed, if it did.
    pub fn error(&self) -> Option<&ResolutionError> {
        match self {
            ArpResult::Resolved(_) => None,
            ArpResult::Failed(error) => Some(error),
        }
    }

    /// Convert into a plain result.
    pub fn into_result(self) -> Result<MacAddr6, ResolutionError> {
        self.into()
    }
}

impl From<Result<MacAddr6, ResolutionError>> for ArpResult {
    fn from(value: Result<MacAddr6, ResolutionError>) -> Self {
        match value {
            Ok(address) => ArpResult::Resolved(address),
            Err(error) => ArpResult::Failed(error),
        }
    }
}

impl From<ArpResult> for Result<MacAddr6, ResolutionError> {
    fn from(value: ArpResult) -> Self {
        match value {
            ArpResult::Resolved(address) => Ok(address),
            ArpResult::Failed(error) => Err(error),
        }
    }
}

impl Display for ArpResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArpResult::Resolved(address) => write!(f, "address: {address}"),
            ArpResult::Failed(error) => write!(f, "error: {error}"),
        }
    }
}

/// Resolve IPv4 addresses to hardware addresses.
///
/// Implementations do not retry.
pub trait Resolver {
    /// Resolve the hardware address of `address`.
    fn resolve(&self, address: Ipv4Addr) -> ArpResult;
}

/// Resolve addresses from the ARP cache of the Linux kernel.
///
/// If the cache has no entry for an address, send a single empty datagram to
/// the address to make the kernel resolve it, wait a little while, and then
/// look into the cache again.
#[derive(Debug, Clone)]
pub struct ArpCacheResolver {
    cache_path: PathBuf,
    probe_port: u16,
    settle_time: Duration,
}

impl Default for ArpCacheResolver {
    fn default() -> Self {
        Self {
            cache_path: config::ARP_CACHE_PATH.into(),
            probe_port: config::DISCARD_PORT,
            settle_time: config::ARP_SETTLE_TIME,
        }
    }
}

impl ArpCacheResolver {
    /// Read the ARP cache from `cache_path` instead of `/proc/net/arp`.
    #[must_use]
    pub fn with_cache_path(mut self, cache_path: impl Into<PathBuf>) -> Self {
        self.cache_path = cache_path.into();
        self
    }

    /// Send the probe datagram for unknown addresses to `probe_port`.
    #[must_use]
    pub fn with_probe_port(mut self, probe_port: u16) -> Self {
        self.probe_port = probe_port;
        self
    }

    /// Wait for `settle_time` after probing before looking at the cache again.
    #[must_use]
    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    fn lookup(&self, address: Ipv4Addr) -> Result<Option<MacAddr6>, ResolutionError> {
        match find_arp_cache_entry(&self.cache_path, address)? {
            Some(entry) if entry.is_complete() => Ok(Some(entry.hardware_address)),
            Some(entry) => {
                log::trace!(
                    "Ignoring incomplete ARP cache entry for {address} with flags {:?}",
                    entry.flags
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Make the kernel send an ARP request for `address`.
    fn probe(&self, address: Ipv4Addr) -> std::io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.send_to(&[], SocketAddr::new(address.into(), self.probe_port))?;
        Ok(())
    }

    fn resolve_address(&self, address: Ipv4Addr) -> Result<MacAddr6, ResolutionError> {
        if let Some(hardware_address) = self.lookup(address)? {
            return Ok(hardware_address);
        }
        log::debug!("{address} not in ARP cache, probing");
        self.probe(address)?;
        std::thread::sleep(self.settle_time);
        match find_arp_cache_entry(&self.cache_path, address)? {
            Some(entry) if entry.is_complete() => Ok(entry.hardware_address),
            Some(_) => Err(ResolutionError::Incomplete(address)),
            None => Err(ResolutionError::NotFound(address)),
        }
    }
}

impl Resolver for ArpCacheResolver {
    fn resolve(&self, address: Ipv4Addr) -> ArpResult {
        let result = self
            .resolve_address(address)
            .inspect(|hardware_address| {
                log::debug!("Resolved {address} to {hardware_address}");
            })
            .inspect_err(|error| {
                log::debug!("Failed to resolve {address}: {error}");
            });
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::path::PathBuf;
    use std::time::Duration;

    use macaddr::MacAddr6;

    use super::*;

    const ARP_CACHE: &str = "IP address       HW type     Flags       HW address            Mask     Device
127.0.0.2        0x1         0x2         b6:a3:b0:48:80:f1     *        lo
127.0.0.3        0x1         0x0         00:00:00:00:00:00     *        lo
";

    fn write_cache_with(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "lanwake-test-arp-{name}-{}",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn write_cache(name: &str) -> PathBuf {
        write_cache_with(name, ARP_CACHE)
    }

    fn resolver(path: &PathBuf) -> ArpCacheResolver {
        ArpCacheResolver::default()
            .with_cache_path(path)
            .with_settle_time(Duration::ZERO)
    }

    #[test]
    fn resolve_cached_address() {
        let path = write_cache("cached");
        let result = resolver(&path).resolve(Ipv4Addr::new(127, 0, 0, 2));
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            result.address(),
            Some(MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1))
        );
        assert!(result.error().is_none());
        assert_eq!(
            result.to_string(),
            format!("address: {}", MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1))
        );
    }

    #[test]
    fn resolve_incomplete_address() {
        let path = write_cache("incomplete");
        let result = resolver(&path).resolve(Ipv4Addr::new(127, 0, 0, 3));
        std::fs::remove_file(&path).unwrap();
        assert!(result.address().is_none());
        assert!(matches!(
            result.error(),
            Some(ResolutionError::Incomplete(address)) if *address == Ipv4Addr::new(127, 0, 0, 3)
        ));
    }

    #[test]
    fn resolve_unknown_address() {
        let path = write_cache("unknown");
        let result = resolver(&path).resolve(Ipv4Addr::new(127, 0, 0, 4));
        std::fs::remove_file(&path).unwrap();
        let error = result.into_result().unwrap_err();
        assert!(matches!(error, ResolutionError::NotFound(_)));
        assert_eq!(error.to_string(), "No hardware address found for 127.0.0.4");
    }

    #[test]
    fn resolve_past_non_ethernet_entries() {
        let path = write_cache_with(
            "infiniband",
            "IP address       HW type     Flags       HW address            Mask     Device
10.1.0.5         0x20        0x2         80:00:02:08:fe:80:00:00:00:00:00:00:00:02:c9:03:00:aa:bb:cc     *        ib0
127.0.0.2        0x1         0x2         b6:a3:b0:48:80:f1     *        lo
",
        );
        let result = resolver(&path).resolve(Ipv4Addr::new(127, 0, 0, 2));
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            result.address(),
            Some(MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1))
        );
    }

    #[test]
    fn resolve_complete_entry_of_multi_homed_address() {
        let path = write_cache_with(
            "multi-homed",
            "IP address       HW type     Flags       HW address            Mask     Device
127.0.0.2        0x1         0x0         00:00:00:00:00:00     *        eth0
127.0.0.2        0x1         0x2         b6:a3:b0:48:80:f1     *        lo
",
        );
        let result = resolver(&path).resolve(Ipv4Addr::new(127, 0, 0, 2));
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            result.address(),
            Some(MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1))
        );
    }

    #[test]
    fn resolve_without_cache() {
        let result = ArpCacheResolver::default()
            .with_cache_path("/this/path/does/not/exist")
            .resolve(Ipv4Addr::new(127, 0, 0, 2));
        assert!(matches!(result, ArpResult::Failed(ResolutionError::Io(_))));
        assert!(result.to_string().starts_with("error: "));
    }

    #[test]
    fn arp_result_from_result() {
        let address = MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1);
        let result = ArpResult::from(Ok::<_, ResolutionError>(address));
        assert_eq!(result.address(), Some(address));
        let result = ArpResult::from(Err::<MacAddr6, _>(ResolutionError::NotFound(
            Ipv4Addr::new(10, 0, 0, 1),
        )));
        assert!(result.address().is_none());
        assert!(result.error().is_some());
    }
}

// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::Display;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use futures_util::{select_biased, FutureExt};
use macaddr::MacAddr6;

use crate::config;
use crate::net::{wake_async, AsyncTransport, SecureOnPassword, TransportError, WakeTarget};
use crate::storage::StoredDevice;
use crate::topology::NetMask;

/// Waking a device failed.
#[derive(Debug)]
pub enum WakeError {
    /// Looking up the host name of the device failed.
    Lookup { host: String, source: std::io::Error },
    /// The host name of the device has no IPv4 address.
    NoAddress(String),
    /// Sending the magic packet failed.
    Transport(TransportError),
    /// The magic packet was not sent in time.
    TimedOut(Duration),
}

impl Display for WakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WakeError::Lookup { host, source } => {
                write!(f, "Failed to look up {host}: {source}")
            }
            WakeError::NoAddress(host) => write!(f, "No IPv4 address found for {host}"),
            WakeError::Transport(error) => write!(f, "{error}"),
            WakeError::TimedOut(timeout) => {
                write!(f, "Failed to send magic packet within {timeout:#?}")
            }
        }
    }
}

impl std::error::Error for WakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WakeError::Lookup { source, .. } => Some(source),
            WakeError::Transport(error) => Some(error),
            WakeError::NoAddress(_) | WakeError::TimedOut(_) => None,
        }
    }
}

impl From<TransportError> for WakeError {
    fn from(value: TransportError) -> Self {
        WakeError::Transport(value)
    }
}

/// A device in the device book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// The human readable label.
    pub label: String,
    /// The hardware address to wake.
    pub mac_address: MacAddr6,
    /// The IPv4 address or host name to send magic packets to.
    ///
    /// If `None` send magic packets to the limited broadcast address.
    pub host: Option<String>,
    /// The UDP port to send magic packets to.
    pub port: u16,
    /// The SecureOn password of the device.
    pub password: Option<SecureOnPassword>,
    /// The netmask of the network of `host`.
    ///
    /// If set, send magic packets to the broadcast address of the network
    /// of `host` instead of `host` itself.
    pub netmask: Option<NetMask>,
}

impl Device {
    /// Create a device which receives magic packets by broadcast on the default port.
    pub fn new(label: impl Into<String>, mac_address: MacAddr6) -> Self {
        Self {
            label: label.into(),
            mac_address,
            host: None,
            port: config::DEFAULT_WOL_PORT,
            password: None,
            netmask: None,
        }
    }

    async fn host_address(&self) -> Result<Ipv4Addr, WakeError> {
        let Some(host) = self.host.as_deref() else {
            return Ok(Ipv4Addr::BROADCAST);
        };
        if let Ok(address) = host.parse::<Ipv4Addr>() {
            return Ok(address);
        }
        log::debug!("Looking up {host}");
        tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|source| WakeError::Lookup {
                host: host.to_owned(),
                source,
            })?
            .find_map(|address| match address {
                SocketAddr::V4(address) => Some(*address.ip()),
                SocketAddr::V6(_) => None,
            })
            .ok_or_else(|| WakeError::NoAddress(host.to_owned()))
    }

    /// Get the endpoint to send magic packets for this device to.
    pub async fn endpoint(&self) -> Result<SocketAddr, WakeError> {
        let address = self.host_address().await?;
        let address = self
            .netmask
            .map_or(address, |mask| mask.broadcast_address(address));
        Ok(SocketAddrV4::new(address, self.port).into())
    }

    /// Get the target to wake this device.
    pub async fn wake_target(&self) -> Result<WakeTarget, WakeError> {
        Ok(WakeTarget {
            endpoint: self.endpoint().await?,
            mac_address: self.mac_address,
            password: self.password,
        })
    }

    /// Send the magic packet to this device.
    pub async fn wol<T: AsyncTransport + ?Sized>(&self, transport: &T) -> Result<(), WakeError> {
        log::info!(
            "Sending magic packet for mac address {} of device {}",
            self.mac_address,
            self.label
        );
        let send = async {
            let endpoint = self.endpoint().await?;
            wake_async(transport, endpoint, self.mac_address, self.password.as_ref()).await?;
            Ok::<_, WakeError>(endpoint)
        };
        let wol_timeout = config::WOL_TIMEOUT;
        let result = select_biased! {
            result = send.fuse() => result,
            _ = tokio::time::sleep(wol_timeout).fuse() => Err(WakeError::TimedOut(wol_timeout)),
        };
        result
            .inspect(|endpoint| {
                log::info!(
                    "Sent magic packet to {} of device {} via {endpoint}",
                    self.mac_address,
                    self.label
                );
            })
            .inspect_err(|error| {
                log::warn!(
                    "Failed to send magic packet to {} of device {}: {error}",
                    self.mac_address,
                    self.label
                );
            })
            .map(|_| ())
    }
}

impl From<StoredDevice> for Device {
    fn from(value: StoredDevice) -> Self {
        Self {
            label: value.label,
            mac_address: value.mac_address,
            host: value.host,
            port: value.port.unwrap_or(config::DEFAULT_WOL_PORT),
            password: value.password,
            netmask: value.netmask,
        }
    }
}

impl From<&Device> for StoredDevice {
    fn from(device: &Device) -> Self {
        StoredDevice {
            label: device.label.clone(),
            mac_address: device.mac_address,
            host: device.host.clone(),
            port: Some(device.port),
            password: device.password,
            netmask: device.netmask,
        }
    }
}

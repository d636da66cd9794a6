// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use macaddr::MacAddr6;

use lanwake::config;
use lanwake::model::Device;
use lanwake::net::arpcache::read_arp_cache_from_path;
use lanwake::net::{
    wake_all_async, ArpCacheResolver, ArpResult, Resolver, SecureOnPassword, UdpTransport,
};
use lanwake::storage::{read_devices, write_devices, StoredDevice};
use lanwake::topology::NetMask;

fn parse_mac_address(s: &str) -> Result<MacAddr6, String> {
    s.parse::<MacAddr6>()
        .map_err(|error| format!("Invalid hardware address {s}: {error}"))
}

fn parse_password_text(s: &str) -> Result<SecureOnPassword, String> {
    SecureOnPassword::from_text(s).map_err(|error| error.to_string())
}

/// Wake devices in your network
#[derive(Parser, Debug)]
#[command(name = "lanwake", version, about, long_about = None)]
pub struct Cli {
    /// The file to store devices in
    #[arg(long, global = true, value_name = "FILE")]
    pub devices_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// SecureOn password as six hex bytes, e.g. AA-BB-CC-DD-EE-FF
    #[arg(long, value_name = "HEX", conflicts_with = "password_text")]
    pub password: Option<SecureOnPassword>,

    /// SecureOn password as text of at most six bytes
    #[arg(long, value_name = "TEXT", value_parser = parse_password_text)]
    pub password_text: Option<SecureOnPassword>,
}

impl PasswordArgs {
    fn password(&self) -> Option<SecureOnPassword> {
        self.password.or(self.password_text)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a magic packet to a hardware address
    Wake {
        /// The hardware address to wake
        #[arg(value_parser = parse_mac_address)]
        mac_address: MacAddr6,

        /// The IPv4 address to send the magic packet to
        #[arg(short, long, default_value_t = Ipv4Addr::BROADCAST)]
        target: Ipv4Addr,

        /// The UDP port to send the magic packet to
        #[arg(short, long, default_value_t = config::DEFAULT_WOL_PORT)]
        port: u16,

        /// Send to the broadcast address of the network of the target
        #[arg(short, long, value_name = "MASK")]
        netmask: Option<NetMask>,

        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Wake a device from the device book
    Device {
        /// The label of the device
        label: String,
    },

    /// List all devices in the device book
    Devices {
        /// Wake all devices at once
        #[arg(long)]
        wake: bool,
    },

    /// Add a device to the device book
    Add {
        /// The label of the device
        label: String,

        /// The hardware address of the device
        #[arg(value_parser = parse_mac_address)]
        mac_address: MacAddr6,

        /// The IPv4 address or host name to send magic packets to
        #[arg(long)]
        host: Option<String>,

        /// The UDP port to send magic packets to
        #[arg(short, long, default_value_t = config::DEFAULT_WOL_PORT)]
        port: u16,

        /// The netmask of the network of the host
        #[arg(short, long, value_name = "MASK")]
        netmask: Option<NetMask>,

        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Look up hardware addresses in the ARP cache
    Arp {
        /// The address to resolve; list the whole cache if omitted
        address: Option<Ipv4Addr>,
    },

    /// Inspect a subnet mask
    Mask {
        /// The mask, as 255.255.255.0, /24 or 24
        mask: NetMask,

        /// Show network and broadcast address of this address
        #[arg(short, long)]
        address: Option<Ipv4Addr>,

        /// Extend the mask by this many bits
        #[arg(long, value_name = "BITS", allow_negative_numbers = true)]
        extend: Option<i32>,

        /// Abbreviate the mask by this many bits
        #[arg(long, value_name = "BITS", allow_negative_numbers = true)]
        abbreviate: Option<i32>,
    },
}

async fn turn_on_device(device: &Device) -> ExitCode {
    match device.wol(&UdpTransport).await {
        Ok(()) => {
            println!(
                "Sent magic packet to mac address {} of device {}",
                device.mac_address, device.label
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Failed to turn on device {}: {error}", device.label);
            ExitCode::FAILURE
        }
    }
}

fn load_devices(devices_file: &Path) -> Result<Vec<Device>, ExitCode> {
    read_devices(devices_file)
        .map(|devices| devices.into_iter().map(Device::from).collect())
        .map_err(|error| {
            eprintln!(
                "Failed to read devices from {}: {error}",
                devices_file.display()
            );
            ExitCode::FAILURE
        })
}

async fn turn_on_device_by_label(devices_file: &Path, label: &str) -> ExitCode {
    log::debug!("Turning on device {label}");
    let devices = match load_devices(devices_file) {
        Ok(devices) => devices,
        Err(code) => return code,
    };
    match devices.iter().find(|d| d.label == label) {
        Some(device) => turn_on_device(device).await,
        None => {
            eprintln!("No device found for label {label}");
            ExitCode::FAILURE
        }
    }
}

async fn turn_on_all_devices(devices: &[Device]) -> ExitCode {
    let mut code = ExitCode::SUCCESS;
    let mut targets = Vec::with_capacity(devices.len());
    for device in devices {
        match device.wake_target().await {
            Ok(target) => targets.push(target),
            Err(error) => {
                eprintln!("Failed to turn on device {}: {error}", device.label);
                code = ExitCode::FAILURE;
            }
        }
    }
    for (target, result) in wake_all_async(&UdpTransport, targets).await {
        match result {
            Ok(()) => println!(
                "Sent magic packet to mac address {} via {}",
                target.mac_address, target.endpoint
            ),
            Err(error) => {
                eprintln!(
                    "Failed to send magic packet to mac address {}: {error}",
                    target.mac_address
                );
                code = ExitCode::FAILURE;
            }
        }
    }
    code
}

async fn devices(devices_file: &Path, wake: bool) -> ExitCode {
    let devices = match load_devices(devices_file) {
        Ok(devices) => devices,
        Err(code) => return code,
    };
    if wake {
        turn_on_all_devices(&devices).await
    } else {
        for device in &devices {
            println!(
                "{}\t{}\t{}:{}",
                device.label,
                device.mac_address,
                device.host.as_deref().unwrap_or("*"),
                device.port
            );
        }
        ExitCode::SUCCESS
    }
}

fn add_device(devices_file: &Path, device: Device) -> ExitCode {
    let mut devices = match read_devices(devices_file) {
        Ok(devices) => devices,
        Err(error) => {
            eprintln!(
                "Failed to read devices from {}: {error}",
                devices_file.display()
            );
            return ExitCode::FAILURE;
        }
    };
    let stored = StoredDevice::from(&device);
    match devices.iter_mut().find(|d| d.label == device.label) {
        Some(existing) => *existing = stored,
        None => devices.push(stored),
    }
    match write_devices(devices_file, &devices) {
        Ok(()) => {
            println!("Saved device {}", device.label);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!(
                "Failed to save devices to {}: {error}",
                devices_file.display()
            );
            ExitCode::FAILURE
        }
    }
}

/// Resolve `address` with `resolver` on the blocking thread pool.
///
/// Resolvers block while waiting for the kernel to resolve an address.
async fn resolve_off_runtime<R>(resolver: R, address: Ipv4Addr) -> ArpResult
where
    R: Resolver + Send + 'static,
{
    tokio::task::spawn_blocking(move || resolver.resolve(address))
        .await
        .unwrap_or_else(|error| ArpResult::Failed(std::io::Error::other(error).into()))
}

async fn arp(address: Option<Ipv4Addr>) -> ExitCode {
    match address {
        Some(address) => {
            let result = resolve_off_runtime(ArpCacheResolver::default(), address).await;
            println!("{address}: {result}");
            match result {
                ArpResult::Resolved(_) => ExitCode::SUCCESS,
                ArpResult::Failed(_) => ExitCode::FAILURE,
            }
        }
        None => match read_arp_cache_from_path(config::ARP_CACHE_PATH) {
            Ok(entries) => {
                let mut code = ExitCode::SUCCESS;
                for entry in entries {
                    match entry {
                        Ok(entry) if entry.is_complete() => println!(
                            "{}\t{}\t{}",
                            entry.ip_address, entry.hardware_address, entry.device
                        ),
                        Ok(entry) => log::debug!("Skipping incomplete entry {entry:?}"),
                        Err(error) => {
                            eprintln!("Invalid ARP cache entry: {error}");
                            code = ExitCode::FAILURE;
                        }
                    }
                }
                code
            }
            Err(error) => {
                eprintln!("Failed to read {}: {error}", config::ARP_CACHE_PATH);
                ExitCode::FAILURE
            }
        },
    }
}

fn mask(
    mask: NetMask,
    address: Option<Ipv4Addr>,
    extend: Option<i32>,
    abbreviate: Option<i32>,
) -> ExitCode {
    let mask = extend.map_or(mask, |bits| mask.extend(bits));
    let mask = abbreviate.map_or(mask, |bits| mask.abbreviate(bits));
    println!("{mask}");
    println!("/{}", mask.cidr());
    if let Some(address) = address {
        println!("network:   {}", mask & address);
        println!("broadcast: {}", mask.broadcast_address(address));
    }
    ExitCode::SUCCESS
}

impl Cli {
    pub async fn run(self) -> ExitCode {
        let devices_file = self.devices_file.unwrap_or_else(config::devices_file);
        match self.command {
            Command::Wake {
                mac_address,
                target,
                port,
                netmask,
                password,
            } => {
                let device = Device {
                    host: Some(target.to_string()),
                    port,
                    password: password.password(),
                    netmask,
                    ..Device::new(mac_address.to_string(), mac_address)
                };
                turn_on_device(&device).await
            }
            Command::Device { label } => turn_on_device_by_label(&devices_file, &label).await,
            Command::Devices { wake } => devices(&devices_file, wake).await,
            Command::Add {
                label,
                mac_address,
                host,
                port,
                netmask,
                password,
            } => {
                let device = Device {
                    host,
                    port,
                    password: password.password(),
                    netmask,
                    ..Device::new(label, mac_address)
                };
                add_device(&devices_file, device)
            }
            Command::Arp { address } => arp(address).await,
            Command::Mask {
                mask: netmask,
                address,
                extend,
                abbreviate,
            } => mask(netmask, address, extend, abbreviate),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;

    use clap::{CommandFactory, Parser};

    use super::*;

    struct ThreadResolver(Arc<Mutex<Option<ThreadId>>>);

    impl Resolver for ThreadResolver {
        fn resolve(&self, _address: Ipv4Addr) -> ArpResult {
            *self.0.lock().unwrap() = Some(std::thread::current().id());
            ArpResult::Resolved(MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1))
        }
    }

    #[tokio::test]
    async fn resolve_on_blocking_thread() {
        let resolved_on = Arc::new(Mutex::new(None));
        let resolver = ThreadResolver(resolved_on.clone());
        let result = resolve_off_runtime(resolver, Ipv4Addr::LOCALHOST).await;
        assert_eq!(
            result.address(),
            Some(MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1))
        );
        let resolved_on = resolved_on.lock().unwrap().unwrap();
        assert_ne!(resolved_on, std::thread::current().id());
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_wake() {
        let cli = Cli::parse_from([
            "lanwake",
            "wake",
            "26:ce:55:a5:c2:33",
            "--target",
            "192.168.1.17",
            "--netmask",
            "/24",
            "--password-text",
            "abc",
        ]);
        match cli.command {
            Command::Wake {
                mac_address,
                target,
                port,
                netmask,
                password,
            } => {
                assert_eq!(mac_address, MacAddr6::new(0x26, 0xce, 0x55, 0xa5, 0xc2, 0x33));
                assert_eq!(target, Ipv4Addr::new(192, 168, 1, 17));
                assert_eq!(port, config::DEFAULT_WOL_PORT);
                assert_eq!(netmask, Some(NetMask::from_cidr(24).unwrap()));
                assert_eq!(
                    password.password(),
                    Some(SecureOnPassword::new([b'a', b'b', b'c', 0, 0, 0]))
                );
            }
            other => panic!("Unexpected command {other:?}"),
        }
    }

    #[test]
    fn reject_both_passwords() {
        let result = Cli::try_parse_from([
            "lanwake",
            "wake",
            "26:ce:55:a5:c2:33",
            "--password",
            "AA-BB-CC-DD-EE-FF",
            "--password-text",
            "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn reject_invalid_mac_address() {
        assert!(Cli::try_parse_from(["lanwake", "wake", "26:ce:55"]).is_err());
    }

    #[test]
    fn parse_mask_with_negative_extend() {
        let cli = Cli::parse_from(["lanwake", "mask", "255.255.0.0", "--extend", "-4"]);
        match cli.command {
            Command::Mask { mask, extend, .. } => {
                assert_eq!(mask, NetMask::from_cidr(16).unwrap());
                assert_eq!(extend, Some(-4));
            }
            other => panic!("Unexpected command {other:?}"),
        }
    }
}

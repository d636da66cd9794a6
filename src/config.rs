// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// The environment variable to configure logging.
pub const LOG_ENV_VAR: &str = "LANWAKE_LOG";

/// The environment variable to override the path to the device file.
pub const DEVICES_ENV_VAR: &str = "LANWAKE_DEVICES";

/// The default port to send magic packets to.
pub const DEFAULT_WOL_PORT: u16 = 7;

/// The UDP discard port.
pub const DISCARD_PORT: u16 = 9;

/// The ARP cache of the Linux kernel.
pub const ARP_CACHE_PATH: &str = "/proc/net/arp";

/// How long to wait for the kernel to resolve an unknown address.
pub const ARP_SETTLE_TIME: Duration = Duration::from_millis(250);

/// How long to wait for a magic packet to be sent.
pub const WOL_TIMEOUT: Duration = Duration::from_secs(5);

fn devices_file_from(
    devices: Option<OsString>,
    xdg_data_home: Option<OsString>,
    home: Option<OsString>,
) -> PathBuf {
    if let Some(file) = devices {
        file.into()
    } else {
        let data_home = xdg_data_home
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| home.map(|home| PathBuf::from(home).join(".local").join("share")))
            .unwrap_or_default();
        data_home.join("lanwake").join("devices.json")
    }
}

/// Get the file to store devices in.
///
/// Use `$LANWAKE_DEVICES` if set, and otherwise `lanwake/devices.json` in the
/// XDG data directory.
pub fn devices_file() -> PathBuf {
    devices_file_from(
        std::env::var_os(DEVICES_ENV_VAR),
        std::env::var_os("XDG_DATA_HOME"),
        std::env::var_os("HOME"),
    )
}

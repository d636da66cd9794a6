// Copyright Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Store devices in a JSON file.

use std::fs::File;
use std::io::{ErrorKind, Result};
use std::path::Path;

use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};

use crate::net::SecureOnPassword;
use crate::topology::NetMask;

/// A stored device.
///
/// Like [`crate::model::Device`], but for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDevice {
    pub label: String,
    #[serde(with = "mac_addr6_as_string")]
    pub mac_address: MacAddr6,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<SecureOnPassword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<NetMask>,
}

mod mac_addr6_as_string {
    use std::str::FromStr;

    use macaddr::MacAddr6;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(addr: &MacAddr6, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<MacAddr6, D::Error>
    where
        D: Deserializer<'de>,
    {
        MacAddr6::from_str(&String::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

/// Read devices from `source`.
///
/// Return an empty list if `source` does not exist.
pub fn read_devices(source: &Path) -> Result<Vec<StoredDevice>> {
    match File::open(source) {
        Ok(file) => serde_json::from_reader(file)
            .map_err(|err| std::io::Error::new(ErrorKind::InvalidData, err)),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            log::debug!("No devices at {}", source.display());
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

/// Write `devices` to `target`, creating parent directories as needed.
pub fn write_devices(target: &Path, devices: &[StoredDevice]) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    File::create(target).and_then(|sink| {
        serde_json::to_writer_pretty(sink, devices)
            .map_err(|err| std::io::Error::new(ErrorKind::InvalidData, err))
    })?;
    log::info!("Saved devices to {}", target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use macaddr::MacAddr6;

    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("lanwake-test-storage-{}", std::process::id()))
            .join(name)
    }

    fn devices() -> Vec<StoredDevice> {
        vec![
            StoredDevice {
                label: "NAS".into(),
                mac_address: MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1),
                host: Some("192.168.1.20".into()),
                port: Some(9),
                password: Some(SecureOnPassword::from_text("nas").unwrap()),
                netmask: Some(NetMask::from_cidr(24).unwrap()),
            },
            StoredDevice {
                label: "Desktop".into(),
                mac_address: MacAddr6::new(0x01, 0x02, 0x03, 0x04, 0x05, 0x06),
                host: None,
                port: None,
                password: None,
                netmask: None,
            },
        ]
    }

    #[test]
    fn write_and_read_devices() {
        let file = temp_file("roundtrip/devices.json");
        write_devices(&file, &devices()).unwrap();
        let read = read_devices(&file).unwrap();
        std::fs::remove_dir_all(file.parent().unwrap()).unwrap();
        assert_eq!(read, devices());
    }

    #[test]
    fn read_missing_devices() {
        let file = temp_file("missing/devices.json");
        assert!(read_devices(&file).unwrap().is_empty());
    }

    #[test]
    fn read_invalid_devices() {
        let file = temp_file("invalid-devices.json");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, r#"[{"label": "NAS", "mac_address": "not a mac"}]"#).unwrap();
        let error = read_devices(&file).unwrap_err();
        std::fs::remove_file(&file).unwrap();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn deserialize_minimal_device() {
        let device: StoredDevice =
            serde_json::from_str(r#"{"label": "NAS", "mac_address": "b6:a3:b0:48:80:f1"}"#)
                .unwrap();
        assert_eq!(device.label, "NAS");
        assert_eq!(
            device.mac_address,
            MacAddr6::new(0xb6, 0xa3, 0xb0, 0x48, 0x80, 0xf1)
        );
        assert!(device.host.is_none());
        assert!(device.password.is_none());
    }

    #[test]
    fn serialize_skips_missing_fields() {
        let json = serde_json::to_value(&devices()[1]).unwrap();
        let mac_address = MacAddr6::new(0x01, 0x02, 0x03, 0x04, 0x05, 0x06).to_string();
        assert_eq!(
            json,
            serde_json::json!({"label": "Desktop", "mac_address": mac_address})
        );
    }
}

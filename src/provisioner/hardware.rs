// Copyright 2025 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hardware details and state of a host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::baremetal::{DiskInfo, IntrospectionData, NetworkInterface, PowerState};

/// Current hardware state of a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareState {
    /// Whether the host is powered on, `None` if unknown.
    pub powered_on: Option<bool>,
}

impl From<Option<PowerState>> for HardwareState {
    fn from(value: Option<PowerState>) -> HardwareState {
        let powered_on = match value {
            Some(PowerState::On) => Some(true),
            Some(PowerState::Off) => Some(false),
            other => {
                debug!("Unknown power state {:?}", other);
                None
            }
        };
        HardwareState { powered_on }
    }
}

/// Vendor of the system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HardwareSystemVendor {
    /// Manufacturer.
    pub manufacturer: String,
    /// Product name.
    pub product_name: String,
    /// Serial number.
    pub serial_number: String,
}

/// CPU details.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Cpu {
    /// Architecture.
    pub arch: String,
    /// Model.
    pub model: String,
    /// Clock speed in MHz.
    pub clock_megahertz: f64,
    /// Sorted CPU flags.
    pub flags: Vec<String>,
    /// Number of logical CPUs.
    pub count: u32,
}

/// Type of a storage device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum StorageType {
    /// Rotational disk.
    #[serde(rename = "HDD")]
    Hdd,
    /// Solid state disk.
    #[serde(rename = "SSD")]
    Ssd,
    /// NVMe device.
    #[serde(rename = "NVME")]
    Nvme,
}

/// A storage device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Storage {
    /// Device name.
    pub name: String,
    /// Stable path to the device.
    pub alternate_names: Vec<String>,
    /// Whether the device is rotational.
    pub rotational: bool,
    /// Type of the device.
    pub storage_type: StorageType,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Vendor.
    pub vendor: String,
    /// Model.
    pub model: String,
    /// Serial number.
    pub serial_number: String,
    /// World wide name.
    pub wwn: String,
    /// Vendor extension of the world wide name.
    pub wwn_vendor_extension: String,
    /// World wide name with the vendor extension.
    pub wwn_with_extension: String,
    /// SCSI address.
    pub hctl: String,
}

/// A network interface.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Nic {
    /// Interface name.
    pub name: String,
    /// Vendor and product IDs.
    pub model: String,
    /// MAC address.
    pub mac: String,
    /// IP address.
    pub ip: String,
    /// Link speed in Gbps.
    pub speed_gbps: u64,
    /// Whether the interface was used for network boot.
    pub pxe: bool,
}

/// Hardware details collected by inspection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HardwareDetails {
    /// System vendor.
    pub system_vendor: HardwareSystemVendor,
    /// Memory in MiB.
    pub ram_mebibytes: u64,
    /// Network interfaces sorted by name.
    pub nics: Vec<Nic>,
    /// Storage devices sorted by name.
    pub storage: Vec<Storage>,
    /// CPU details.
    pub cpu: Cpu,
    /// Host name.
    pub hostname: String,
}

fn clock_speed(frequency: &Value) -> f64 {
    match frequency {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn nic_details(data: &IntrospectionData, intf: &NetworkInterface) -> Nic {
    let model = [intf.vendor.as_deref(), intf.product.as_deref()]
        .iter()
        .flatten()
        .copied()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let ip = intf
        .ipv4_address
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(intf.ipv6_address.as_deref())
        .unwrap_or_default();
    Nic {
        name: intf.name.clone(),
        model,
        mac: intf.mac_address.clone(),
        ip: ip.into(),
        speed_gbps: intf.speed_mbps.unwrap_or_default() / 1000,
        pxe: data
            .all_interfaces
            .get(&intf.name)
            .map(|summary| summary.pxe)
            .unwrap_or(false),
    }
}

fn storage_details(disk: &DiskInfo) -> Storage {
    let storage_type = if disk.name.starts_with("/dev/nvme") {
        StorageType::Nvme
    } else if disk.rotational {
        StorageType::Hdd
    } else {
        StorageType::Ssd
    };
    let string = |value: &Option<String>| value.clone().unwrap_or_default();
    Storage {
        name: disk.name.clone(),
        alternate_names: disk.by_path.iter().cloned().collect(),
        rotational: disk.rotational,
        storage_type,
        size_bytes: disk.size,
        vendor: string(&disk.vendor),
        model: string(&disk.model),
        serial_number: string(&disk.serial),
        wwn: string(&disk.wwn),
        wwn_vendor_extension: string(&disk.wwn_vendor_extension),
        wwn_with_extension: string(&disk.wwn_with_extension),
        hctl: string(&disk.hctl),
    }
}

impl From<&IntrospectionData> for HardwareDetails {
    fn from(data: &IntrospectionData) -> HardwareDetails {
        let inventory = &data.inventory;

        let mut nics = inventory
            .interfaces
            .iter()
            .map(|intf| nic_details(data, intf))
            .collect::<Vec<_>>();
        nics.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.mac.cmp(&b.mac)));

        let mut storage = inventory
            .disks
            .iter()
            .map(storage_details)
            .collect::<Vec<_>>();
        storage.sort_by(|a, b| a.name.cmp(&b.name));

        let mut flags = inventory.cpu.flags.clone();
        flags.sort();
        flags.dedup();

        HardwareDetails {
            system_vendor: HardwareSystemVendor {
                manufacturer: inventory.system_vendor.manufacturer.clone(),
                product_name: inventory.system_vendor.product_name.clone(),
                serial_number: inventory.system_vendor.serial_number.clone(),
            },
            ram_mebibytes: inventory.memory.physical_mb,
            nics,
            storage,
            cpu: Cpu {
                arch: inventory.cpu.architecture.clone(),
                model: inventory.cpu.model_name.clone(),
                clock_megahertz: clock_speed(&inventory.cpu.frequency),
                flags,
                count: inventory.cpu.count,
            },
            hostname: inventory.hostname.clone().unwrap_or_default(),
        }
    }
}

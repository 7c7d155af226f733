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

//! JSON structures of the Bare Metal Introspection API.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

/// Status of an introspection process.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IntrospectionStatus {
    /// Error message if introspection failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Whether introspection has finished.
    #[serde(default)]
    pub finished: bool,
    /// When introspection finished.
    #[serde(default)]
    pub finished_at: Option<NaiveDateTime>,
    /// When introspection started.
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    /// Internal state of the process.
    #[serde(default)]
    pub state: Option<String>,
}

impl IntrospectionStatus {
    /// Error message, if it is not empty.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref().filter(|s| !s.is_empty())
    }
}

/// Data collected by introspection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntrospectionData {
    /// Summary of all network interfaces (keyed by name).
    pub all_interfaces: HashMap<String, InterfaceSummary>,
    /// Hardware inventory reported by the ramdisk.
    pub inventory: Inventory,
}

/// Summary of a network interface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct InterfaceSummary {
    /// IP address.
    pub ip: Option<String>,
    /// MAC address.
    pub mac: Option<String>,
    /// Whether the interface was used for network boot.
    pub pxe: bool,
}

/// Hardware inventory.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Inventory {
    /// BMC IPv4 address.
    pub bmc_address: Option<String>,
    /// CPU information.
    pub cpu: CpuInfo,
    /// Block devices.
    pub disks: Vec<DiskInfo>,
    /// Host name reported by the ramdisk.
    pub hostname: Option<String>,
    /// Network interfaces.
    pub interfaces: Vec<NetworkInterface>,
    /// Memory information.
    pub memory: MemoryInfo,
    /// System vendor information.
    pub system_vendor: SystemVendor,
}

/// CPU information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CpuInfo {
    /// CPU architecture.
    pub architecture: String,
    /// Number of logical CPUs.
    pub count: u32,
    /// CPU flags.
    pub flags: Vec<String>,
    /// Frequency in MHz (a string or a number).
    pub frequency: Value,
    /// CPU model.
    pub model_name: String,
}

/// A block device.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiskInfo {
    /// Stable path to the device.
    pub by_path: Option<String>,
    /// SCSI address.
    pub hctl: Option<String>,
    /// Model.
    pub model: Option<String>,
    /// Kernel name of the device.
    pub name: String,
    /// Whether the device is rotational.
    pub rotational: bool,
    /// Serial number.
    pub serial: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Vendor.
    pub vendor: Option<String>,
    /// World wide name.
    pub wwn: Option<String>,
    /// Vendor extension of the world wide name.
    pub wwn_vendor_extension: Option<String>,
    /// World wide name with the vendor extension.
    pub wwn_with_extension: Option<String>,
}

/// Memory information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemoryInfo {
    /// Physical memory in MiB.
    pub physical_mb: u64,
    /// Usable memory in bytes.
    pub total: u64,
}

/// A network interface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    /// Whether the interface has a link.
    pub has_carrier: bool,
    /// IPv4 address.
    pub ipv4_address: Option<String>,
    /// IPv6 address.
    pub ipv6_address: Option<String>,
    /// MAC address.
    pub mac_address: String,
    /// Interface name.
    pub name: String,
    /// Product ID.
    pub product: Option<String>,
    /// Link speed.
    pub speed_mbps: Option<u64>,
    /// Vendor ID.
    pub vendor: Option<String>,
}

/// System vendor information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemVendor {
    /// Manufacturer.
    pub manufacturer: String,
    /// Product name.
    pub product_name: String,
    /// Serial number.
    pub serial_number: String,
}

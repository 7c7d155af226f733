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

//! Desired configuration of a host, split per lifecycle stage.

use std::collections::HashMap;
use std::fmt;

use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata of the host being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMeta {
    /// Namespace of the host.
    pub namespace: String,
    /// Name of the host.
    pub name: String,
    /// Unique ID of the host.
    pub uid: String,
}

/// Separator between the namespace and the name in node names.
pub const NAME_SEPARATOR: &str = "~";

impl HostMeta {
    /// Create host metadata.
    pub fn new<S1, S2, S3>(namespace: S1, name: S2, uid: S3) -> HostMeta
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        HostMeta {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// Name of the node in the provisioning service.
    pub fn node_name(&self) -> String {
        format!("{}{}{}", self.namespace, NAME_SEPARATOR, self.name)
    }
}

/// Boot mode of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum BootMode {
    /// UEFI boot.
    #[default]
    #[serde(rename = "UEFI")]
    Uefi,
    /// UEFI boot with secure boot enabled.
    #[serde(rename = "UEFISecureBoot")]
    UefiSecureBoot,
    /// Legacy BIOS boot.
    #[serde(rename = "legacy")]
    Legacy,
}

impl BootMode {
    /// Capabilities string describing the boot mode.
    pub fn capabilities(&self) -> &'static str {
        match self {
            BootMode::Uefi => "boot_mode:uefi",
            BootMode::UefiSecureBoot => "boot_mode:uefi,secure_boot:true",
            BootMode::Legacy => "boot_mode:bios",
        }
    }
}

/// Stage of the host lifecycle the caller is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostState {
    /// Registering the host.
    #[default]
    Registering,
    /// Inspecting the hardware.
    Inspecting,
    /// Preparing (manual cleaning).
    Preparing,
    /// Ready for provisioning.
    Available,
    /// Deploying an image.
    Provisioning,
    /// An image is deployed.
    Provisioned,
    /// The host was provisioned outside of this system.
    ExternallyProvisioned,
    /// Removing the deployed image.
    Deprovisioning,
    /// Removing the host.
    Deleting,
}

impl HostState {
    /// Whether the stage requires a deploy ramdisk.
    pub fn needs_deploy_image(&self) -> bool {
        matches!(
            self,
            HostState::Inspecting
                | HostState::Preparing
                | HostState::Provisioning
                | HostState::Deprovisioning
        )
    }
}

/// Checksum algorithm of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    /// MD5 (legacy).
    Md5,
    /// SHA256.
    Sha256,
    /// SHA512.
    Sha512,
}

impl ChecksumType {
    /// Name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumType::Md5 => "md5",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha512 => "sha512",
        }
    }
}

/// Disk format marking a live ISO.
pub const LIVE_ISO_FORMAT: &str = "live-iso";

/// An image to deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Image {
    /// URL of the image.
    pub url: String,
    /// Checksum of the image.
    #[serde(default)]
    pub checksum: Option<String>,
    /// Checksum algorithm (MD5 if not set).
    #[serde(default)]
    pub checksum_type: Option<ChecksumType>,
    /// Format of the image (e.g. raw, qcow2 or live-iso).
    #[serde(default)]
    pub disk_format: Option<String>,
}

impl Image {
    /// Create an image with a checksum.
    pub fn new<S1, S2>(url: S1, checksum: S2, checksum_type: ChecksumType) -> Image
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Image {
            url: url.into(),
            checksum: Some(checksum.into()),
            checksum_type: Some(checksum_type),
            disk_format: None,
        }
    }

    /// Create a live ISO image.
    pub fn live_iso<S: Into<String>>(url: S) -> Image {
        Image {
            url: url.into(),
            checksum: None,
            checksum_type: None,
            disk_format: Some(LIVE_ISO_FORMAT.into()),
        }
    }

    /// Whether the image is a live ISO booted directly.
    pub fn is_live_iso(&self) -> bool {
        self.disk_format.as_deref() == Some(LIVE_ISO_FORMAT)
    }

    /// Checksum and its algorithm, if the checksum is known.
    pub fn checksum(&self) -> Option<(&str, ChecksumType)> {
        let checksum = self.checksum.as_deref().filter(|s| !s.is_empty())?;
        Some((checksum, self.checksum_type.unwrap_or(ChecksumType::Md5)))
    }
}

/// A custom deploy procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomDeploy {
    /// Deploy step implementing the procedure.
    pub method: String,
}

/// Format of a deploy image built per host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Bootable ISO.
    Iso,
    /// Initramfs to use with the configured kernel.
    Initrd,
}

/// A deploy image built for this host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreprovisioningImage {
    /// URL of the image.
    pub url: String,
    /// Format of the image.
    pub format: ImageFormat,
}

/// Mode of automated cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomatedCleaningMode {
    /// Clean disk metadata.
    #[default]
    Metadata,
    /// No automated cleaning.
    Disabled,
}

/// Declarative selector of a disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RootDeviceHints {
    /// Device name, e.g. `/dev/sda` or a by-path link.
    pub device_name: Option<String>,
    /// SCSI address.
    pub hctl: Option<String>,
    /// Substring of the model.
    pub model: Option<String>,
    /// Substring of the vendor.
    pub vendor: Option<String>,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Minimum size in GiB.
    pub min_size_gigabytes: Option<u64>,
    /// World wide name.
    pub wwn: Option<String>,
    /// World wide name with the vendor extension.
    pub wwn_with_extension: Option<String>,
    /// Vendor extension of the world wide name.
    pub wwn_vendor_extension: Option<String>,
    /// Whether the disk is rotational.
    pub rotational: Option<bool>,
}

/// A hardware RAID volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareRaidVolume {
    /// Size in GiB, all available space if not set.
    pub size_gibibytes: Option<u64>,
    /// RAID level.
    pub level: String,
    /// Volume name.
    pub name: Option<String>,
    /// Whether rotational disks must be used.
    pub rotational: Option<bool>,
    /// Number of physical disks.
    pub number_of_physical_disks: Option<usize>,
    /// Controller to use.
    pub controller: Option<String>,
    /// Names of physical disks to use.
    pub physical_disks: Vec<String>,
}

/// A software RAID volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SoftwareRaidVolume {
    /// Size in GiB, all available space if not set.
    pub size_gibibytes: Option<u64>,
    /// RAID level.
    pub level: String,
    /// Selectors of the physical disks to use.
    pub physical_disks: Vec<RootDeviceHints>,
}

/// RAID configuration of a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RaidConfig {
    /// Hardware RAID volumes.
    pub hardware_volumes: Vec<HardwareRaidVolume>,
    /// Software RAID volumes.
    pub software_volumes: Vec<SoftwareRaidVolume>,
}

/// Vendor-independent firmware settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FirmwareConfig {
    /// Whether virtualization support is enabled.
    pub virtualization_enabled: Option<bool>,
    /// Whether hyper-threading is enabled.
    pub simultaneous_multithreading_enabled: Option<bool>,
    /// Whether SR-IOV is enabled.
    pub sriov_enabled: Option<bool>,
}

/// Value of a firmware setting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FirmwareSettingValue {
    /// An integer.
    Integer(i64),
    /// A string.
    String(String),
}

impl fmt::Display for FirmwareSettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareSettingValue::Integer(value) => write!(f, "{value}"),
            FirmwareSettingValue::String(value) => f.write_str(value),
        }
    }
}

impl From<FirmwareSettingValue> for Value {
    fn from(value: FirmwareSettingValue) -> Value {
        match value {
            FirmwareSettingValue::Integer(value) => Value::from(value),
            FirmwareSettingValue::String(value) => Value::from(value),
        }
    }
}

/// Raw host configuration for the config drive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    /// User data (cloud-init, ignition, etc).
    pub user_data: Option<String>,
    /// Network data as YAML or JSON.
    pub network_data: Option<String>,
    /// Meta data as YAML or JSON, overriding the defaults.
    pub meta_data: Option<String>,
}

/// Hardware profile of the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareProfile {
    /// CPU architecture.
    pub cpu_arch: Option<String>,
    /// Size of the root disk in GiB.
    pub local_gb: Option<u64>,
}

/// Data for registering the host and validating management access.
#[derive(Debug, Clone, Default)]
pub struct ManagementAccessData {
    /// Mode of automated cleaning.
    pub automated_cleaning_mode: AutomatedCleaningMode,
    /// Boot mode.
    pub boot_mode: BootMode,
    /// Boot MAC address.
    pub boot_mac_address: Option<MacAddr6>,
    /// Image currently deployed or being deployed.
    pub current_image: Option<Image>,
    /// Whether a custom deploy procedure is used.
    pub has_custom_deploy: bool,
    /// Deploy image built for this host.
    pub preprovisioning_image: Option<PreprovisioningImage>,
    /// Lifecycle stage of the host.
    pub state: HostState,
}

/// Data for inspecting the host.
#[derive(Debug, Clone, Default)]
pub struct InspectData {
    /// Boot mode.
    pub boot_mode: BootMode,
}

/// Data for preparing (manually cleaning) the host.
#[derive(Debug, Clone, Default)]
pub struct PrepareData {
    /// Requested RAID configuration.
    pub target_raid_config: Option<RaidConfig>,
    /// RAID configuration applied previously.
    pub actual_raid_config: Option<RaidConfig>,
    /// Root device hints.
    pub root_device_hints: Option<RootDeviceHints>,
    /// Vendor-independent firmware configuration.
    pub firmware_config: Option<FirmwareConfig>,
    /// Requested firmware settings.
    pub target_firmware_settings: Option<HashMap<String, FirmwareSettingValue>>,
    /// Current firmware settings.
    pub actual_firmware_settings: Option<HashMap<String, String>>,
}

/// Data for deploying an image.
#[derive(Debug, Clone, Default)]
pub struct ProvisionData {
    /// Image to deploy.
    pub image: Image,
    /// Custom deploy procedure.
    pub custom_deploy: Option<CustomDeploy>,
    /// Boot mode.
    pub boot_mode: BootMode,
    /// Root device hints.
    pub root_device_hints: Option<RootDeviceHints>,
    /// Hardware profile.
    pub hardware_profile: HardwareProfile,
    /// Host configuration for the config drive.
    pub host_config: HostConfig,
}

impl ProvisionData {
    /// Custom deploy method, if any.
    pub fn custom_deploy_method(&self) -> Option<&str> {
        self.custom_deploy
            .as_ref()
            .map(|c| c.method.as_str())
            .filter(|m| !m.is_empty())
    }
}

/// Data for adopting a deployed host.
#[derive(Debug, Clone, Default)]
pub struct AdoptData {
    /// Lifecycle stage of the host.
    pub state: HostState,
}

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

//! Vendor-specific BMC details and lifecycle events.

use std::fmt::{self, Debug};

use serde_json::{Map, Value};

use super::data::FirmwareConfig;
use crate::Result;

/// RAID interface that does not support RAID.
pub const NO_RAID_INTERFACE: &str = "no-raid";
/// RAID interface implementing software RAID.
pub const SOFTWARE_RAID_INTERFACE: &str = "agent";

/// Credentials of the BMC.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BmcCredentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl BmcCredentials {
    /// Create credentials.
    pub fn new<S1, S2>(username: S1, password: S2) -> BmcCredentials
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        BmcCredentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Debug for BmcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BmcCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A vendor-specific BIOS setting with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiosSettingValue {
    /// Vendor name of the setting.
    pub name: String,
    /// Desired value.
    pub value: String,
}

impl BiosSettingValue {
    /// Create a setting.
    pub fn new<S1, S2>(name: S1, value: S2) -> BiosSettingValue
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        BiosSettingValue {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Access to the BMC of a host.
///
/// Implementations know which hardware type and interfaces to use for
/// a given BMC address and how to fill in the driver information.
/// Empty interface names mean the service default.
pub trait BmcAccess: Debug + Send + Sync {
    /// Name of the BMC type for messages.
    fn bmc_type(&self) -> &str;

    /// Hardware type of the node.
    fn driver(&self) -> &str;

    /// Driver information including the credentials.
    fn driver_info(&self, credentials: &BmcCredentials) -> Map<String, Value>;

    /// Whether the boot MAC address is required.
    fn needs_mac(&self) -> bool {
        false
    }

    /// Whether UEFI secure boot is supported.
    fn supports_secure_boot(&self) -> bool {
        false
    }

    /// Whether the deploy ramdisk can be booted from an ISO.
    fn supports_iso_preprovisioning_image(&self) -> bool {
        false
    }

    /// BIOS interface.
    fn bios_interface(&self) -> &str {
        ""
    }

    /// Boot interface.
    fn boot_interface(&self) -> &str {
        ""
    }

    /// Management interface.
    fn management_interface(&self) -> &str {
        ""
    }

    /// Power interface.
    fn power_interface(&self) -> &str {
        ""
    }

    /// RAID interface.
    fn raid_interface(&self) -> &str {
        NO_RAID_INTERFACE
    }

    /// Vendor interface.
    fn vendor_interface(&self) -> &str {
        ""
    }

    /// Convert the vendor-independent firmware configuration into BIOS settings.
    fn build_bios_settings(&self, config: Option<&FirmwareConfig>) -> Result<Vec<BiosSettingValue>> {
        let _ = config;
        Ok(Vec::new())
    }
}

/// Sink for lifecycle events of a host.
pub trait EventPublisher: Debug + Send + Sync {
    /// Publish an event with a reason and a human-readable message.
    fn publish(&self, reason: &str, message: &str);
}

/// Publisher that writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, reason: &str, message: &str) {
        info!("{}: {}", reason, message);
    }
}

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

//! JSON structures of the Bare Metal API.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::infos::{DriverInfo, InstanceInfo, Properties};
use super::types::*;
use crate::utils::{empty_map_as_default, null_as_empty, redacted};

/// A bare metal node as returned by the provisioning service.
///
/// Nodes are snapshots: they are fetched fresh on every call and never
/// written back directly, only through update operations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Node {
    /// Whether automated cleaning is enabled.
    #[serde(default)]
    pub automated_clean: Option<bool>,
    /// BIOS interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bios_interface: String,
    /// Boot interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub boot_interface: String,
    /// Clean step that is currently running.
    #[serde(default, deserialize_with = "empty_map_as_default")]
    pub clean_step: Option<CleanStep>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,
    /// Deploy interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deploy_interface: String,
    /// Deploy step that is currently running.
    #[serde(default, deserialize_with = "empty_map_as_default")]
    pub deploy_step: Option<DeployStep>,
    /// Hardware type.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub driver: String,
    /// Driver-specific information.
    #[serde(default)]
    pub driver_info: DriverInfo,
    /// Extra fields.
    #[serde(default)]
    pub extra: HashMap<String, Value>,
    /// Unique ID.
    #[serde(rename = "uuid")]
    pub id: String,
    /// Inspect interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub inspect_interface: String,
    /// ID of the instance deployed on the node.
    #[serde(default, rename = "instance_uuid")]
    pub instance_id: Option<String>,
    /// Instance-specific information.
    #[serde(default)]
    pub instance_info: InstanceInfo,
    /// Last error.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Whether the node is in maintenance.
    #[serde(default)]
    pub maintenance: bool,
    /// Management interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub management_interface: String,
    /// Node name.
    #[serde(default)]
    pub name: Option<String>,
    /// Power interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub power_interface: String,
    /// Current power state.
    #[serde(default)]
    pub power_state: Option<PowerState>,
    /// Node properties.
    #[serde(default)]
    pub properties: Properties,
    /// Current provision state.
    #[serde(default)]
    pub provision_state: ProvisionState,
    /// Last update of the provision state.
    #[serde(default)]
    pub provision_updated_at: Option<DateTime<FixedOffset>>,
    /// RAID interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub raid_interface: String,
    /// Requested power state.
    #[serde(default)]
    pub target_power_state: Option<TargetPowerState>,
    /// Requested provision state.
    #[serde(default)]
    pub target_provision_state: Option<TargetProvisionState>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<FixedOffset>>,
    /// Vendor interface.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vendor_interface: String,
}

impl Node {
    /// Last error, if it is not empty.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref().filter(|s| !s.is_empty())
    }

    /// Name of the node or an empty string.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// A summary of a bare metal node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeSummary {
    /// Unique ID.
    #[serde(default, rename = "uuid")]
    pub id: String,
    /// Node name.
    #[serde(default)]
    pub name: Option<String>,
    /// Current provision state.
    #[serde(default)]
    pub provision_state: ProvisionState,
    /// Requested provision state.
    #[serde(default)]
    pub target_provision_state: Option<TargetProvisionState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodesRoot {
    pub nodes: Vec<NodeSummary>,
}

/// A request to create a node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeCreate {
    /// BIOS interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bios_interface: Option<String>,
    /// Boot interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_interface: Option<String>,
    /// Deploy interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_interface: Option<String>,
    /// Hardware type.
    pub driver: String,
    /// Driver-specific information.
    pub driver_info: DriverInfo,
    /// Inspect interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspect_interface: Option<String>,
    /// Management interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_interface: Option<String>,
    /// Node name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Power interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_interface: Option<String>,
    /// Node properties.
    pub properties: Properties,
    /// RAID interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raid_interface: Option<String>,
    /// Vendor interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_interface: Option<String>,
}

/// A single field-level change of a node.
///
/// A batch of operations is sent as one JSON patch document. The `add`
/// operation replaces the member if it already exists.
#[derive(Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum UpdateOperation {
    /// Add or replace a value.
    Add {
        /// JSON pointer to the field.
        path: String,
        /// New value.
        value: Value,
    },
    /// Remove a value.
    Remove {
        /// JSON pointer to the field.
        path: String,
    },
}

impl UpdateOperation {
    /// JSON pointer of the changed field.
    pub fn path(&self) -> &str {
        match self {
            UpdateOperation::Add { path, .. } | UpdateOperation::Remove { path } => path,
        }
    }
}

impl fmt::Debug for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOperation::Add { path, value } => {
                if path.contains("password") {
                    write!(f, "add {path} = <redacted>")
                } else {
                    write!(f, "add {} = {}", path, redacted(value))
                }
            }
            UpdateOperation::Remove { path } => write!(f, "remove {path}"),
        }
    }
}

/// A configuration drive as a dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigDrive {
    /// Meta data.
    pub meta_data: Map<String, Value>,
    /// Network configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_data: Option<Value>,
    /// User data (cloud-init, ignition, etc).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// A request to change the provision state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionStateRequest {
    /// Requested action.
    pub target: ProvisionAction,
    /// Manual clean steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_steps: Option<Vec<CleanStep>>,
    /// Configuration drive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configdrive: Option<ConfigDrive>,
    /// Additional deploy steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_steps: Option<Vec<DeployStep>>,
}

impl ProvisionStateRequest {
    /// A request with no extra arguments.
    pub fn new(target: ProvisionAction) -> ProvisionStateRequest {
        ProvisionStateRequest {
            target,
            clean_steps: None,
            configdrive: None,
            deploy_steps: None,
        }
    }

    /// Add manual clean steps.
    pub fn with_clean_steps(mut self, steps: Vec<CleanStep>) -> ProvisionStateRequest {
        self.clean_steps = Some(steps);
        self
    }

    /// Add a configuration drive.
    pub fn with_configdrive(mut self, configdrive: Option<ConfigDrive>) -> ProvisionStateRequest {
        self.configdrive = configdrive;
        self
    }

    /// Add deploy steps (if any).
    pub fn with_deploy_steps(mut self, steps: Vec<DeployStep>) -> ProvisionStateRequest {
        self.deploy_steps = if steps.is_empty() { None } else { Some(steps) };
        self
    }
}

/// A request to change the power state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerStateRequest {
    /// Requested power state.
    pub target: TargetPowerState,
    /// Timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Result of validating one interface.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InterfaceValidation {
    /// Whether the validation passed (`None` if not applicable).
    #[serde(default)]
    pub result: Option<bool>,
    /// Reason of the failure.
    #[serde(default)]
    pub reason: Option<String>,
}

impl InterfaceValidation {
    /// Whether the validation passed.
    pub fn is_ok(&self) -> bool {
        self.result.unwrap_or(false)
    }
}

/// Results of validating a node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeValidation {
    /// Boot interface.
    #[serde(default)]
    pub boot: InterfaceValidation,
    /// Deploy interface.
    #[serde(default)]
    pub deploy: InterfaceValidation,
}

/// A network port of a node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Port {
    /// MAC address.
    #[serde(default)]
    pub address: String,
    /// Unique ID.
    #[serde(default, rename = "uuid")]
    pub id: String,
    /// Node the port belongs to.
    #[serde(default, rename = "node_uuid")]
    pub node_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortsRoot {
    pub ports: Vec<Port>,
}

/// A request to create a port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortCreate {
    /// MAC address.
    pub address: String,
    /// Node the port belongs to.
    #[serde(rename = "node_uuid")]
    pub node_id: String,
    /// Whether the port is used for network boot.
    pub pxe_enabled: bool,
}

/// A BIOS setting.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BiosSetting {
    /// Setting name.
    pub name: String,
    /// Current value.
    #[serde(default)]
    pub value: Option<String>,
    /// Type of the setting.
    #[serde(default)]
    pub attribute_type: Option<String>,
    /// Values allowed for enumerations.
    #[serde(default)]
    pub allowable_values: Option<Vec<String>>,
    /// Lowest allowed integer.
    #[serde(default)]
    pub lower_bound: Option<i64>,
    /// Highest allowed integer.
    #[serde(default)]
    pub upper_bound: Option<i64>,
    /// Minimum length of strings.
    #[serde(default)]
    pub min_length: Option<u64>,
    /// Maximum length of strings.
    #[serde(default)]
    pub max_length: Option<u64>,
    /// Whether the setting is read only.
    #[serde(default)]
    pub read_only: Option<bool>,
    /// Whether the setting is unique.
    #[serde(default)]
    pub unique: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BiosSettingsRoot {
    pub bios: Vec<BiosSetting>,
}

/// Size of a logical disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeSize {
    /// Use all available space.
    Max,
    /// Size in GiB.
    Gibibytes(u64),
}

impl Serialize for VolumeSize {
    fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            VolumeSize::Max => serializer.serialize_str("MAX"),
            VolumeSize::Gibibytes(size) => serializer.serialize_u64(*size),
        }
    }
}

/// A logical disk of the target RAID configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalDisk {
    /// Controller to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// Type of the disks to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<DiskType>,
    /// Whether this is the root volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_root_volume: Option<bool>,
    /// Number of physical disks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_physical_disks: Option<usize>,
    /// Physical disks (names or device hints).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub physical_disks: Vec<Value>,
    /// RAID level.
    pub raid_level: String,
    /// Size of the volume.
    pub size_gb: VolumeSize,
    /// Name of the volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
}

/// Target RAID configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetRaidConfig {
    /// Logical disks to build.
    pub logical_disks: Vec<LogicalDisk>,
}

/// A request to create a BMC event subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionCreate {
    /// Context passed back with events.
    #[serde(rename = "Context", skip_serializing_if = "String::is_empty")]
    pub context: String,
    /// URL receiving the events.
    #[serde(rename = "Destination")]
    pub destination: String,
    /// HTTP headers sent with the events.
    #[serde(rename = "HttpHeaders", skip_serializing_if = "Vec::is_empty")]
    pub http_headers: Vec<HashMap<String, String>>,
}

/// A BMC event subscription.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Subscription {
    /// Context passed back with events.
    #[serde(default, rename = "Context")]
    pub context: Option<String>,
    /// URL receiving the events.
    #[serde(default, rename = "Destination")]
    pub destination: Option<String>,
    /// Subscription ID.
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDelete<'s> {
    pub id: &'s str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VendorPassthruQuery {
    pub method: &'static str,
}

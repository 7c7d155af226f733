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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

protocol_enum! {
    /// Provision state of the node.
    enum ProvisionState = Unknown {
        /// Previously deployed node is being adopted.
        Adopting = "adopting",
        /// Adopting a deployed node has failed.
        AdoptFailed = "adopt failed",
        /// Node is deployed.
        Active = "active",
        /// Node is available for deployment.
        Available = "available",
        /// A synchronous cleaning/preparing action is running.
        Cleaning = "cleaning",
        /// Cleaning has failed.
        CleanFailed = "clean failed",
        /// Waiting for an asynchronous cleaning/preparing action.
        CleanWait = "clean wait",
        /// Node is being undeployed (instance deletion).
        Deleting = "deleting",
        /// A synchronous deployment action is running.
        Deploying = "deploying",
        /// Deployment has failed.
        DeployFailed = "deploy failed",
        /// Waiting for an asynchronous deployment action.
        DeployWait = "wait call-back",
        /// Node is freshly enrolled.
        Enroll = "enroll",
        /// Undeployment failed before cleaning.
        Error = "error",
        /// Processing inspection data.
        Inspecting = "inspecting",
        /// Inspection has failed.
        InspectFailed = "inspect failed",
        /// Waiting for inspection data from the ramdisk.
        InspectWait = "inspect wait",
        /// Node is enrolled and manageable.
        Manageable = "manageable",
        /// Management access is being verified.
        Verifying = "verifying",

        /// Reported provision state is not supported.
        Unknown = ""
    }
}

impl Default for ProvisionState {
    fn default() -> ProvisionState {
        ProvisionState::Unknown
    }
}

impl ProvisionState {
    /// Whether the state is stable.
    ///
    /// A node will stay in a stable state forever, unless explicitly moved to a different state.
    /// Error states are not considered stable since they require an action.
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            ProvisionState::Active
                | ProvisionState::Available
                | ProvisionState::Enroll
                | ProvisionState::Manageable
        )
    }

    /// Whether the node is in the middle of a long-running operation.
    ///
    /// Busy nodes are counted against the provisioning limit.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ProvisionState::Cleaning
                | ProvisionState::CleanWait
                | ProvisionState::Inspecting
                | ProvisionState::InspectWait
                | ProvisionState::Deploying
                | ProvisionState::DeployWait
                | ProvisionState::Deleting
        )
    }
}

protocol_enum! {
    /// Target provision state of the node.
    enum TargetProvisionState = Unknown {
        /// Node will be deployed (instance active).
        Active = "active",
        /// Node will be undeployed (instance deleted).
        Deleted = "deleted",
        /// Node will be available (after instance deletion and cleaning).
        Available = "available",
        /// Node will be manageable.
        Manageable = "manageable",

        /// Reported target state is not supported.
        Unknown = ""
    }
}

protocol_enum! {
    /// Action requested through the provision state API.
    enum ProvisionAction {
        /// Deploy the node.
        Active = "active",
        /// Adopt an already deployed node.
        Adopt = "adopt",
        /// Run manual cleaning.
        Clean = "clean",
        /// Undeploy the node.
        Deleted = "deleted",
        /// Run hardware inspection.
        Inspect = "inspect",
        /// Move the node to manageable.
        Manage = "manage",
        /// Move the node to available.
        Provide = "provide"
    }
}

protocol_enum! {
    /// Power state of the node.
    enum PowerState = Unknown {
        /// Node is powered off.
        Off = "power off",
        /// Node is powered on.
        On = "power on",
        /// Error when getting power state.
        Error = "error",

        /// Reported power state is not supported.
        Unknown = ""
    }
}

protocol_enum! {
    /// Target power state of the node.
    enum TargetPowerState = Unknown {
        /// Power off the node (hard power off).
        Off = "power off",
        /// Power on the node.
        On = "power on",
        /// Reboot the node (hard reboot).
        Reboot = "rebooting",
        /// Power off the node (soft power off).
        SoftOff = "soft power off",
        /// Reboot the node (soft reboot).
        SoftReboot = "soft rebooting",

        /// Reported target power state is not supported.
        Unknown = ""
    }
}

protocol_enum! {
    /// Interface of a deploy or clean step
    enum StepInterface = Unknown {
        /// BIOS settings.
        BIOS = "bios",
        /// Deployment.
        Deploy = "deploy",
        /// Management.
        Management = "management",
        /// Power.
        Power = "power",
        /// RAID configuration.
        RAID = "raid",

        /// Interface is not supported.
        Unknown = ""
    }
}

protocol_enum! {
    /// Type of a physical disk.
    enum DiskType {
        /// Rotational disk.
        HDD = "hdd",
        /// Solid state disk.
        SSD = "ssd"
    }
}

/// A deploy step.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeployStep {
    /// Interface to which the step belongs.
    pub interface: StepInterface,
    /// Step name.
    #[serde(rename = "step")]
    pub name: String,
    /// Step arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Priority in which the step runs.
    #[serde(default)]
    pub priority: u32,
}

/// A clean step.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CleanStep {
    /// Interface to which the step belongs.
    pub interface: StepInterface,
    /// Step name.
    #[serde(rename = "step")]
    pub name: String,
    /// Step arguments.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
    /// Priority in which the step runs (only reported for running steps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl CleanStep {
    /// Create a manual clean step without arguments.
    pub fn new<S: Into<String>>(interface: StepInterface, name: S) -> CleanStep {
        CleanStep {
            interface,
            name: name.into(),
            args: Map::new(),
            priority: None,
        }
    }

    /// Add an argument to the step.
    pub fn with_arg<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> CleanStep {
        let _ = self.args.insert(key.into(), value.into());
        self
    }
}

/// Query for listing nodes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeListQuery {
    /// Comma-separated fields to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    /// Marker (last node that was fetched).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    /// Limit on the number of fetched nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl NodeListQuery {
    /// Only request the given fields.
    pub fn with_fields<I>(mut self, fields: I) -> NodeListQuery
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let joined = fields
            .into_iter()
            .map(|f| f.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.fields = Some(joined);
        self
    }
}

/// Query for listing ports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortListQuery {
    /// Only ports with this MAC address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Only ports of this node.
    #[serde(rename = "node_uuid", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Comma-separated fields to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
}

impl PortListQuery {
    /// Ports with the given MAC address.
    pub fn by_address<S: Into<String>>(address: S) -> PortListQuery {
        PortListQuery {
            address: Some(address.into()),
            node_id: None,
            fields: Some("uuid,address,node_uuid".into()),
        }
    }

    /// Ports that belong to the given node.
    pub fn by_node<S: Into<String>>(node_id: S) -> PortListQuery {
        PortListQuery {
            address: None,
            node_id: Some(node_id.into()),
            fields: Some("uuid,address,node_uuid".into()),
        }
    }
}

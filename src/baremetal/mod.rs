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

//! Bare Metal API implementation bits.
//!
//! # Limitations
//!
//! This module requires Bare Metal API version 1.46 (Rocky) or newer and
//! Bare Metal Introspection API version 1.

mod api;
mod client;
mod constants;
mod infos;
mod introspection;
mod protocol;
mod types;

pub use client::{ProvisioningClient, SessionClient};
pub use infos::{DriverInfo, ImageChecksum, InstanceInfo, Properties};
pub use introspection::{
    CpuInfo, DiskInfo, InterfaceSummary, IntrospectionData, IntrospectionStatus, Inventory,
    MemoryInfo, NetworkInterface, SystemVendor,
};
pub use protocol::{
    BiosSetting, ConfigDrive, InterfaceValidation, LogicalDisk, Node, NodeCreate, NodeSummary,
    NodeValidation, Port, PortCreate, PowerStateRequest, ProvisionStateRequest, Subscription,
    SubscriptionCreate, TargetRaidConfig, UpdateOperation, VolumeSize,
};
pub use types::{
    CleanStep, DeployStep, DiskType, NodeListQuery, PortListQuery, PowerState, ProvisionAction,
    ProvisionState, StepInterface, TargetPowerState, TargetProvisionState,
};

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

//! Reconciliation engine driving a host through its lifecycle.
//!
//! Every public operation reads the node fresh from the provisioning
//! service, applies at most one batch of updates, requests at most one
//! transition and returns an [`Outcome`].

use std::sync::Arc;

mod bmc;
mod config;
mod data;
mod devicehints;
mod firmware;
mod hardware;
mod inspect;
mod lookup;
mod outcome;
mod power;
mod prepare;
mod provision;
mod raid;
mod register;
mod removal;
mod subscription;
mod updates;

#[cfg(test)]
mod fixtures;

pub use bmc::{
    BiosSettingValue, BmcAccess, BmcCredentials, EventPublisher, LogPublisher, NO_RAID_INTERFACE,
    SOFTWARE_RAID_INTERFACE,
};
pub use config::{ProvisionerConfig, DEFAULT_MAX_BUSY_HOSTS};
pub use data::{
    AdoptData, AutomatedCleaningMode, BootMode, ChecksumType, CustomDeploy, FirmwareConfig,
    FirmwareSettingValue, HardwareProfile, HardwareRaidVolume, HostConfig, HostMeta, HostState,
    Image, ImageFormat, InspectData, ManagementAccessData, PrepareData, PreprovisioningImage,
    ProvisionData, RaidConfig, RootDeviceHints, SoftwareRaidVolume, LIVE_ISO_FORMAT,
    NAME_SEPARATOR,
};
pub use devicehints::make_hint_map;
pub use firmware::{FirmwareSchema, FirmwareSettings};
pub use hardware::{
    Cpu, HardwareDetails, HardwareState, HardwareSystemVendor, Nic, Storage, StorageType,
};
pub use inspect::Inspection;
pub use lookup::{LookupError, MacAddressConflict};
pub use outcome::{
    Outcome, INTROSPECTION_REQUEUE_DELAY, POWER_REQUEUE_DELAY, PROVISION_REQUEUE_DELAY,
    SOFT_POWER_OFF_TIMEOUT, SUBSCRIPTION_REQUEUE_DELAY,
};
pub use power::RebootMode;
pub use raid::{
    build_raid_clean_steps, build_target_raid_config, mark_root_volume, RaidConfigError,
};
pub use register::{Registration, NEEDS_PREPROVISIONING_IMAGE};
pub use subscription::EventSubscription;
pub use updates::{apply_updates, values_equal, NodeUpdater, Options};

use crate::baremetal::{Node, ProvisionAction, ProvisionStateRequest, ProvisioningClient};
use crate::{Error, ErrorKind, Result};
use outcome::Step;

/// Message of the error returned for hosts without a node.
pub const NEEDS_REGISTRATION: &str = "Host not registered";

/// Provisioner of a single host.
///
/// A provisioner is cheap to create and is expected to be created for
/// every reconciliation cycle.
#[derive(Debug, Clone)]
pub struct Provisioner {
    config: ProvisionerConfig,
    meta: HostMeta,
    node_id: Option<String>,
    credentials: BmcCredentials,
    client: Arc<dyn ProvisioningClient>,
    bmc: Arc<dyn BmcAccess>,
    publisher: Arc<dyn EventPublisher>,
}

static_assertions::assert_impl_all!(Provisioner: Send, Sync);

impl Provisioner {
    /// Create a provisioner for a host.
    pub fn new(
        config: ProvisionerConfig,
        meta: HostMeta,
        client: Arc<dyn ProvisioningClient>,
        bmc: Arc<dyn BmcAccess>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Provisioner {
        Provisioner {
            config,
            meta,
            node_id: None,
            credentials: BmcCredentials::default(),
            client,
            bmc,
            publisher,
        }
    }

    /// Use the node ID stored from a previous registration.
    pub fn with_node_id<S: Into<String>>(mut self, node_id: S) -> Provisioner {
        self.node_id = Some(node_id.into()).filter(|s: &String| !s.is_empty());
        self
    }

    /// Use these BMC credentials.
    pub fn with_credentials(mut self, credentials: BmcCredentials) -> Provisioner {
        self.credentials = credentials;
        self
    }

    /// Configuration of the provisioner.
    #[inline]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Metadata of the host.
    #[inline]
    pub fn meta(&self) -> &HostMeta {
        &self.meta
    }

    /// Node ID, if known.
    #[inline]
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// Fetch the node of this host.
    ///
    /// Fails with `ResourceNotFound` if the host is not registered.
    pub async fn fetch_node(&self) -> Result<Node> {
        let node_id = match self.node_id {
            Some(ref id) => id,
            None => return Err(Error::new(ErrorKind::ResourceNotFound, NEEDS_REGISTRATION)),
        };
        match self.client.get_node(node_id).await {
            Ok(node) => {
                trace!(
                    "Node {} is in state {} (target {:?}), power {:?} (target {:?})",
                    node.id,
                    node.provision_state,
                    node.target_provision_state,
                    node.power_state,
                    node.target_power_state
                );
                Ok(node)
            }
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => {
                info!("Node {} of host {} is gone", node_id, self.meta.node_name());
                Err(Error::new(ErrorKind::ResourceNotFound, NEEDS_REGISTRATION))
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn get_node(&self) -> Step<Node> {
        self.fetch_node().await.map_err(Outcome::Transient)
    }

    pub(crate) fn publish(&self, reason: &str, message: &str) {
        self.publisher.publish(reason, message);
    }

    /// Submit the updates if there are any, return the current node.
    pub(crate) async fn try_update_node(&self, node: Node, updater: &NodeUpdater) -> Step<Node> {
        if updater.is_empty() {
            debug!("Node {} is up to date", node.id);
            return Ok(node);
        }
        info!(
            "Updating node {} with {} change(s)",
            node.id,
            updater.updates().len()
        );
        Ok(self.client.update_node(&node.id, updater.updates()).await?)
    }

    /// Request a provision state transition.
    pub(crate) async fn request_transition(
        &self,
        node: &Node,
        request: ProvisionStateRequest,
    ) -> Step<()> {
        info!(
            "Requesting provision action {} for node {} in state {}",
            request.target, node.id, node.provision_state
        );
        Ok(self.client.set_provision_state(&node.id, &request).await?)
    }

    /// Request a transition and wait for it on the next call.
    pub(crate) async fn change_provision_state(
        &self,
        node: &Node,
        request: ProvisionStateRequest,
    ) -> Outcome {
        match self.request_transition(node, request).await {
            Ok(()) => Outcome::Continuing(PROVISION_REQUEUE_DELAY),
            Err(outcome) => outcome,
        }
    }

    /// Request a transition with no extra arguments.
    pub(crate) async fn change_provision_action(
        &self,
        node: &Node,
        action: ProvisionAction,
    ) -> Outcome {
        self.change_provision_state(node, ProvisionStateRequest::new(action))
            .await
    }

    /// Set or clear the maintenance mode.
    pub(crate) async fn set_maintenance(&self, node: Node, maintenance: bool) -> Outcome {
        info!(
            "Setting maintenance of node {} to {}",
            node.id, maintenance
        );
        let mut updater = NodeUpdater::new();
        let _ = updater.set_top_level_opt("maintenance", maintenance, node.maintenance);
        match self.try_update_node(node, &updater).await {
            Ok(_) => Outcome::Continuing(std::time::Duration::ZERO),
            Err(outcome) => outcome,
        }
    }

    /// Clear the maintenance mode after a cleaning failure or re-manage the node.
    pub(crate) async fn recover_clean_failure(&self, node: Node) -> Outcome {
        if node.maintenance {
            info!("Clearing maintenance of node {} after a cleaning failure", node.id);
            self.set_maintenance(node, false).await
        } else {
            self.change_provision_action(&node, ProvisionAction::Manage)
                .await
        }
    }

    /// Whether the provisioning and introspection services are available.
    pub async fn is_ready(&self) -> Result<bool> {
        let (provisioning, introspection) = futures::join!(
            self.client.is_provisioning_ready(),
            self.client.is_introspection_ready()
        );
        let (provisioning, introspection) = (provisioning?, introspection?);
        if !provisioning {
            debug!("Provisioning service is not ready yet");
        }
        if !introspection {
            debug!("Introspection service is not ready yet");
        }
        Ok(provisioning && introspection)
    }

    /// Get the current hardware state.
    pub async fn update_hardware_state(&self) -> Result<HardwareState> {
        let node = self.fetch_node().await?;
        Ok(HardwareState::from(node.power_state))
    }
}

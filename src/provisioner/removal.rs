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

//! Deprovisioning and removal of hosts.

use std::time::Duration;

use super::outcome::{Outcome, PROVISION_REQUEUE_DELAY};
use super::Provisioner;
use crate::baremetal::{ProvisionAction, ProvisionState};
use crate::{Error, ErrorKind};

const DEFAULT_DEPROVISION_ERROR: &str = "Deprovisioning failed";

impl Provisioner {
    /// Remove the image from the host.
    ///
    /// With `force` a failed deprovisioning is retried.
    pub async fn deprovision(&self, force: bool) -> Outcome {
        let node = match self.get_node().await {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        info!(
            "Deprovisioning node {} in state {} (target {:?}, last error {:?})",
            node.id,
            node.provision_state,
            node.target_provision_state,
            node.last_error
        );

        match node.provision_state {
            ProvisionState::Error if !force => {
                let message = node.last_error().unwrap_or(DEFAULT_DEPROVISION_ERROR);
                info!("Deprovisioning of node {} failed: {}", node.id, message);
                Outcome::failed(message)
            }
            ProvisionState::Error => {
                info!("Retrying deprovisioning of node {}", node.id);
                self.publish("DeprovisioningStarted", "Image deprovisioning restarted");
                self.change_provision_action(&node, ProvisionAction::Deleted)
                    .await
            }
            ProvisionState::CleanFailed => self.recover_clean_failure(node).await,
            ProvisionState::Manageable => {
                debug!("Node {} is manageable, deprovisioning is complete", node.id);
                Outcome::Complete
            }
            ProvisionState::Available => {
                self.publish("DeprovisioningComplete", "Image deprovisioning completed");
                Outcome::Complete
            }
            ProvisionState::Deleting
            | ProvisionState::Cleaning
            | ProvisionState::CleanWait
            | ProvisionState::Deploying => {
                debug!(
                    "Waiting for node {} in state {}",
                    node.id, node.provision_state
                );
                Outcome::Continuing(PROVISION_REQUEUE_DELAY)
            }
            ProvisionState::Active | ProvisionState::DeployFailed | ProvisionState::DeployWait => {
                self.publish("DeprovisioningStarted", "Image deprovisioning started");
                self.change_provision_action(&node, ProvisionAction::Deleted)
                    .await
            }
            other => Outcome::transient(
                ErrorKind::InvalidResponse,
                format!("Unhandled node state {other}"),
            ),
        }
    }

    /// Remove the host from the provisioning service.
    ///
    /// The node is put into maintenance first so that it can be removed
    /// from any state. A removal without a node is complete.
    pub async fn delete(&self) -> Outcome {
        let node = match self.fetch_node().await {
            Ok(node) => node,
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => {
                info!("No node found for host {}, already deleted", self.meta.node_name());
                return Outcome::Complete;
            }
            Err(err) => return Outcome::Transient(err),
        };
        info!(
            "Deleting node {} in state {} (target {:?}, last error {:?})",
            node.id, node.provision_state, node.target_provision_state, node.last_error
        );

        if node.provision_state == ProvisionState::Available {
            return self
                .change_provision_action(&node, ProvisionAction::Manage)
                .await;
        }

        if !node.maintenance {
            info!("Setting maintenance of node {} to force deletion", node.id);
            return self.set_maintenance(node, true).await;
        }

        match self.client.delete_node(&node.id).await {
            Ok(()) => {
                info!("Node {} removed", node.id);
                Outcome::Continuing(Duration::ZERO)
            }
            Err(err) if err.kind() == ErrorKind::Conflict => {
                info!("Node {} is busy, cannot remove it yet", node.id);
                Outcome::Continuing(PROVISION_REQUEUE_DELAY)
            }
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => {
                info!("Node {} is already gone", node.id);
                Outcome::Complete
            }
            Err(err) => Outcome::Transient(Error::new(
                err.kind(),
                format!("Failed to remove node {}: {}", node.id, err),
            )),
        }
    }

    /// Remove the host from the provisioning service without touching it.
    pub async fn detach(&self) -> Outcome {
        self.delete().await
    }
}

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

//! Hardware inspection.

use super::data::InspectData;
use super::hardware::HardwareDetails;
use super::outcome::{Outcome, Step, INTROSPECTION_REQUEUE_DELAY};
use super::register::build_capabilities_value;
use super::updates::NodeUpdater;
use super::Provisioner;
use crate::baremetal::{
    IntrospectionStatus, Node, ProvisionAction, ProvisionState, ProvisionStateRequest,
};
use crate::utils::ResultExt;
use crate::{Error, ErrorKind};

const DEFAULT_INSPECTION_ERROR: &str = "Inspection failed";

/// Result of an inspection step.
#[derive(Debug)]
pub struct Inspection {
    /// Outcome of the step.
    pub outcome: Outcome,
    /// Whether a new inspection was started by this call.
    pub started: bool,
    /// Hardware details once inspection is complete.
    pub details: Option<HardwareDetails>,
}

impl From<Outcome> for Inspection {
    fn from(outcome: Outcome) -> Inspection {
        Inspection {
            outcome,
            started: false,
            details: None,
        }
    }
}

fn is_inspecting(node: &Node) -> bool {
    matches!(
        node.provision_state,
        ProvisionState::Inspecting | ProvisionState::InspectWait
    )
}

impl Provisioner {
    async fn start_inspection(
        &self,
        node: Node,
        data: &InspectData,
        force: bool,
    ) -> Step<Inspection> {
        match node.provision_state {
            ProvisionState::Available => {
                return Ok(self
                    .change_provision_action(&node, ProvisionAction::Manage)
                    .await
                    .into());
            }
            ProvisionState::Inspecting | ProvisionState::InspectWait => {
                debug!("Inspection of node {} has already started", node.id);
                return Ok(Outcome::Continuing(INTROSPECTION_REQUEUE_DELAY).into());
            }
            ProvisionState::InspectFailed if !force => {
                let message = node.last_error().unwrap_or(DEFAULT_INSPECTION_ERROR);
                info!("Inspection of node {} failed: {}", node.id, message);
                return Ok(Outcome::failed(message).into());
            }
            _ => {}
        }

        let mut updater = NodeUpdater::new();
        let _ = updater.set_properties_opts(
            options! {"capabilities" => build_capabilities_value(Some(&node), data.boot_mode)},
            &node,
        );
        let node = self.try_update_node(node, &updater).await?;

        info!("Starting new hardware inspection of node {}", node.id);
        self.request_transition(&node, ProvisionStateRequest::new(ProvisionAction::Inspect))
            .await?;
        self.publish("InspectionStarted", "Hardware inspection started");
        Ok(Inspection {
            outcome: Outcome::Continuing(INTROSPECTION_REQUEUE_DELAY),
            started: true,
            details: None,
        })
    }

    async fn introspection_status(&self, node: &Node) -> Step<Option<IntrospectionStatus>> {
        match self.client.get_introspection_status(&node.id).await {
            Ok(status) => Ok(Some(status)),
            Err(err) if err.kind() == ErrorKind::ResourceNotFound => Ok(None),
            Err(err) => Err(Outcome::Transient(Error::new(
                err.kind(),
                format!("Failed to extract hardware inspection status: {err}"),
            ))),
        }
    }

    async fn do_inspect(&self, data: &InspectData, force: bool, refresh: bool) -> Step<Inspection> {
        let node = self.get_node().await?;

        let status = match self.introspection_status(&node).await {
            Ok(Some(status)) if !refresh => status,
            Ok(_) => return self.start_inspection(node, data, force).await,
            Err(_) if refresh => return self.start_inspection(node, data, force).await,
            Err(outcome) => return Err(outcome),
        };

        if let Some(error) = status.error() {
            info!("Inspection of node {} failed: {}", node.id, error);
            return Ok(Outcome::failed(error).into());
        }

        if !status.finished || is_inspecting(&node) {
            debug!(
                "Inspection of node {} is in progress since {:?}",
                node.id, status.started_at
            );
            return Ok(Outcome::Continuing(INTROSPECTION_REQUEUE_DELAY).into());
        }

        info!("Fetching hardware details of node {}", node.id);
        let data = self
            .client
            .get_introspection_data(&node.id)
            .await
            .context("Failed to retrieve hardware introspection data")
            .map_err(Outcome::Transient)?;
        let details = HardwareDetails::from(&data);
        self.publish("InspectionComplete", "Hardware inspection completed");
        Ok(Inspection {
            outcome: Outcome::Complete,
            started: false,
            details: Some(details),
        })
    }

    /// Inspect the hardware of the host.
    ///
    /// With `refresh` a new inspection is started even if a previous one
    /// has finished. With `force` a failed inspection is retried.
    pub async fn inspect_hardware(
        &self,
        data: &InspectData,
        force: bool,
        refresh: bool,
    ) -> Inspection {
        match self.do_inspect(data, force, refresh).await {
            Ok(inspection) => inspection,
            Err(outcome) => outcome.into(),
        }
    }
}

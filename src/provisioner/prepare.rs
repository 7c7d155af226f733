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

//! Manual cleaning: RAID and firmware configuration.

use super::bmc::NO_RAID_INTERFACE;
use super::data::PrepareData;
use super::firmware::{build_firmware_clean_step, build_firmware_settings};
use super::outcome::{Outcome, Step, PROVISION_REQUEUE_DELAY};
use super::raid::{build_raid_clean_steps, build_target_raid_config, mark_root_volume};
use super::Provisioner;
use crate::baremetal::{
    CleanStep, Node, ProvisionAction, ProvisionState, ProvisionStateRequest, TargetRaidConfig,
};
use crate::ErrorKind;

impl Provisioner {
    /// RAID steps followed by the firmware step.
    pub(crate) fn manual_cleaning_steps(&self, data: &PrepareData) -> Step<Vec<CleanStep>> {
        let mut steps = build_raid_clean_steps(
            self.bmc.raid_interface(),
            data.target_raid_config.as_ref(),
            data.actual_raid_config.as_ref(),
        )?;

        let vendor = self
            .bmc
            .build_bios_settings(data.firmware_config.as_ref())
            .map_err(|err| Outcome::Failed(err.to_string()))?;
        let settings = build_firmware_settings(
            &vendor,
            data.target_firmware_settings.as_ref(),
            data.actual_firmware_settings.as_ref(),
        );
        steps.extend(build_firmware_clean_step(settings));
        Ok(steps)
    }

    /// Store the target RAID configuration on the node.
    pub(crate) async fn set_target_raid_config(&self, node: &Node, data: &PrepareData) -> Step<()> {
        if self.bmc.raid_interface() == NO_RAID_INTERFACE {
            return Ok(());
        }
        let mut logical_disks = build_target_raid_config(data.target_raid_config.as_ref())?;
        if logical_disks.is_empty() {
            return Ok(());
        }
        mark_root_volume(&mut logical_disks, data.root_device_hints.is_some());
        info!(
            "Setting target RAID configuration of node {} with {} logical disk(s)",
            node.id,
            logical_disks.len()
        );
        let config = TargetRaidConfig { logical_disks };
        Ok(self.client.set_raid_config(&node.id, &config).await?)
    }

    async fn start_manual_cleaning(&self, node: &Node, data: &PrepareData) -> Step<bool> {
        self.set_target_raid_config(node, data).await?;
        let steps = self.manual_cleaning_steps(data)?;
        if steps.is_empty() {
            return Ok(false);
        }
        info!(
            "Starting manual cleaning of node {} with {} step(s)",
            node.id,
            steps.len()
        );
        self.request_transition(
            node,
            ProvisionStateRequest::new(ProvisionAction::Clean).with_clean_steps(steps),
        )
        .await?;
        Ok(true)
    }

    async fn do_prepare(
        &self,
        data: &PrepareData,
        unprepared: bool,
        force: bool,
    ) -> Step<(Outcome, bool)> {
        let node = self.get_node().await?;

        match node.provision_state {
            ProvisionState::Available => {
                if unprepared {
                    let steps = self.manual_cleaning_steps(data)?;
                    if !steps.is_empty() {
                        info!(
                            "Node {} needs to be reconfigured with {} step(s)",
                            node.id,
                            steps.len()
                        );
                        let outcome = self
                            .change_provision_action(&node, ProvisionAction::Manage)
                            .await;
                        return Ok((outcome, false));
                    }
                }
                Ok((Outcome::Complete, unprepared))
            }
            ProvisionState::Manageable => {
                if unprepared && self.start_manual_cleaning(&node, data).await? {
                    return Ok((Outcome::Continuing(PROVISION_REQUEUE_DELAY), true));
                }
                Ok((Outcome::Complete, unprepared))
            }
            ProvisionState::CleanFailed if !force => {
                let message = node.last_error().unwrap_or_default();
                info!("Cleaning of node {} failed: {}", node.id, message);
                Ok((Outcome::failed(message), false))
            }
            ProvisionState::CleanFailed => Ok((self.recover_clean_failure(node).await, false)),
            ProvisionState::Cleaning | ProvisionState::CleanWait => {
                debug!(
                    "Waiting for node {} in state {} (clean step {:?})",
                    node.id, node.provision_state, node.clean_step
                );
                Ok((Outcome::Continuing(PROVISION_REQUEUE_DELAY), false))
            }
            other => Err(Outcome::transient(
                ErrorKind::InvalidResponse,
                format!("Have unexpected node state {other}"),
            )),
        }
    }

    /// Apply RAID and firmware configuration through manual cleaning.
    ///
    /// Returns the outcome and whether the configuration was started (or
    /// turned out to be unnecessary) by this call.
    pub async fn prepare(&self, data: &PrepareData, unprepared: bool, force: bool) -> (Outcome, bool) {
        match self.do_prepare(data, unprepared, force).await {
            Ok(result) => result,
            Err(outcome) => (outcome, false),
        }
    }
}

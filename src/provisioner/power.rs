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

//! Power control.

use std::time::Duration;

use super::outcome::{Outcome, Step, POWER_REQUEUE_DELAY, SOFT_POWER_OFF_TIMEOUT};
use super::Provisioner;
use crate::baremetal::{Node, PowerState, PowerStateRequest, TargetPowerState};
use crate::{Error, ErrorKind};

/// How to power off a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RebootMode {
    /// Ask the operating system to shut down, fall back to a hard power off.
    #[default]
    Soft,
    /// Power off immediately.
    Hard,
}

fn power_event(target: TargetPowerState) -> Option<(&'static str, &'static str)> {
    match target {
        TargetPowerState::On => Some(("PowerOn", "Host powered on")),
        TargetPowerState::Off => Some(("PowerOff", "Host powered off")),
        TargetPowerState::SoftOff => Some(("PowerOff", "Host soft powered off")),
        _ => None,
    }
}

fn is_soft_power_off_unsupported(outcome: &Outcome) -> bool {
    matches!(outcome, Outcome::Transient(err) if err.kind() == ErrorKind::InvalidInput)
}

impl Provisioner {
    async fn change_power(&self, node: &Node, target: TargetPowerState) -> Step<()> {
        if let Some(state) = node.target_provision_state {
            info!(
                "Node {} in state {} (target {}) does not allow power changes yet",
                node.id, node.provision_state, state
            );
            return Err(Outcome::Continuing(POWER_REQUEUE_DELAY));
        }

        let request = PowerStateRequest {
            target,
            timeout: if target == TargetPowerState::SoftOff {
                Some(SOFT_POWER_OFF_TIMEOUT.as_secs())
            } else {
                None
            },
        };
        info!("Changing power state of node {} to {}", node.id, target);
        match self.client.set_power_state(&node.id, &request).await {
            Ok(()) => {
                if let Some((reason, message)) = power_event(target) {
                    self.publish(reason, message);
                }
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::Conflict => {
                info!(
                    "Node {} is locked, retrying after {:?}",
                    node.id, POWER_REQUEUE_DELAY
                );
                Err(Outcome::Continuing(POWER_REQUEUE_DELAY))
            }
            Err(err) if err.kind() == ErrorKind::InvalidInput && target == TargetPowerState::SoftOff => {
                Err(Outcome::transient(
                    ErrorKind::InvalidInput,
                    format!("Soft power off is unsupported on BMC: {err}"),
                ))
            }
            Err(err) => {
                info!("Power change of node {} failed: {}", node.id, err);
                Err(Outcome::Transient(Error::new(
                    err.kind(),
                    format!("Failed to {target} node: {err}"),
                )))
            }
        }
    }

    async fn power_changed(&self, node: &Node, target: TargetPowerState) -> Outcome {
        match self.change_power(node, target).await {
            Ok(()) => Outcome::Continuing(Duration::ZERO),
            Err(outcome) => outcome,
        }
    }

    /// Ensure the host is powered on.
    pub async fn power_on(&self, force: bool) -> Outcome {
        let node = match self.get_node().await {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        debug!(
            "Ensuring node {} is powered on, current {:?}, target {:?}",
            node.id, node.power_state, node.target_power_state
        );

        if node.power_state == Some(PowerState::On) {
            return Outcome::Complete;
        }
        if node.target_power_state == Some(TargetPowerState::On) {
            debug!("Waiting for node {} to power on", node.id);
            return Outcome::Continuing(POWER_REQUEUE_DELAY);
        }
        if let (Some(error), false) = (node.last_error(), force) {
            info!("Powering on node {} failed: {}", node.id, error);
            return Outcome::failed(format!("PowerOn operation failed: {error}"));
        }
        self.power_changed(&node, TargetPowerState::On).await
    }

    /// Ensure the host is powered off.
    ///
    /// A soft power off falls back to a hard one if the BMC does not
    /// support it. With `force` a hard power off is always used.
    pub async fn power_off(&self, mode: RebootMode, force: bool) -> Outcome {
        let node = match self.get_node().await {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        debug!(
            "Ensuring node {} is powered off ({:?}), current {:?}, target {:?}",
            node.id, mode, node.power_state, node.target_power_state
        );

        if node.power_state == Some(PowerState::Off) {
            return Outcome::Complete;
        }
        if matches!(
            node.target_power_state,
            Some(TargetPowerState::Off) | Some(TargetPowerState::SoftOff)
        ) {
            debug!("Waiting for node {} to power off", node.id);
            return Outcome::Continuing(POWER_REQUEUE_DELAY);
        }
        if let (None, Some(error), false) = (node.target_power_state, node.last_error(), force) {
            info!("Powering off node {} failed: {}", node.id, error);
            return Outcome::failed(error);
        }

        if mode == RebootMode::Soft && !force {
            let outcome = self.power_changed(&node, TargetPowerState::SoftOff).await;
            if !is_soft_power_off_unsupported(&outcome) {
                return outcome;
            }
            info!(
                "Soft power off is not supported for node {}, using hard power off",
                node.id
            );
        }
        self.power_changed(&node, TargetPowerState::Off).await
    }
}

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

//! Deploying an image to a host.

use std::time::Duration;

use serde_json::{Map, Value};

use super::data::{BootMode, ChecksumType, Image, ProvisionData};
use super::devicehints::make_hint_map;
use super::outcome::{finish, Outcome, Step, PROVISION_REQUEUE_DELAY};
use super::register::build_capabilities_value;
use super::updates::NodeUpdater;
use super::Provisioner;
use crate::baremetal::{
    ConfigDrive, DeployStep, Node, ProvisionAction, ProvisionState, ProvisionStateRequest,
    StepInterface,
};
use crate::{Error, ErrorKind};

const DEFAULT_FORCE_PERSISTENT_BOOT_DEVICE: &str = "Default";
const CUSTOM_DEPLOY_PRIORITY: u32 = 80;

/// Whether the node was last deployed with the same image.
pub(crate) fn has_same_image(node: &Node, image: &Image) -> bool {
    let instance_info = &node.instance_info;
    if image.is_live_iso() {
        return instance_info.boot_iso() == Some(&image.url);
    }
    if instance_info.image_source() != Some(&image.url) {
        return false;
    }
    match (image.checksum(), instance_info.image_checksum()) {
        (Some((checksum, algorithm)), Some(current)) => {
            current.algorithm() == algorithm.as_str() && current.value() == checksum
        }
        (None, None) => true,
        _ => false,
    }
}

impl Provisioner {
    fn live_iso_options(&self, node: &Node, image: &Image, updater: &mut NodeUpdater) {
        let force_persistent = self
            .config
            .live_iso_force_persistent_boot_device
            .as_deref()
            .unwrap_or(DEFAULT_FORCE_PERSISTENT_BOOT_DEVICE);
        let _ = updater
            .set_instance_info_opts(
                options! {
                    "boot_iso" => image.url.as_str(),
                    "image_source" => Value::Null,
                    "image_os_hash_value" => Value::Null,
                    "image_os_hash_algo" => Value::Null,
                    "image_checksum" => Value::Null,
                },
                node,
            )
            .set_top_level_opt("deploy_interface", "ramdisk", node.deploy_interface.as_str())
            .set_driver_info_opts(
                options! {"force_persistent_boot_device" => force_persistent},
                node,
            );
    }

    fn custom_deploy_options(&self, node: &Node, image: Option<&Image>, updater: &mut NodeUpdater) {
        let opts = match image.filter(|image| !image.url.is_empty()) {
            Some(image) => {
                let checksum = image.checksum();
                options! {
                    "boot_iso" => Value::Null,
                    "image_checksum" => Value::Null,
                    "image_source" => image.url.as_str(),
                    "image_os_hash_algo" => checksum.map(|(_, algo)| algo.as_str()),
                    "image_os_hash_value" => checksum.map(|(value, _)| value),
                    "image_disk_format" => image.disk_format.as_deref(),
                }
            }
            None => options! {
                "boot_iso" => Value::Null,
                "image_checksum" => Value::Null,
                "image_source" => Value::Null,
                "image_os_hash_algo" => Value::Null,
                "image_os_hash_value" => Value::Null,
                "image_disk_format" => Value::Null,
            },
        };
        let _ = updater.set_instance_info_opts(opts, node).set_top_level_opt(
            "deploy_interface",
            "custom-agent",
            node.deploy_interface.as_str(),
        );
    }

    fn direct_deploy_options(&self, node: &Node, image: Option<&Image>, updater: &mut NodeUpdater) {
        let image = match image {
            Some(image) => image,
            None => return,
        };
        let (checksum, algorithm) = match image.checksum() {
            Some(checksum) => checksum,
            None => {
                debug!("No checksum for image {}, not updating image options", image.url);
                return;
            }
        };
        let md5_checksum = Some(checksum).filter(|_| algorithm == ChecksumType::Md5);
        let _ = updater.set_instance_info_opts(
            options! {
                "boot_iso" => Value::Null,
                "image_source" => image.url.as_str(),
                "image_os_hash_algo" => algorithm.as_str(),
                "image_os_hash_value" => checksum,
                "image_checksum" => md5_checksum,
                "image_disk_format" => image.disk_format.as_deref(),
            },
            node,
        );
        if node.deploy_interface == "ramdisk" || node.deploy_interface == "custom-agent" {
            let _ = updater.set_top_level_opt(
                "deploy_interface",
                Value::Null,
                node.deploy_interface.as_str(),
            );
        }
        let _ = updater.set_driver_info_opts(
            options! {"force_persistent_boot_device" => DEFAULT_FORCE_PERSISTENT_BOOT_DEVICE},
            node,
        );
    }

    /// Reconcile image options and the instance UUID.
    pub(crate) fn image_update_options(
        &self,
        node: &Node,
        image: Option<&Image>,
        boot_mode: BootMode,
        custom_deploy: bool,
        updater: &mut NodeUpdater,
    ) {
        let mut capabilities = Map::new();
        if boot_mode == BootMode::UefiSecureBoot {
            let _ = capabilities.insert("secure_boot".into(), "true".into());
        }
        let _ = updater
            .set_top_level_opt("instance_uuid", self.meta.uid.as_str(), node.instance_id.clone())
            .set_instance_info_opts(options! {"capabilities" => capabilities}, node);

        match image {
            Some(image) if image.is_live_iso() => self.live_iso_options(node, image, updater),
            _ if custom_deploy => self.custom_deploy_options(node, image, updater),
            _ => self.direct_deploy_options(node, image, updater),
        }
    }

    fn provision_updates(&self, node: &Node, data: &ProvisionData) -> NodeUpdater {
        let mut updater = NodeUpdater::new();
        self.image_update_options(
            node,
            Some(&data.image),
            data.boot_mode,
            data.custom_deploy_method().is_some(),
            &mut updater,
        );
        let _ = updater.set_properties_opts(
            options! {
                "root_device" => make_hint_map(data.root_device_hints.as_ref()),
                "cpu_arch" => data.hardware_profile.cpu_arch.as_deref(),
                "local_gb" => data.hardware_profile.local_gb,
                "capabilities" => build_capabilities_value(Some(node), data.boot_mode),
            },
            node,
        );
        updater
    }

    async fn validate(&self, node: &Node) -> Step<()> {
        let result = self.client.validate_node(&node.id).await?;
        let reasons = [("boot", &result.boot), ("deploy", &result.deploy)]
            .into_iter()
            .filter(|(_, validation)| !validation.is_ok())
            .map(|(name, validation)| {
                validation
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("{name} interface validation failed"))
            })
            .collect::<Vec<_>>();
        if reasons.is_empty() {
            Ok(())
        } else {
            let message = format!("host validation error: {}", reasons.join("; "));
            info!("Node {} failed validation: {}", node.id, message);
            Err(Outcome::Failed(message))
        }
    }

    async fn set_up_provisioning(&self, node: Node, data: &ProvisionData) -> Step<Node> {
        info!("Setting up node {} for provisioning", node.id);
        let updater = self.provision_updates(&node, data);
        let node = self.try_update_node(node, &updater).await?;
        self.validate(&node).await?;
        self.publish(
            "ProvisioningStarted",
            &format!("Image provisioning started for {}", data.image.url),
        );
        Ok(node)
    }

    /// Config drive for the deployment, `None` for live ISO.
    pub(crate) fn config_drive(&self, data: &ProvisionData) -> Step<Option<ConfigDrive>> {
        if data.image.is_live_iso() {
            return Ok(None);
        }
        let host_config = &data.host_config;
        let invalid = |what: &str, err: serde_yaml::Error| {
            Outcome::Transient(Error::new(
                ErrorKind::InvalidInput,
                format!("Cannot parse {what}: {err}"),
            ))
        };

        let network_data = match host_config.network_data.as_deref() {
            Some(raw) if !raw.is_empty() => Some(
                serde_yaml::from_str::<Value>(raw).map_err(|e| invalid("network data", e))?,
            ),
            _ => None,
        };

        let name = self.meta.name.as_str();
        let mut meta_data = options! {
            "uuid" => self.meta.uid.as_str(),
            "metal3-namespace" => self.meta.namespace.as_str(),
            "metal3-name" => name,
            "local-hostname" => name,
            "local_hostname" => name,
            "name" => name,
        };
        if let Some(raw) = host_config.meta_data.as_deref().filter(|s| !s.is_empty()) {
            let overrides: Map<String, Value> =
                serde_yaml::from_str(raw).map_err(|e| invalid("meta data", e))?;
            meta_data.extend(overrides);
        }

        Ok(Some(ConfigDrive {
            meta_data,
            network_data,
            user_data: host_config.user_data.clone().filter(|s| !s.is_empty()),
        }))
    }

    async fn start_provisioning(&self, node: Node, data: &ProvisionData) -> Step<Outcome> {
        let node = self.set_up_provisioning(node, data).await?;
        let configdrive = self.config_drive(data)?;
        let deploy_steps = data
            .custom_deploy_method()
            .map(|method| DeployStep {
                interface: StepInterface::Deploy,
                name: method.into(),
                args: Map::new(),
                priority: CUSTOM_DEPLOY_PRIORITY,
            })
            .into_iter()
            .collect();
        let request = ProvisionStateRequest::new(ProvisionAction::Active)
            .with_configdrive(configdrive)
            .with_deploy_steps(deploy_steps);
        Ok(self.change_provision_state(&node, request).await)
    }

    async fn do_provision(&self, data: &ProvisionData) -> Step<Outcome> {
        let node = self.get_node().await?;
        info!(
            "Provisioning image {} to node {} in state {}",
            data.image.url, node.id, node.provision_state
        );

        match node.provision_state {
            ProvisionState::DeployFailed if has_same_image(&node, &data.image) => {
                match node.last_error() {
                    Some(error) => {
                        info!("Provisioning of node {} failed: {}", node.id, error);
                        Ok(Outcome::failed(format!("Image provisioning failed: {error}")))
                    }
                    None => {
                        debug!("Node {} failed but has no error message yet", node.id);
                        Ok(Outcome::Continuing(Duration::ZERO))
                    }
                }
            }
            ProvisionState::DeployFailed => {
                info!("Recovering node {} from a previous deploy failure", node.id);
                self.start_provisioning(node, data).await
            }
            ProvisionState::Manageable => Ok(self
                .change_provision_action(&node, ProvisionAction::Provide)
                .await),
            ProvisionState::CleanFailed => Ok(self.recover_clean_failure(node).await),
            ProvisionState::Available => self.start_provisioning(node, data).await,
            ProvisionState::Active => {
                info!("Finished provisioning node {}", node.id);
                self.publish(
                    "ProvisioningComplete",
                    &format!("Image provisioning completed for {}", data.image.url),
                );
                Ok(Outcome::Complete)
            }
            _ => {
                debug!(
                    "Waiting for node {} in state {} (deploy step {:?})",
                    node.id, node.provision_state, node.deploy_step
                );
                Ok(Outcome::Continuing(PROVISION_REQUEUE_DELAY))
            }
        }
    }

    /// Deploy an image to the host.
    pub async fn provision(&self, data: &ProvisionData) -> Outcome {
        finish(self.do_provision(data).await)
    }
}
